//! Scene and per-window settings supplied by the front end.

use hyperorbit_algebra::{Number, NumberSystem};

use crate::camera::ArcballCamera;
use crate::grid::Extent;
use crate::options::{Dimensions, KernelVariant, RenderMode, Space};
use crate::viewspace::Viewspace;

/// Zoom at which the iteration heuristic yields exactly the modifier.
pub const ZOOM_1X: f32 = 1.0;
/// Lower bound of the global iteration cap.
pub const MIN_ITERATIONS: u32 = 1;
/// Upper bound of the global iteration cap.
pub const MAX_ITERATIONS: u32 = u32::MAX;

/// Settings of one view window.
#[derive(Clone, Debug, PartialEq)]
pub struct ViewWindowSettings {
    /// Which of `z₀` and `c` comes from the cell
    pub space: Space,
    /// Escape-time or orbit rendering
    pub render_mode: RenderMode,
    /// Visible region
    pub view: Viewspace,
    /// Orbit camera used when displaying volumes
    pub camera: ArcballCamera,
    /// Iteration cap at zoom 1; scales with depth
    pub iteration_modifier: f32,
    /// Escape-mode iterations advanced per frame
    pub iterations_per_frame: u32,
}

impl ViewWindowSettings {
    /// Defaults for a space and mode.
    pub fn new(space: Space, render_mode: RenderMode) -> Self {
        let center = match space {
            Space::Phase => Number::ZERO,
            Space::Dynamical => Number::from_components(&[-0.5]),
        };
        Self {
            space,
            render_mode,
            view: Viewspace::new(center, 1.5, [1, 2, 0]),
            camera: ArcballCamera::default(),
            iteration_modifier: 125.0,
            iterations_per_frame: 100,
        }
    }

    /// Global iteration cap: `modifier · 2^log10(1/zoom)` clamped, unbounded for orbits.
    pub fn max_iterations(&self) -> u32 {
        match self.render_mode {
            RenderMode::Escape => {
                let depth = (f64::from(ZOOM_1X) / f64::from(self.view.zoom)).log10();
                let cap = f64::from(self.iteration_modifier) * 2f64.powf(depth);
                if cap.is_nan() {
                    MIN_ITERATIONS
                } else {
                    cap.round().clamp(f64::from(MIN_ITERATIONS), f64::from(MAX_ITERATIONS)) as u32
                }
            }
            RenderMode::Translated => MAX_ITERATIONS,
        }
    }

    /// Iterations advanced per dispatch; orbits advance one step per frame.
    pub fn iterations_per_frame(&self) -> u32 {
        match self.render_mode {
            RenderMode::Escape => self.iterations_per_frame.max(1),
            RenderMode::Translated => 1,
        }
    }

    /// Kernel variant for this window under `system`.
    pub fn variant(&self, system: NumberSystem) -> KernelVariant {
        KernelVariant::new(self.space, self.render_mode, system)
    }
}

/// Scene settings shared by every window.
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    /// Arithmetic of every kernel
    pub number_system: NumberSystem,
    /// Image or volume grids
    pub dimensions: Dimensions,
    /// Cells per axis
    pub resolution: u32,
    /// Global parameter (`c` in phase space, `z₀` in dynamical space)
    pub parameter: Number,
    /// Open windows; the index is the buffer slot
    pub windows: Vec<ViewWindowSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            number_system: NumberSystem::Complex,
            dimensions: Dimensions::Two,
            resolution: 64,
            parameter: Number::from_components(&[0.357_712_77, 0.111_702_13]),
            windows: vec![
                ViewWindowSettings::new(Space::Phase, RenderMode::Escape),
                ViewWindowSettings::new(Space::Phase, RenderMode::Translated),
                ViewWindowSettings::new(Space::Dynamical, RenderMode::Escape),
                ViewWindowSettings::new(Space::Dynamical, RenderMode::Translated),
            ],
        }
    }
}

impl Settings {
    /// Settings with a single window.
    pub fn single(window: ViewWindowSettings) -> Self {
        Self { windows: vec![window], ..Self::default() }
    }

    /// Grid extent implied by resolution and dimensionality.
    pub fn extent(&self) -> Extent {
        Extent::square(self.resolution, self.dimensions)
    }

    /// Window `index`, if open.
    pub fn window(&self, index: usize) -> Option<&ViewWindowSettings> {
        self.windows.get(index)
    }

    /// Switch arithmetic and truncate values and mappings that no longer fit.
    pub fn set_number_system(&mut self, system: NumberSystem) {
        self.number_system = system;
        let dim = system.dim();
        self.parameter = self.parameter.truncated(dim);
        for window in &mut self.windows {
            window.view.fit_to(dim);
        }
    }

    /// Switch dimensionality. Volumes get a z mapping onto the first free component;
    /// images drop theirs.
    pub fn set_dimensions(&mut self, dims: Dimensions) {
        self.dimensions = dims;
        let dim = self.number_system.dim() as i32;
        for window in &mut self.windows {
            let mapping = &mut window.view.mapping;
            match dims {
                Dimensions::Two => mapping[2] = 0,
                Dimensions::Three if mapping[2] == 0 => {
                    let used = |c: i32| mapping[..2].iter().any(|m| m.abs() == c);
                    if let Some(free) = (1..=dim).find(|c| !used(*c)) {
                        mapping[2] = free;
                    }
                }
                Dimensions::Three => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iteration_cap_follows_zoom() {
        let mut w = ViewWindowSettings::new(Space::Phase, RenderMode::Escape);
        w.iteration_modifier = 50.0;
        w.view.zoom = 1.0;
        assert_eq!(w.max_iterations(), 50);
        w.view.zoom = 0.1;
        assert_eq!(w.max_iterations(), 100);
        w.view.zoom = 1e-30;
        assert_eq!(w.max_iterations(), u32::MAX);
        w.iteration_modifier = 0.0;
        assert_eq!(w.max_iterations(), MIN_ITERATIONS);
        w.render_mode = RenderMode::Translated;
        assert_eq!(w.max_iterations(), u32::MAX);
        assert_eq!(w.iterations_per_frame(), 1);
    }

    #[test]
    fn number_system_change_truncates() {
        let mut s = Settings::default();
        s.set_number_system(NumberSystem::Quaternion);
        s.parameter = Number::from_components(&[0.1, 0.2, 0.3, 0.4]);
        s.windows[0].view.mapping = [1, 4, 3];
        s.set_number_system(NumberSystem::Complex);
        assert_eq!(s.parameter, Number::from_components(&[0.1, 0.2]));
        assert_eq!(s.windows[0].view.mapping, [1, 0, 0]);
    }

    #[test]
    fn dimension_change_maps_z() {
        let mut s = Settings::default();
        s.set_number_system(NumberSystem::Quaternion);
        s.set_dimensions(Dimensions::Three);
        assert_eq!(s.extent(), Extent::new(64, 64, 64));
        assert!(s.windows.iter().all(|w| w.view.mapping == [1, 2, 3]));
        s.set_dimensions(Dimensions::Two);
        assert!(s.windows.iter().all(|w| w.view.mapping == [1, 2, 0]));
    }
}
