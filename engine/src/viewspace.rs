//! View mapping between grid cells and number-system values.
//!
//! Each spatial axis either leaves the value untouched (mapping 0) or drives one component
//! of the `Number`, selected by a 1-based signed index. These are the host mirrors of the
//! WGSL `forward_view` and `scatter` helpers and must stay in step with them.

use hyperorbit_algebra::{Number, MAX_DIM};

use crate::grid::Extent;

/// Smallest zoom accepted by [`Viewspace::zoom_by`].
pub const MIN_ZOOM: f32 = 1e-6;
/// Largest zoom accepted by [`Viewspace::zoom_by`].
pub const MAX_ZOOM: f32 = 64.0;

/// Visible region of one window.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewspace {
    /// Value at the middle of the grid.
    pub center: Number,
    /// Half-width of the visible region along every mapped axis.
    pub zoom: f32,
    /// Per spatial axis: 0 unmapped, else `±(component + 1)`.
    pub mapping: [i32; 3],
}

/// Invalid axis mapping.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    /// Entry refers past the system dimension.
    #[error("axis {axis} maps to component {entry}, but the system has {dim}")]
    OutOfRange {
        /// Spatial axis
        axis: usize,
        /// Mapping entry
        entry: i32,
        /// System dimension
        dim: usize,
    },
    /// Two axes drive the same component.
    #[error("component {component} is mapped by more than one axis")]
    Duplicate {
        /// 1-based component index
        component: i32,
    },
}

impl Default for Viewspace {
    fn default() -> Self {
        Self { center: Number::ZERO, zoom: 1.5, mapping: [1, 2, 0] }
    }
}

/// `[-1, 1)` coordinate of a cell along one axis.
#[inline]
pub fn axis_coord(loc: u32, span: u32) -> f32 {
    loc as f32 / span as f32 * 2.0 - 1.0
}

#[inline]
fn direction(entry: i32) -> f32 {
    if entry < 0 {
        -1.0
    } else {
        1.0
    }
}

#[inline]
fn component_of(entry: i32) -> usize {
    if entry == 0 {
        0
    } else {
        entry.unsigned_abs() as usize - 1
    }
}

impl Viewspace {
    /// View with the given center, zoom and axis mapping.
    pub fn new(center: Number, zoom: f32, mapping: [i32; 3]) -> Self {
        Self { center, zoom, mapping }
    }

    /// Check the mapping against a system of dimension `dim`.
    pub fn validate(&self, dim: usize) -> Result<(), MappingError> {
        let dim = dim.min(MAX_DIM);
        let mut seen = [false; MAX_DIM];
        for (axis, &entry) in self.mapping.iter().enumerate() {
            if entry == 0 {
                continue;
            }
            let component = component_of(entry);
            if component >= dim {
                return Err(MappingError::OutOfRange { axis, entry, dim });
            }
            if seen[component] {
                return Err(MappingError::Duplicate { component: entry.abs() });
            }
            seen[component] = true;
        }
        Ok(())
    }

    /// Value at grid location `loc`.
    pub fn forward(&self, loc: [u32; 3], extent: Extent) -> Number {
        let axes = extent.axes();
        let mut value = self.center;
        for axis in 0..3 {
            let entry = self.mapping[axis];
            if entry == 0 {
                continue;
            }
            let c = component_of(entry);
            value.raw[c] =
                direction(entry) * self.zoom * axis_coord(loc[axis], axes[axis]) + value.raw[c];
        }
        value
    }

    /// Grid location `value` falls on, or `None` outside the grid or for non-finite input.
    ///
    /// Rounds half to even like WGSL `round`. Unmapped axes land in the middle slice.
    pub fn reverse(&self, value: &Number, extent: Extent) -> Option<[u32; 3]> {
        let axes = extent.axes();
        let mut loc = [0u32; 3];
        for axis in 0..3 {
            let span = axes[axis] as f32;
            let entry = self.mapping[axis];
            let coord = if entry == 0 {
                (span / 2.0).round_ties_even()
            } else {
                let c = component_of(entry);
                let unit = (value.raw[c] - self.center.raw[c]) / (direction(entry) * self.zoom);
                (span * (unit + 1.0) / 2.0).round_ties_even()
            };
            if !(coord >= 0.0 && coord < span) {
                return None;
            }
            loc[axis] = coord as u32;
        }
        Some(loc)
    }

    /// Value under a point given in `[-1, 1]` axis coordinates.
    pub fn point_at(&self, coords: [f32; 3]) -> Number {
        let mut value = self.center;
        for (axis, &entry) in self.mapping.iter().enumerate() {
            if entry != 0 {
                let c = component_of(entry);
                value.raw[c] += direction(entry) * self.zoom * coords[axis];
            }
        }
        value
    }

    /// Shift the center by `delta` axis units (a full view is 2 units wide).
    pub fn pan(&mut self, delta: [f32; 3]) {
        self.center = self.point_at(delta);
    }

    /// Scale the visible region; `factor < 1` zooms in.
    pub fn zoom_by(&mut self, factor: f32) {
        if factor.is_finite() && factor > 0.0 {
            self.zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        }
    }

    /// Restore the invariants for a system of dimension `dim`: center truncated, mappings
    /// past `dim` cleared.
    pub fn fit_to(&mut self, dim: usize) {
        self.center = self.center.truncated(dim);
        for entry in &mut self.mapping {
            if *entry != 0 && component_of(*entry) >= dim {
                *entry = 0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_then_reverse_returns_the_cell() {
        let view = Viewspace::new(Number::from_components(&[-0.5, 0.25]), 1.5, [1, -2, 0]);
        let extent = Extent::new(33, 17, 1);
        for loc in extent.locations() {
            let value = view.forward(loc, extent);
            assert_eq!(view.reverse(&value, extent), Some(loc));
        }
    }

    #[test]
    fn random_volume_views_round_trip() {
        use rand::{rngs::StdRng, Rng, SeedableRng};
        let mut rng = StdRng::seed_from_u64(7);
        let extent = Extent::new(12, 10, 8);
        for _ in 0..50 {
            let center: Vec<f32> = (0..4).map(|_| rng.gen_range(-1.0..1.0)).collect();
            let zoom = rng.gen_range(0.25..4.0);
            let view = Viewspace::new(Number::from_components(&center), zoom, [-3, 1, 4]);
            let loc = [rng.gen_range(0..12), rng.gen_range(0..10), rng.gen_range(0..8)];
            assert_eq!(view.reverse(&view.forward(loc, extent), extent), Some(loc));
        }
    }

    #[test]
    fn reverse_discards_out_of_range_and_non_finite() {
        let view = Viewspace::default();
        let extent = Extent::new(8, 8, 1);
        assert_eq!(view.reverse(&Number::from_components(&[10.0, 0.0]), extent), None);
        assert_eq!(view.reverse(&Number::from_components(&[f32::NAN, 0.0]), extent), None);
        assert_eq!(view.reverse(&Number::from_components(&[0.0, f32::INFINITY]), extent), None);
        assert_eq!(view.reverse(&Number::ZERO, extent), Some([4, 4, 0]));
    }

    #[test]
    fn validation_catches_bad_mappings() {
        let mut view = Viewspace::default();
        assert!(view.validate(2).is_ok());
        view.mapping = [1, 3, 0];
        assert!(matches!(view.validate(2), Err(MappingError::OutOfRange { axis: 1, .. })));
        view.mapping = [2, -2, 0];
        assert_eq!(view.validate(4), Err(MappingError::Duplicate { component: 2 }));
        view.fit_to(1);
        assert_eq!(view.mapping, [0, 0, 0]);
    }

    #[test]
    fn pan_and_zoom() {
        let mut view = Viewspace::new(Number::ZERO, 2.0, [1, -2, 0]);
        view.pan([0.5, 0.5, 0.0]);
        assert_eq!(view.center, Number::from_components(&[1.0, -1.0]));
        view.zoom_by(0.5);
        assert_eq!(view.zoom, 1.0);
        view.zoom_by(1e-12);
        assert_eq!(view.zoom, MIN_ZOOM);
        view.zoom_by(-1.0);
        assert_eq!(view.zoom, MIN_ZOOM);
    }
}
