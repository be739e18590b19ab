//! Host execution of the kernel contract.
//!
//! Mirrors the generated WGSL entry points cell by cell, in flat index order. Orbit
//! scatters therefore resolve collisions deterministically: the highest flat index wins.

use hyperorbit_algebra::{Algebra, Number, SystemVisitor};

use crate::color::{escape_color, location_color, to_rgba8};
use crate::config::KernelConfig;
use crate::layout::{KernelUniforms, WorkCell};
use crate::options::{KernelVariant, RenderMode, Space};

/// One dispatch over host memory.
pub struct Sweep<'a> {
    /// Entry point being executed
    pub variant: KernelVariant,
    /// Dispatch arguments
    pub uniforms: &'a KernelUniforms,
    /// Baked program settings
    pub config: &'a KernelConfig,
    /// Work buffer chunks, `capacity` cells each except possibly the last
    pub chunks: &'a mut [Vec<WorkCell>],
    /// Cells per full chunk
    pub capacity: usize,
    /// Output surface, `(z, y, x)` order
    pub texels: &'a mut [[u8; 4]],
}

impl Sweep<'_> {
    /// Execute the dispatch.
    pub fn run(self) {
        let system = self.variant.system;
        system.visit(self)
    }

    fn cell(&mut self, flat: usize) -> Option<&mut WorkCell> {
        let capacity = self.capacity.max(1);
        self.chunks.get_mut(flat / capacity)?.get_mut(flat % capacity)
    }

    fn paint(&mut self, flat: usize, color: [f32; 4]) {
        if let Some(texel) = self.texels.get_mut(flat) {
            *texel = to_rgba8(color);
        }
    }
}

impl SystemVisitor for Sweep<'_> {
    type Output = ();

    fn visit<A: Algebra>(mut self) {
        let u = *self.uniforms;
        if u.max_iteration <= u.last_iteration {
            return;
        }
        let extent = u.extent();
        let view = u.view();
        let fixed: A = u.parameter().decode();
        let function = self.config.function;
        let threshold = self.config.escape_threshold;

        for loc in extent.locations() {
            let flat = extent.flat_index(loc);
            let mapped: A = view.forward(loc, extent).decode();
            let (mut z, c) = match self.variant.space {
                Space::Phase => (mapped, fixed),
                Space::Dynamical => (fixed, mapped),
            };
            let mut i = 0;
            if u.last_iteration != 0 {
                if let Some(saved) = self.cell(flat) {
                    z = saved.value.decode();
                    i = saved.iteration;
                }
            }
            match self.variant.mode {
                RenderMode::Escape => {
                    while i < u.max_iteration && z.modulus_sq() < threshold {
                        z = function.apply(z, c);
                        i += 1;
                    }
                    let color = escape_color(z.modulus_sq(), i, u.global_max, threshold);
                    self.paint(flat, color);
                }
                RenderMode::Translated => {
                    let color = location_color(loc, extent);
                    while i < u.max_iteration {
                        z = function.apply(z, c);
                        i += 1;
                        if let Some(target) = view.reverse(&Number::encode(z), extent) {
                            self.paint(extent.flat_index(target), color);
                        }
                    }
                }
            }
            if let Some(cell) = self.cell(flat) {
                *cell = WorkCell { value: Number::encode(z), iteration: i };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use hyperorbit_algebra::NumberSystem;

    use super::*;
    use crate::grid::Extent;
    use crate::viewspace::Viewspace;

    fn sweep(
        variant: KernelVariant,
        uniforms: &KernelUniforms,
        chunks: &mut [Vec<WorkCell>],
    ) -> Vec<[u8; 4]> {
        let cells = uniforms.extent().cells();
        let mut texels = vec![[0u8; 4]; cells];
        let capacity = chunks[0].len();
        Sweep {
            variant,
            uniforms,
            config: &KernelConfig::default(),
            chunks,
            capacity,
            texels: &mut texels,
        }
        .run();
        texels
    }

    #[test]
    fn origin_never_escapes_in_the_mandelbrot_set() {
        let extent = Extent::new(8, 8, 1);
        let view = Viewspace::new(Number::ZERO, 2.0, [1, 2, 0]);
        let variant = KernelVariant::new(Space::Dynamical, RenderMode::Escape, NumberSystem::Complex);
        let u = KernelUniforms::new(&view, &Number::ZERO, extent, 0, 20, 20);
        let mut chunks = vec![vec![WorkCell::default(); extent.cells()]];
        let texels = sweep(variant, &u, &mut chunks);
        // cell (4, 4) maps to exactly c = 0
        let centre = extent.flat_index([4, 4, 0]);
        assert_eq!(texels[centre], [0, 0, 0, 255]);
        assert_eq!(chunks[0][centre].iteration, 20);
        // corner c = -2 - 2i escapes on the first step
        assert_eq!(chunks[0][0].iteration, 1);
        assert_ne!(texels[0], [0, 0, 0, 255]);
    }

    #[test]
    fn finished_dispatch_is_a_no_op() {
        let extent = Extent::new(4, 4, 1);
        let variant = KernelVariant::new(Space::Phase, RenderMode::Escape, NumberSystem::Complex);
        let u = KernelUniforms::new(&Viewspace::default(), &Number::ZERO, extent, 10, 10, 10);
        let mut chunks = vec![vec![WorkCell::default(); extent.cells()]];
        let texels = sweep(variant, &u, &mut chunks);
        assert!(texels.iter().all(|t| *t == [0; 4]));
        assert!(chunks[0].iter().all(|c| c.iteration == 0));
    }

    #[test]
    fn orbit_of_a_fixed_point_paints_its_own_cell() {
        // c = 0: z = 0 stays put, so the centre cell scatters onto itself
        let extent = Extent::new(4, 4, 1);
        let view = Viewspace::new(Number::ZERO, 1.0, [1, 2, 0]);
        let variant = KernelVariant::new(Space::Phase, RenderMode::Translated, NumberSystem::Complex);
        let u = KernelUniforms::new(&view, &Number::ZERO, extent, 0, 1, u32::MAX);
        let mut chunks = vec![vec![WorkCell::default(); 9], vec![WorkCell::default(); 7]];
        let texels = sweep(variant, &u, &mut chunks);
        let centre = extent.flat_index([2, 2, 0]);
        assert_ne!(texels[centre], [0; 4]);
        assert_eq!(chunks[1][centre - 9].iteration, 1);
        assert_eq!(chunks[1][6].iteration, 1);
    }
}
