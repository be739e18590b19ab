//! Device-visible memory layouts shared by the WGSL program and both backends.

use bytemuck::{Pod, Zeroable};
use hyperorbit_algebra::Number;

use crate::grid::Extent;
use crate::viewspace::Viewspace;

/// Work buffer chunks a kernel can address; WGSL cannot index bindings dynamically.
pub const MAX_CHUNK_BINDINGS: usize = 6;

/// Persisted state of one in-progress cell.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Default, Pod, Zeroable)]
pub struct WorkCell {
    /// Current iterate
    pub value: Number,
    /// Iterations applied so far
    pub iteration: u32,
}

/// Size of a [`WorkCell`] in bytes; also the WGSL array stride.
pub const WORK_CELL_SIZE: usize = std::mem::size_of::<WorkCell>();

/// Per-dispatch uniform block (`Params` in WGSL), 128 bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Default, Pod, Zeroable)]
pub struct KernelUniforms {
    /// View center split in two vec4
    pub center: [[f32; 4]; 2],
    /// Global parameter split in two vec4
    pub parameter: [[f32; 4]; 2],
    /// Axis mapping, w unused
    pub mapping: [i32; 4],
    /// Grid extent, w unused
    pub extent: [u32; 4],
    /// View zoom
    pub zoom: f32,
    /// Iteration the cells were left at by the previous dispatch
    pub last_iteration: u32,
    /// Iteration this dispatch stops at
    pub max_iteration: u32,
    /// Global cap, normalizes escape colors
    pub global_max: u32,
    /// Keeps the block a multiple of 16 bytes
    pub pad: [u32; 4],
}

impl KernelUniforms {
    /// Pack one dispatch.
    pub fn new(
        view: &Viewspace,
        parameter: &Number,
        extent: Extent,
        last_iteration: u32,
        max_iteration: u32,
        global_max: u32,
    ) -> Self {
        let [x, y, z] = view.mapping;
        Self {
            center: view.center.to_vec4_pair(),
            parameter: parameter.to_vec4_pair(),
            mapping: [x, y, z, 0],
            extent: [extent.width, extent.height, extent.depth, 0],
            zoom: view.zoom,
            last_iteration,
            max_iteration,
            global_max,
            pad: [0; 4],
        }
    }

    /// Unpack the view.
    pub fn view(&self) -> Viewspace {
        let [x, y, z, _] = self.mapping;
        Viewspace::new(unpack(&self.center), self.zoom, [x, y, z])
    }

    /// Unpack the parameter.
    pub fn parameter(&self) -> Number {
        unpack(&self.parameter)
    }

    /// Unpack the grid extent.
    pub fn extent(&self) -> Extent {
        let [w, h, d, _] = self.extent;
        Extent::new(w, h, d)
    }
}

fn unpack(halves: &[[f32; 4]; 2]) -> Number {
    let [lo, hi] = halves;
    Number { raw: [lo[0], lo[1], lo[2], lo[3], hi[0], hi[1], hi[2], hi[3]] }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layouts_match_wgsl() {
        assert_eq!(WORK_CELL_SIZE, 36);
        assert_eq!(std::mem::size_of::<KernelUniforms>(), 128);
    }

    #[test]
    fn uniforms_unpack() {
        let view = Viewspace::new(Number::from_components(&[1.0, 2.0, 3.0, 4.0, 5.0]), 0.5, [2, -1, 3]);
        let parameter = Number::from_components(&[0.25, -0.75]);
        let u = KernelUniforms::new(&view, &parameter, Extent::new(4, 5, 6), 10, 20, 30);
        assert_eq!(u.view(), view);
        assert_eq!(u.parameter(), parameter);
        assert_eq!(u.extent(), Extent::new(4, 5, 6));
    }
}
