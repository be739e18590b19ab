//! Hyperorbit engine: resumable hypercomplex escape-time and orbit kernels.
//!
//! Kernels are generated as WGSL from the number-system table and run either on a GPU
//! through wgpu or on the host reference backend. Per-window iteration state lives in a
//! chunked work buffer whose contents are switched between windows through host slots.
#![deny(missing_docs)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::dbg_macro, clippy::large_enum_variant)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod backbuffer;
pub mod camera;
pub mod chunked;
pub mod codegen;
pub mod color;
pub mod config;
pub mod context;
pub mod cpu;
pub mod device;
pub mod error;
pub mod executor;
pub mod gpu;
pub mod grid;
pub mod kernel;
pub mod layout;
pub mod options;
pub mod program;
pub mod reference;
pub mod renderer;
pub mod settings;
pub mod status;
pub mod viewspace;

pub use config::{EngineConfig, IterationFunction, KernelConfig};
pub use context::EngineContext;
pub use cpu::{CpuDevice, CpuDeviceConfig};
pub use device::ComputeDevice;
pub use error::EngineError;
pub use gpu::WgpuDevice;
pub use grid::Extent;
pub use options::{Dimensions, KernelVariant, RenderMode, Space};
pub use renderer::{FrameReport, Renderer, RendererState};
pub use settings::{Settings, ViewWindowSettings};
pub use viewspace::Viewspace;

/// Returns the engine version string from Cargo metadata.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_semver_like() {
        assert!(version().split('.').count() >= 3);
    }
}
