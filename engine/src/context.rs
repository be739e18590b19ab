//! State shared by every window's executor.

use crate::device::ComputeDevice;
use crate::grid::Extent;
use crate::program::ProgramManager;

/// The device, the built program with its work buffer, and the current grid extent.
///
/// Executors borrow this per call instead of holding references to it.
#[derive(Debug)]
pub struct EngineContext<D> {
    /// Compute backend
    pub device: D,
    /// Program and shared work buffer
    pub programs: ProgramManager,
    /// Grid extent the work buffer is sized for
    pub extent: Extent,
}

impl<D: ComputeDevice> EngineContext<D> {
    /// Context with nothing built.
    pub fn new(device: D, programs: ProgramManager, extent: Extent) -> Self {
        Self { device, programs, extent }
    }
}
