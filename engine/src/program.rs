//! Program build and shared work buffer ownership.

use std::path::Path;

use tracing::{error, info, warn};

use crate::backbuffer::BackBuffer;
use crate::chunked::ChunkedBuffer;
use crate::codegen::{self, ProgramSource};
use crate::config::EngineConfig;
use crate::device::{ComputeDevice, Fence, ProgramId};
use crate::error::{AllocError, BindError, BindReason, BuildError, EngineError};
use crate::grid::Extent;
use crate::kernel::{Kernel, KernelArg};
use crate::options::KernelVariant;
use crate::status::StatusSink;

/// Written to the build log when the compiler reports nothing.
pub const BUILD_SUCCESS_MARKER: &str = "Build succeeded with no errors or warnings.";

/// Owns the built program and the back-buffered work buffer every window shares.
#[derive(Debug)]
pub struct ProgramManager {
    config: EngineConfig,
    source: Option<ProgramSource>,
    program: Option<ProgramId>,
    back: Option<BackBuffer>,
}

fn write_log(path: &Path, contents: &str) -> Result<(), BuildError> {
    std::fs::write(path, contents)
        .map_err(|source| BuildError::Log { path: path.to_path_buf(), source })
}

impl ProgramManager {
    /// Manager with nothing built yet.
    pub fn new(config: EngineConfig) -> Self {
        Self { config, source: None, program: None, back: None }
    }

    /// Configuration the program is built from.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Generate and build the kernel program, replacing any previous one. The build log
    /// file is rewritten either way.
    pub fn build<D: ComputeDevice>(
        &mut self,
        device: &mut D,
        status: &mut dyn StatusSink,
    ) -> Result<(), BuildError> {
        status.push("Generating kernels");
        let generated = codegen::generate(&self.config.kernel);
        status.pop();
        let source = generated?;

        status.push("Building kernel program");
        let built = device.build_program(&source);
        status.pop();

        let log_path = &self.config.build_log_path;
        match built {
            Ok(output) => {
                if output.log.trim().is_empty() {
                    write_log(log_path, BUILD_SUCCESS_MARKER)?;
                } else {
                    warn!(log = %log_path.display(), "kernel program built with warnings");
                    write_log(log_path, &output.log)?;
                }
                if let Some(old) = self.program.replace(output.program) {
                    device.release_program(old);
                }
                info!(
                    device = %device.name(),
                    entry_points = source.entry_points.len(),
                    "kernel program built"
                );
                self.source = Some(source);
                Ok(())
            }
            Err(failure) => {
                write_log(log_path, &failure.log)?;
                error!(log = %log_path.display(), "kernel program failed to build");
                Err(BuildError::Failed { log_path: log_path.clone() })
            }
        }
    }

    /// True once a program is built.
    pub fn is_built(&self) -> bool {
        self.program.is_some()
    }

    /// Source of the current program.
    pub fn source(&self) -> Option<&ProgramSource> {
        self.source.as_ref()
    }

    /// Fresh unbound kernel for `variant`.
    pub fn find_kernel(&self, variant: KernelVariant) -> Result<Kernel, BindError> {
        let missing = |reason| BindError {
            kernel: variant.entry_point(),
            arg: KernelArg::Output,
            reason,
        };
        let (Some(program), Some(source)) = (self.program, &self.source) else {
            return Err(missing(BindReason::Missing("kernel program")));
        };
        let entry = source.entry_point(variant).ok_or_else(|| missing(BindReason::UnknownKernel))?;
        Ok(Kernel::new(program, variant, entry.name.clone()))
    }

    /// Shared work buffer, if allocated.
    pub fn buffer(&self) -> Option<&ChunkedBuffer> {
        self.back.as_ref().map(BackBuffer::buffer).filter(|b| !b.is_empty())
    }

    /// Back buffer, if allocated.
    pub fn back_buffer(&self) -> Option<&BackBuffer> {
        self.back.as_ref()
    }

    /// (Re)allocate the work buffer for `extent` with `slots` slots. All contents are lost.
    pub fn update_resolution<D: ComputeDevice>(
        &mut self,
        device: &mut D,
        extent: Extent,
        slots: usize,
    ) -> Result<(), AllocError> {
        let back = match self.back.as_mut() {
            Some(back) => back,
            None => self.back.insert(BackBuffer::default()),
        };
        while back.slot_count() < slots {
            back.add_slot();
        }
        back.resize(device, extent.cells())
    }

    /// Add a zeroed slot for a new window.
    pub fn add_buffer_slot(&mut self) {
        if let Some(back) = self.back.as_mut() {
            back.add_slot();
        }
    }

    /// Drop the last slot.
    pub fn remove_buffer_slot<D: ComputeDevice>(&mut self, device: &mut D) -> Result<(), EngineError> {
        match self.back.as_mut() {
            Some(back) => back.remove_slot(device),
            None => Ok(()),
        }
    }

    /// Make slot `index` device-resident.
    pub fn use_buffer<D: ComputeDevice>(
        &mut self,
        device: &mut D,
        index: usize,
        wait: bool,
    ) -> Result<Fence, EngineError> {
        match self.back.as_mut() {
            Some(back) => back.use_slot(device, index, wait),
            None => Err(EngineError::UnknownSlot { index, count: 0 }),
        }
    }

    /// Free the program and the work buffer.
    pub fn release<D: ComputeDevice>(&mut self, device: &mut D) {
        if let Some(mut back) = self.back.take() {
            back.free(device);
        }
        if let Some(program) = self.program.take() {
            device.release_program(program);
        }
        self.source = None;
    }
}
