//! Per-window kernel execution.
//!
//! An executor owns one window's output surface and kernel bindings and advances the
//! window's cells a bounded number of iterations per frame. Setting changes only mark
//! flags; the rebinding cascade runs lazily before the next dispatch.

use hyperorbit_algebra::Number;
use tracing::{debug, trace};

use crate::context::EngineContext;
use crate::device::{ComputeDevice, Fence, SurfaceId};
use crate::error::{AllocError, BindError, BindReason, DeviceOp, DispatchError, EngineError};
use crate::grid::Extent;
use crate::kernel::{ArgValue, Kernel, KernelArg};
use crate::options::{KernelVariant, RenderMode};
use crate::settings::{Settings, ViewWindowSettings};

/// Pending rebinds; each implies the ones after it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DirtyFlags {
    /// Grid extent changed: new surface, new buffer binding
    pub resolution: bool,
    /// System, space or mode changed: new kernel
    pub number_system: bool,
    /// View region changed
    pub view: bool,
    /// Global parameter changed
    pub parameter: bool,
}

impl DirtyFlags {
    /// Everything pending.
    pub const ALL: DirtyFlags =
        DirtyFlags { resolution: true, number_system: true, view: true, parameter: true };

    /// True when any rebind is pending.
    pub fn any(&self) -> bool {
        self.resolution || self.number_system || self.view || self.parameter
    }
}

/// Arguments of the most recent dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DispatchRecord {
    /// Entry point run
    pub variant: KernelVariant,
    /// Iteration the cells started from
    pub last_iteration: u32,
    /// Iteration the cells stopped at
    pub max_iteration: u32,
    /// Global cap
    pub global_max: u32,
}

/// Drives one view window.
#[derive(Debug)]
pub struct KernelExecutor {
    index: usize,
    kernel: Option<Kernel>,
    surface: Option<SurfaceId>,
    extent: Extent,
    iteration: u32,
    dirty: DirtyFlags,
    last_dispatch: Option<DispatchRecord>,
}

impl KernelExecutor {
    /// Executor for window `index`; everything starts dirty.
    pub fn new(index: usize) -> Self {
        Self {
            index,
            kernel: None,
            surface: None,
            extent: Extent::new(1, 1, 1),
            iteration: 0,
            dirty: DirtyFlags::ALL,
            last_dispatch: None,
        }
    }

    /// Window index, also the buffer slot.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Iterations completed since the last reset.
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    /// Output surface, once created.
    pub fn surface(&self) -> Option<SurfaceId> {
        self.surface
    }

    /// Extent of the output surface.
    pub fn extent(&self) -> Extent {
        self.extent
    }

    /// Pending rebinds.
    pub fn dirty(&self) -> DirtyFlags {
        self.dirty
    }

    /// Bound kernel, once prepared.
    pub fn kernel(&self) -> Option<&Kernel> {
        self.kernel.as_ref()
    }

    /// Most recent dispatch.
    pub fn last_dispatch(&self) -> Option<DispatchRecord> {
        self.last_dispatch
    }

    /// Grid extent changed.
    pub fn mark_resolution(&mut self) {
        self.dirty.resolution = true;
    }

    /// Number system, space or render mode changed.
    pub fn mark_number_system(&mut self) {
        self.dirty.number_system = true;
    }

    /// View region changed.
    pub fn mark_view(&mut self) {
        self.dirty.view = true;
    }

    /// Global parameter changed.
    pub fn mark_parameter(&mut self) {
        self.dirty.parameter = true;
    }

    fn reset(&mut self) {
        self.iteration = 0;
    }

    fn kernel_mut(&mut self, arg: KernelArg) -> Result<&mut Kernel, BindError> {
        self.kernel.as_mut().ok_or_else(|| BindError {
            kernel: String::from("<none>"),
            arg,
            reason: BindReason::Missing("kernel"),
        })
    }

    /// Recreate the output surface at the context extent.
    pub fn update_resolution<D: ComputeDevice>(
        &mut self,
        ctx: &mut EngineContext<D>,
    ) -> Result<(), EngineError> {
        if let Some(old) = self.surface.take() {
            ctx.device.free_surface(old);
        }
        let extent = ctx.extent;
        let surface = ctx.device.create_surface(extent).map_err(|source| AllocError::Surface {
            width: extent.width,
            height: extent.height,
            depth: extent.depth,
            source,
        })?;
        self.surface = Some(surface);
        self.extent = extent;
        self.reset();
        debug!(window = self.index, %extent, "created output surface");
        Ok(())
    }

    /// Look up the kernel for the window's variant and bind every persistent argument.
    pub fn update_kernel<D: ComputeDevice>(
        &mut self,
        ctx: &mut EngineContext<D>,
        settings: &Settings,
    ) -> Result<(), EngineError> {
        let window = settings.window(self.index).ok_or(EngineError::UnknownWindow(self.index))?;
        let variant = window.variant(settings.number_system);
        let mut kernel = ctx.programs.find_kernel(variant)?;
        let missing = |arg, what| BindError {
            kernel: variant.entry_point(),
            arg,
            reason: BindReason::Missing(what),
        };
        let surface = self.surface.ok_or_else(|| missing(KernelArg::Output, "output surface"))?;
        let table = ctx
            .programs
            .buffer()
            .and_then(|b| b.table())
            .ok_or_else(|| missing(KernelArg::Buffer, "work buffer"))?;
        kernel.set_arg(KernelArg::Output, ArgValue::Surface(surface))?;
        kernel.set_arg(KernelArg::Buffer, ArgValue::Buffer(table))?;
        kernel.set_arg(KernelArg::View, ArgValue::View(window.view))?;
        kernel.set_arg(KernelArg::Parameter, ArgValue::Number(settings.parameter))?;
        self.kernel = Some(kernel);
        self.reset();
        debug!(window = self.index, kernel = %variant, "bound kernel");
        Ok(())
    }

    /// Rebind the view.
    pub fn update_view(&mut self, window: &ViewWindowSettings) -> Result<(), EngineError> {
        self.kernel_mut(KernelArg::View)?.set_arg(KernelArg::View, ArgValue::View(window.view))?;
        self.reset();
        Ok(())
    }

    /// Rebind the global parameter.
    pub fn update_parameter(&mut self, parameter: Number) -> Result<(), EngineError> {
        self.kernel_mut(KernelArg::Parameter)?
            .set_arg(KernelArg::Parameter, ArgValue::Number(parameter))?;
        self.reset();
        Ok(())
    }

    /// Run the pending rebinds. A resolution change implies a kernel rebind, which in turn
    /// covers view and parameter.
    pub fn prepare<D: ComputeDevice>(
        &mut self,
        ctx: &mut EngineContext<D>,
        settings: &Settings,
    ) -> Result<(), EngineError> {
        if self.dirty.resolution {
            self.update_resolution(ctx)?;
            self.dirty.resolution = false;
            self.dirty.number_system = true;
        }
        if self.dirty.number_system {
            self.update_kernel(ctx, settings)?;
            self.dirty = DirtyFlags::default();
        }
        let window = settings.window(self.index).ok_or(EngineError::UnknownWindow(self.index))?;
        if self.dirty.view {
            self.update_view(window)?;
            self.dirty.view = false;
        }
        if self.dirty.parameter {
            self.update_parameter(settings.parameter)?;
            self.dirty.parameter = false;
        }
        Ok(())
    }

    /// True while the window has iterations left to compute or rebinds pending.
    pub fn needs_more(&self, window: &ViewWindowSettings) -> bool {
        self.dirty.any() || self.iteration < window.max_iterations()
    }

    /// Advance the window by one frame's worth of iterations. Returns `None` when the window
    /// has already reached its cap.
    pub fn enqueue<D: ComputeDevice>(
        &mut self,
        ctx: &mut EngineContext<D>,
        settings: &Settings,
        wait: bool,
    ) -> Result<Option<Fence>, EngineError> {
        self.prepare(ctx, settings)?;
        let window = settings.window(self.index).ok_or(EngineError::UnknownWindow(self.index))?;
        let global_max = window.max_iterations();
        let last = self.iteration;
        if last >= global_max {
            return Ok(None);
        }
        let max = last.saturating_add(window.iterations_per_frame()).min(global_max);

        let kernel = self.kernel_mut(KernelArg::LastIteration)?;
        kernel.set_arg(KernelArg::LastIteration, ArgValue::Uint(last))?;
        kernel.set_arg(KernelArg::MaxIteration, ArgValue::Uint(max))?;
        kernel.set_arg(KernelArg::GlobalMax, ArgValue::Uint(global_max))?;

        ctx.programs.use_buffer(&mut ctx.device, self.index, true)?;

        let Some(kernel) = self.kernel.as_ref() else {
            return Ok(None);
        };
        let launch = kernel.launch(self.extent)?;
        let surface = launch.output;
        let name = launch.entry_point;
        let device = &mut ctx.device;
        if launch.variant.mode == RenderMode::Translated {
            device
                .clear_surface(surface)
                .map_err(|e| DispatchError::new(DeviceOp::Clear, surface.to_string(), e))?;
        }
        device
            .acquire_surface(surface)
            .map_err(|e| DispatchError::new(DeviceOp::Acquire, surface.to_string(), e))?;
        let fence = device
            .dispatch(&launch, wait)
            .map_err(|e| DispatchError::new(DeviceOp::Dispatch, name, e))?;
        device
            .release_surface(surface)
            .map_err(|e| DispatchError::new(DeviceOp::Release, surface.to_string(), e))?;

        self.last_dispatch = Some(DispatchRecord {
            variant: launch.variant,
            last_iteration: last,
            max_iteration: max,
            global_max,
        });
        self.iteration = max;
        trace!(window = self.index, last, max, global_max, "enqueued");
        Ok(Some(fence))
    }

    /// Copy the output surface to the host.
    pub fn read_surface<D: ComputeDevice>(
        &self,
        ctx: &mut EngineContext<D>,
    ) -> Result<Vec<[u8; 4]>, EngineError> {
        let surface = self.surface.ok_or(EngineError::UnknownWindow(self.index))?;
        ctx.device
            .read_surface(surface)
            .map_err(|e| DispatchError::new(DeviceOp::Read, surface.to_string(), e).into())
    }

    /// Free the surface and drop the kernel.
    pub fn release<D: ComputeDevice>(&mut self, ctx: &mut EngineContext<D>) {
        if let Some(surface) = self.surface.take() {
            ctx.device.free_surface(surface);
        }
        self.kernel = None;
        self.dirty = DirtyFlags::ALL;
        self.reset();
    }
}
