//! Frame orchestration across every view window.
//!
//! The renderer owns the engine context and one executor per window. Each frame it diffs the
//! settings against the previous frame, marks the affected executors dirty and lets each
//! visible window that still has work advance by one dispatch.

use hyperorbit_algebra::{Number, NumberSystem};
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::context::EngineContext;
use crate::device::ComputeDevice;
use crate::error::{DeviceOp, DispatchError, EngineError};
use crate::executor::{DispatchRecord, KernelExecutor};
use crate::grid::Extent;
use crate::options::{RenderMode, Space};
use crate::program::ProgramManager;
use crate::settings::Settings;
use crate::status::StatusSink;
use crate::viewspace::Viewspace;

/// Lifecycle of a [`Renderer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RendererState {
    /// No program built yet
    Uninitialized,
    /// Rendering
    Ready,
    /// Torn down after `destroy` or a device failure
    Destroyed,
}

/// What one window did during a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowFrame {
    /// Window index
    pub index: usize,
    /// Dispatch enqueued, if the window had work left
    pub dispatch: Option<DispatchRecord>,
}

/// Summary of one frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Visible windows in the order they were processed
    pub windows: Vec<WindowFrame>,
}

impl FrameReport {
    /// Dispatches enqueued this frame.
    pub fn dispatches(&self) -> usize {
        self.windows.iter().filter(|w| w.dispatch.is_some()).count()
    }
}

#[derive(Clone, Debug, PartialEq)]
struct Snapshot {
    number_system: NumberSystem,
    extent: Extent,
    parameter: Number,
    windows: Vec<(Space, RenderMode, Viewspace)>,
}

impl Snapshot {
    fn of(settings: &Settings) -> Self {
        Self {
            number_system: settings.number_system,
            extent: settings.extent(),
            parameter: settings.parameter,
            windows: settings.windows.iter().map(|w| (w.space, w.render_mode, w.view)).collect(),
        }
    }
}

/// Drives every view window on one device.
pub struct Renderer<D> {
    state: RendererState,
    ctx: EngineContext<D>,
    executors: Vec<KernelExecutor>,
    snapshot: Option<Snapshot>,
    resize_pending: bool,
}

impl<D: ComputeDevice> Renderer<D> {
    /// Renderer on `device`; call [`Renderer::initialize`] before rendering.
    pub fn new(device: D, config: EngineConfig) -> Self {
        Self {
            state: RendererState::Uninitialized,
            ctx: EngineContext::new(device, ProgramManager::new(config), Extent::new(1, 1, 1)),
            executors: Vec::new(),
            snapshot: None,
            resize_pending: false,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RendererState {
        self.state
    }

    /// True after a failed work buffer allocation; retried on the next settings change.
    pub fn resize_pending(&self) -> bool {
        self.resize_pending
    }

    fn expect_state(&self, expected: RendererState) -> Result<(), EngineError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(EngineError::State { expected, actual: self.state })
        }
    }

    /// Build the program, allocate the work buffer and create one executor per window.
    ///
    /// A build failure leaves the renderer uninitialized. Once the program is built the
    /// renderer is ready even if the buffer allocation fails; that failure is returned and
    /// the allocation is retried by [`Renderer::apply_settings`].
    pub fn initialize(
        &mut self,
        settings: &Settings,
        status: &mut dyn StatusSink,
    ) -> Result<(), EngineError> {
        self.expect_state(RendererState::Uninitialized)?;
        status.push("Initializing renderer");
        let built = self.ctx.programs.build(&mut self.ctx.device, status);
        if let Err(e) = built {
            status.pop();
            return Err(e.into());
        }
        self.state = RendererState::Ready;
        for _ in &settings.windows {
            self.create_executor();
        }
        self.snapshot = Some(Snapshot::of(settings));
        status.push("Allocating work buffer");
        let allocated = self.reallocate(settings);
        status.pop();
        status.pop();
        allocated?;
        info!(device = %self.ctx.device.name(), windows = self.executors.len(), "renderer ready");
        Ok(())
    }

    fn reallocate(&mut self, settings: &Settings) -> Result<(), EngineError> {
        let extent = settings.extent();
        self.ctx.extent = extent;
        let slots = settings.windows.len().max(1);
        match self.ctx.programs.update_resolution(&mut self.ctx.device, extent, slots) {
            Ok(()) => {
                self.resize_pending = false;
                for executor in &mut self.executors {
                    executor.mark_resolution();
                }
                debug!(%extent, slots, "work buffer allocated");
                Ok(())
            }
            Err(e) => {
                warn!(%extent, error = %e, "work buffer allocation failed; will retry");
                self.resize_pending = true;
                Err(e.into())
            }
        }
    }

    /// Append an executor for the next window index.
    pub fn create_executor(&mut self) -> usize {
        let index = self.executors.len();
        self.executors.push(KernelExecutor::new(index));
        index
    }

    /// All executors, by window index.
    pub fn executors(&self) -> &[KernelExecutor] {
        &self.executors
    }

    /// Executor of window `index`.
    pub fn executor(&self, index: usize) -> Option<&KernelExecutor> {
        self.executors.get(index)
    }

    /// Mutable executor of window `index`.
    pub fn executor_mut(&mut self, index: usize) -> Option<&mut KernelExecutor> {
        self.executors.get_mut(index)
    }

    /// Engine context.
    pub fn context(&self) -> &EngineContext<D> {
        &self.ctx
    }

    /// Mutable engine context.
    pub fn context_mut(&mut self) -> &mut EngineContext<D> {
        &mut self.ctx
    }

    /// Diff `settings` against the previous call and mark what changed.
    pub fn apply_settings(&mut self, settings: &Settings) -> Result<(), EngineError> {
        self.expect_state(RendererState::Ready)?;
        let next = Snapshot::of(settings);
        let Some(prev) = self.snapshot.replace(next.clone()) else {
            return Ok(());
        };

        // windows come and go at the end; slot i always belongs to window i
        while self.executors.len() > settings.windows.len() {
            if let Some(mut executor) = self.executors.pop() {
                executor.release(&mut self.ctx);
            }
            self.ctx.programs.remove_buffer_slot(&mut self.ctx.device)?;
        }
        while self.executors.len() < settings.windows.len() {
            self.create_executor();
            let slots = self.ctx.programs.back_buffer().map_or(0, |b| b.slot_count());
            if slots < self.executors.len() {
                self.ctx.programs.add_buffer_slot();
            }
        }

        if next.extent != prev.extent || self.resize_pending {
            self.reallocate(settings)?;
        }
        for (index, executor) in self.executors.iter_mut().enumerate() {
            if next.number_system != prev.number_system {
                executor.mark_number_system();
            }
            if next.parameter != prev.parameter {
                executor.mark_parameter();
            }
            match (prev.windows.get(index), next.windows.get(index)) {
                (Some(before), Some(after)) => {
                    if (before.0, before.1) != (after.0, after.1) {
                        executor.mark_number_system();
                    }
                    if before.2 != after.2 {
                        executor.mark_view();
                    }
                }
                _ => executor.mark_number_system(),
            }
        }
        Ok(())
    }

    /// Advance every visible window that still has work by one dispatch, then finish the
    /// queue. A device failure tears the renderer down.
    pub fn render_frame(
        &mut self,
        settings: &Settings,
        visible: &[usize],
    ) -> Result<FrameReport, EngineError> {
        self.apply_settings(settings)?;
        let mut report = FrameReport::default();
        if self.resize_pending {
            return Ok(report);
        }
        match self.dispatch_visible(settings, visible, &mut report) {
            Ok(()) => Ok(report),
            Err(e) if e.is_recoverable() => Err(e),
            Err(e) => {
                error!(error = %e, "device failure; tearing down renderer");
                self.destroy();
                Err(e)
            }
        }
    }

    fn dispatch_visible(
        &mut self,
        settings: &Settings,
        visible: &[usize],
        report: &mut FrameReport,
    ) -> Result<(), EngineError> {
        for &index in visible {
            let window = settings.window(index).ok_or(EngineError::UnknownWindow(index))?;
            let executor =
                self.executors.get_mut(index).ok_or(EngineError::UnknownWindow(index))?;
            let mut dispatch = None;
            if executor.needs_more(window)
                && executor.enqueue(&mut self.ctx, settings, false)?.is_some()
            {
                dispatch = executor.last_dispatch();
            }
            report.windows.push(WindowFrame { index, dispatch });
        }
        self.ctx
            .device
            .finish()
            .map_err(|e| DispatchError::new(DeviceOp::Finish, "queue", e))?;
        Ok(())
    }

    /// Copy window `index`'s surface to the host.
    pub fn read_surface(&mut self, index: usize) -> Result<Vec<[u8; 4]>, EngineError> {
        self.expect_state(RendererState::Ready)?;
        let executor = self.executors.get(index).ok_or(EngineError::UnknownWindow(index))?;
        executor.read_surface(&mut self.ctx)
    }

    /// Release every device resource. Idempotent.
    pub fn destroy(&mut self) {
        if self.state == RendererState::Destroyed {
            return;
        }
        for executor in &mut self.executors {
            executor.release(&mut self.ctx);
        }
        self.executors.clear();
        self.ctx.programs.release(&mut self.ctx.device);
        self.snapshot = None;
        self.state = RendererState::Destroyed;
        info!("renderer destroyed");
    }
}
