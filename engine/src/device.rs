//! Compute backend contract.
//!
//! The renderer drives everything through [`ComputeDevice`]: program builds, work buffer
//! chunks and their table, output surfaces with acquire/release bookkeeping, dispatches and
//! fences. [`crate::cpu::CpuDevice`] executes kernels on the host; [`crate::gpu::WgpuDevice`]
//! runs the generated WGSL.

use crate::codegen::ProgramSource;
use crate::error::DeviceError;
use crate::grid::Extent;
use crate::layout::{KernelUniforms, WorkCell};
use crate::options::KernelVariant;

macro_rules! handle {
    ($($(#[$doc:meta])* $name:ident => $kind:literal),+ $(,)?) => {$(
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub struct $name(pub u32);

        impl $name {
            /// Resource kind, for error messages.
            pub const KIND: &'static str = $kind;
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{} #{}", $kind, self.0)
            }
        }
    )+};
}

handle! {
    /// A built kernel program.
    ProgramId => "program",
    /// One work buffer chunk.
    ChunkId => "chunk",
    /// A chunk table bound alongside the chunks.
    TableId => "chunk table",
    /// An output surface.
    SurfaceId => "surface",
}

/// Slot storage with index reuse; both backends keep their resources in these.
#[derive(Debug)]
pub struct Arena<T> {
    slots: Vec<Option<T>>,
    free: Vec<u32>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self { slots: Vec::new(), free: Vec::new() }
    }
}

impl<T> Arena<T> {
    /// Store a value and return its index.
    pub fn insert(&mut self, value: T) -> u32 {
        match self.free.pop() {
            Some(index) => {
                self.slots[index as usize] = Some(value);
                index
            }
            None => {
                self.slots.push(Some(value));
                (self.slots.len() - 1) as u32
            }
        }
    }

    /// Take a value out, freeing its index.
    pub fn remove(&mut self, index: u32) -> Option<T> {
        let value = self.slots.get_mut(index as usize)?.take()?;
        self.free.push(index);
        Some(value)
    }

    /// Value at `index`.
    pub fn get(&self, index: u32) -> Option<&T> {
        self.slots.get(index as usize)?.as_ref()
    }

    /// Mutable value at `index`.
    pub fn get_mut(&mut self, index: u32) -> Option<&mut T> {
        self.slots.get_mut(index as usize)?.as_mut()
    }

    /// Live values.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// True when nothing is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Completion marker of enqueued device work.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Fence(Option<u64>);

impl Fence {
    /// Work that already completed (or never existed).
    pub const SIGNALED: Fence = Fence(None);

    /// Work identified by a backend submission serial.
    pub const fn pending(serial: u64) -> Self {
        Self(Some(serial))
    }

    /// Serial of the submission, if still tracked.
    pub const fn serial(self) -> Option<u64> {
        self.0
    }

    /// True when waiting is unnecessary.
    pub const fn is_signaled(self) -> bool {
        self.0.is_none()
    }
}

/// Successful program build.
#[derive(Debug)]
pub struct BuildOutput {
    /// The program
    pub program: ProgramId,
    /// Compiler output, empty when clean
    pub log: String,
}

/// Rejected program build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildFailure {
    /// Compiler diagnostics
    pub log: String,
}

/// One fully bound kernel dispatch.
#[derive(Clone, Copy, Debug)]
pub struct Launch<'a> {
    /// Program holding the entry point
    pub program: ProgramId,
    /// Entry point name
    pub entry_point: &'a str,
    /// Variant the entry point implements
    pub variant: KernelVariant,
    /// Global work size, one invocation per cell
    pub extent: Extent,
    /// Target surface; must be acquired
    pub output: SurfaceId,
    /// Work buffer chunk table
    pub table: TableId,
    /// Scalar and view arguments
    pub uniforms: KernelUniforms,
}

/// A compute backend.
///
/// Calls taking `wait` return a fence: when `wait` is true the work has completed on
/// return and the fence is signaled, otherwise the caller must [`ComputeDevice::wait`]
/// before depending on the result.
pub trait ComputeDevice {
    /// Human-readable device name.
    fn name(&self) -> String;

    /// True for hardware backends.
    fn is_gpu(&self) -> bool;

    /// Largest single buffer the device accepts, in bytes.
    fn max_allocation_bytes(&self) -> u64;

    /// Chunks one kernel can bind.
    fn max_chunks(&self) -> usize;

    /// Compile a program.
    fn build_program(&mut self, source: &ProgramSource) -> Result<BuildOutput, BuildFailure>;

    /// Release a program.
    fn release_program(&mut self, program: ProgramId);

    /// Allocate a zeroed chunk of `items` cells.
    fn allocate_chunk(&mut self, items: usize) -> Result<ChunkId, DeviceError>;

    /// Free a chunk.
    fn free_chunk(&mut self, chunk: ChunkId);

    /// Describe how `chunks` partition `total` cells of `capacity` each.
    fn create_chunk_table(
        &mut self,
        chunks: &[ChunkId],
        capacity: usize,
        total: usize,
    ) -> Result<TableId, DeviceError>;

    /// Free a chunk table.
    fn free_chunk_table(&mut self, table: TableId);

    /// Exchange the contents of a chunk with `host`: the device gets `host`'s cells and
    /// `host` receives the previous device contents.
    fn swap_chunk(
        &mut self,
        chunk: ChunkId,
        host: &mut [WorkCell],
        wait: bool,
    ) -> Result<Fence, DeviceError>;

    /// Create a transparent-black surface.
    fn create_surface(&mut self, extent: Extent) -> Result<SurfaceId, DeviceError>;

    /// Free a surface.
    fn free_surface(&mut self, surface: SurfaceId);

    /// Reset every texel to transparent black.
    fn clear_surface(&mut self, surface: SurfaceId) -> Result<(), DeviceError>;

    /// Hand a surface to compute.
    fn acquire_surface(&mut self, surface: SurfaceId) -> Result<(), DeviceError>;

    /// Hand a surface back for display.
    fn release_surface(&mut self, surface: SurfaceId) -> Result<(), DeviceError>;

    /// Copy a surface to the host as RGBA8 texels in `(z, y, x)` order.
    fn read_surface(&mut self, surface: SurfaceId) -> Result<Vec<[u8; 4]>, DeviceError>;

    /// Enqueue a kernel.
    fn dispatch(&mut self, launch: &Launch<'_>, wait: bool) -> Result<Fence, DeviceError>;

    /// Block until the fences signal.
    fn wait(&mut self, fences: &[Fence]) -> Result<(), DeviceError>;

    /// Block until all enqueued work completed.
    fn finish(&mut self) -> Result<(), DeviceError>;
}
