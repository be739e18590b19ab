//! Error taxonomy for the engine.
//!
//! Build, allocation and binding failures are recoverable at the call boundary: the caller
//! may retry with different settings. Dispatch failures poison the device context.

use std::path::PathBuf;

use crate::kernel::KernelArg;
use crate::renderer::RendererState;

/// Failure reported by a compute backend.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// The device could not satisfy an allocation.
    #[error("out of device memory ({bytes} bytes requested)")]
    OutOfMemory {
        /// Requested size
        bytes: u64,
    },
    /// A single allocation above the device limit.
    #[error("allocation of {bytes} bytes exceeds the {limit}-byte limit")]
    TooLarge {
        /// Requested size
        bytes: u64,
        /// Largest single allocation the device accepts
        limit: u64,
    },
    /// A handle that was never issued or was already freed.
    #[error("unknown {0} handle")]
    InvalidHandle(&'static str),
    /// A compute write to a surface that is not acquired.
    #[error("surface {0} is not acquired for compute")]
    NotAcquired(u32),
    /// A surface acquired twice without release.
    #[error("surface {0} is already acquired")]
    AlreadyAcquired(u32),
    /// Host data does not match the device resource size.
    #[error("size mismatch: device holds {device} bytes, host supplied {host}")]
    SizeMismatch {
        /// Device-side size
        device: u64,
        /// Host-side size
        host: u64,
    },
    /// Backend-specific failure text.
    #[error("{0}")]
    Backend(String),
}

/// Kernel generator failures.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CodegenError {
    /// A row doubles a system that is not defined earlier in the table.
    #[error("number system `{system}` doubles unknown element `{element}`")]
    UnknownElement {
        /// Offending row
        system: String,
        /// Element it references
        element: String,
    },
    /// Two rows share a name.
    #[error("number system `{system}` is defined twice")]
    Duplicate {
        /// Duplicated name
        system: String,
    },
    /// The doubled dimension does not fit a `Number`.
    #[error("number system `{system}` has dimension {dim}, above the capacity {max}")]
    TooWide {
        /// Offending row
        system: String,
        /// Its dimension
        dim: usize,
        /// Raw capacity
        max: usize,
    },
    /// A row without matching host arithmetic.
    #[error("number system `{system}` has no matching host arithmetic")]
    NoHostArithmetic {
        /// Offending row
        system: String,
    },
    /// Workgroup dimensions must be positive.
    #[error("invalid workgroup size {0:?}")]
    Workgroup([u32; 2]),
    /// Nothing to generate.
    #[error("number system table is empty")]
    Empty,
}

/// Program build failures.
#[derive(thiserror::Error, Debug)]
pub enum BuildError {
    /// The device rejected the generated program; diagnostics are in the log file.
    #[error("kernel program failed to build; see {}", .log_path.display())]
    Failed {
        /// Location of the persisted build log
        log_path: PathBuf,
    },
    /// Source generation failed before reaching the device.
    #[error(transparent)]
    Codegen(#[from] CodegenError),
    /// The build log could not be written.
    #[error("writing build log {}: {source}", .path.display())]
    Log {
        /// Log location
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Device memory failures while building buffers or surfaces.
#[derive(thiserror::Error, Debug)]
pub enum AllocError {
    /// One chunk of the work buffer could not be allocated; earlier chunks were freed.
    #[error("allocating work buffer chunk {index} of {count} ({bytes} bytes) failed: {source}")]
    Chunk {
        /// Index of the failing chunk
        index: usize,
        /// Chunks the layout needed
        count: usize,
        /// Size of the failing chunk
        bytes: u64,
        /// Device failure
        #[source]
        source: DeviceError,
    },
    /// The layout needs more chunks than the kernels can bind.
    #[error("work buffer needs {needed} chunks but kernels bind at most {max}")]
    TooManyChunks {
        /// Chunks required
        needed: usize,
        /// Binding limit
        max: usize,
    },
    /// The per-allocation limit cannot hold one cell.
    #[error("allocation limit of {max_bytes} bytes cannot hold one {item_size}-byte cell")]
    ZeroCapacity {
        /// Device allocation limit
        max_bytes: u64,
        /// Cell size
        item_size: usize,
    },
    /// The device chunk table could not be created.
    #[error("creating the chunk table failed: {0}")]
    Table(#[source] DeviceError),
    /// An output surface could not be created.
    #[error("creating a {width}x{height}x{depth} output surface failed: {source}")]
    Surface {
        /// Surface width
        width: u32,
        /// Surface height
        height: u32,
        /// Surface depth
        depth: u32,
        /// Device failure
        #[source]
        source: DeviceError,
    },
}

/// Why a kernel argument was rejected.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum BindReason {
    /// Value of the wrong kind for the argument slot.
    #[error("expected {expected}, got {got}")]
    WrongKind {
        /// Kind the slot takes
        expected: &'static str,
        /// Kind supplied
        got: &'static str,
    },
    /// View mapping does not fit the kernel's number system.
    #[error("view mapping {mapping:?} is invalid for a {dim}-dimensional system")]
    InvalidMapping {
        /// Offending mapping
        mapping: [i32; 3],
        /// System dimension
        dim: usize,
    },
    /// Parameter uses components beyond the system dimension.
    #[error("value has components beyond dimension {dim}")]
    TooWide {
        /// System dimension
        dim: usize,
    },
    /// Launch attempted with a slot never bound.
    #[error("argument was never bound")]
    Unbound,
    /// The program has no entry point for the variant.
    #[error("program has no such entry point")]
    UnknownKernel,
    /// A resource the argument refers to does not exist yet.
    #[error("{0} is not available")]
    Missing(&'static str),
}

/// A kernel argument rejected during binding or launch.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("kernel `{kernel}` rejected argument `{arg}`: {reason}")]
pub struct BindError {
    /// Entry point name
    pub kernel: String,
    /// Argument slot
    pub arg: KernelArg,
    /// Cause
    pub reason: BindReason,
}

/// Queue operation that failed at run time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceOp {
    /// Surface acquire for compute
    Acquire,
    /// Kernel dispatch
    Dispatch,
    /// Surface release back to display
    Release,
    /// Frame-boundary queue finish
    Finish,
    /// Back-buffer map/swap/unmap
    Swap,
    /// Waiting on a completion fence
    Wait,
    /// Surface clear
    Clear,
    /// Surface readback
    Read,
}

impl std::fmt::Display for DeviceOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Acquire => "acquire",
            Self::Dispatch => "dispatch",
            Self::Release => "release",
            Self::Finish => "finish",
            Self::Swap => "buffer swap",
            Self::Wait => "wait",
            Self::Clear => "clear",
            Self::Read => "readback",
        };
        f.write_str(s)
    }
}

/// Runtime queue failure; the device context must be considered lost.
#[derive(thiserror::Error, Debug)]
#[error("{op} failed on {resource}: {source}")]
pub struct DispatchError {
    /// Failed operation
    pub op: DeviceOp,
    /// Resource involved (kernel, surface or chunk)
    pub resource: String,
    /// Device failure
    #[source]
    pub source: DeviceError,
}

impl DispatchError {
    /// Wrap a device error with operation context.
    pub fn new(op: DeviceOp, resource: impl Into<String>, source: DeviceError) -> Self {
        Self { op, resource: resource.into(), source }
    }
}

/// Top-level engine error.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    /// Program build failure
    #[error(transparent)]
    Build(#[from] BuildError),
    /// Device memory exhaustion
    #[error(transparent)]
    Alloc(#[from] AllocError),
    /// Kernel argument rejected
    #[error(transparent)]
    Bind(#[from] BindError),
    /// Queue failure; unrecoverable
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    /// Call made in the wrong renderer state.
    #[error("renderer is {actual:?}, expected {expected:?}")]
    State {
        /// Required state
        expected: RendererState,
        /// Current state
        actual: RendererState,
    },
    /// Settings have no window with this index.
    #[error("no view window with index {0}")]
    UnknownWindow(usize),
    /// Back buffer has no such slot.
    #[error("no buffer slot {index} ({count} slots)")]
    UnknownSlot {
        /// Requested slot
        index: usize,
        /// Slots available
        count: usize,
    },
}

impl EngineError {
    /// False for failures that leave the device context in an unknown state.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Dispatch(_))
    }
}
