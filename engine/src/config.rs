//! Engine configuration.
//!
//! Program-level settings are baked into the generated kernels, so changing any of them
//! requires a rebuild. Per-window and per-scene settings live in [`crate::settings`].

use std::path::PathBuf;

use hyperorbit_algebra::Arithmetic;

/// Default squared-modulus escape threshold.
pub const DEFAULT_ESCAPE_THRESHOLD: f32 = 8.0;

/// Default build log location, relative to the working directory.
pub const DEFAULT_BUILD_LOG: &str = "kernel_build.log";

/// Map iterated by every kernel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum IterationFunction {
    /// `z² + c`
    #[default]
    Quadratic,
    /// `z³ + c`
    Cubic,
    /// `conj(z)² + c`, the tricorn family for Cayley-Dickson systems
    Conjugate,
}

impl IterationFunction {
    /// Every supported map.
    pub const ALL: [IterationFunction; 3] =
        [IterationFunction::Quadratic, IterationFunction::Cubic, IterationFunction::Conjugate];

    /// Short name used on the command line.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Quadratic => "quadratic",
            Self::Cubic => "cubic",
            Self::Conjugate => "conjugate",
        }
    }

    /// Look a map up by name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    /// Host evaluation.
    #[inline]
    pub fn apply<A: Arithmetic>(self, z: A, c: A) -> A {
        match self {
            Self::Quadratic => z.sqr().add(c),
            Self::Cubic => z.sqr().mul(z).add(c),
            Self::Conjugate => z.conj().sqr().add(c),
        }
    }

    /// WGSL expression computing the next `z` for the system suffix `s`.
    pub fn wgsl(self, s: &str) -> String {
        match self {
            Self::Quadratic => format!("add_{s}(sqr_{s}(z), c)"),
            Self::Cubic => format!("add_{s}(mul_{s}(sqr_{s}(z), z), c)"),
            Self::Conjugate => format!("add_{s}(sqr_{s}(conj_{s}(z)), c)"),
        }
    }
}

/// Settings compiled into the kernel program.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KernelConfig {
    /// Squared modulus at which a cell counts as escaped.
    pub escape_threshold: f32,
    /// Iterated map.
    pub function: IterationFunction,
    /// Workgroup size along x and y (z is always 1).
    pub workgroup: [u32; 2],
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            escape_threshold: DEFAULT_ESCAPE_THRESHOLD,
            function: IterationFunction::Quadratic,
            workgroup: [8, 8],
        }
    }
}

/// Renderer-wide configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Kernel program settings.
    pub kernel: KernelConfig,
    /// File rewritten on every program build with the success marker or diagnostics.
    pub build_log_path: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { kernel: KernelConfig::default(), build_log_path: PathBuf::from(DEFAULT_BUILD_LOG) }
    }
}
