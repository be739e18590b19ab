//! Kernel argument binding.
//!
//! Every entry point takes the same seven arguments. Bindings persist between dispatches, so
//! per frame only the iteration bounds are rebound.

use std::fmt;

use hyperorbit_algebra::Number;

use crate::device::{Launch, ProgramId, SurfaceId, TableId};
use crate::error::{BindError, BindReason};
use crate::grid::Extent;
use crate::layout::KernelUniforms;
use crate::options::KernelVariant;
use crate::viewspace::Viewspace;

/// Argument slots of every entry point, in binding order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KernelArg {
    /// Output surface
    Output,
    /// Work buffer chunk table
    Buffer,
    /// Visible region and axis mapping
    View,
    /// Global parameter
    Parameter,
    /// Iteration the work buffer was left at
    LastIteration,
    /// Iteration to stop at
    MaxIteration,
    /// Global iteration cap
    GlobalMax,
}

impl KernelArg {
    /// Every slot, in binding order.
    pub const ALL: [KernelArg; 7] = [
        KernelArg::Output,
        KernelArg::Buffer,
        KernelArg::View,
        KernelArg::Parameter,
        KernelArg::LastIteration,
        KernelArg::MaxIteration,
        KernelArg::GlobalMax,
    ];

    const fn index(self) -> usize {
        self as usize
    }

    const fn expects(self) -> &'static str {
        match self {
            Self::Output => "surface",
            Self::Buffer => "buffer",
            Self::View => "view",
            Self::Parameter => "number",
            Self::LastIteration | Self::MaxIteration | Self::GlobalMax => "uint",
        }
    }
}

impl fmt::Display for KernelArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Output => "output",
            Self::Buffer => "buffer",
            Self::View => "view",
            Self::Parameter => "parameter",
            Self::LastIteration => "last_iteration",
            Self::MaxIteration => "max_iteration",
            Self::GlobalMax => "global_max",
        };
        f.write_str(s)
    }
}

/// A value bound to a kernel argument.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ArgValue {
    /// Output surface
    Surface(SurfaceId),
    /// Work buffer
    Buffer(TableId),
    /// View region
    View(Viewspace),
    /// Number-system value
    Number(Number),
    /// Scalar
    Uint(u32),
}

impl ArgValue {
    /// Kind name used in errors.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Surface(_) => "surface",
            Self::Buffer(_) => "buffer",
            Self::View(_) => "view",
            Self::Number(_) => "number",
            Self::Uint(_) => "uint",
        }
    }
}

/// One entry point of a built program together with its bound arguments.
#[derive(Clone, Debug)]
pub struct Kernel {
    program: ProgramId,
    variant: KernelVariant,
    entry_point: String,
    args: [Option<ArgValue>; 7],
}

impl Kernel {
    /// Unbound kernel for `variant` in `program`.
    pub fn new(program: ProgramId, variant: KernelVariant, entry_point: String) -> Self {
        Self { program, variant, entry_point, args: [None; 7] }
    }

    /// Variant implemented.
    pub fn variant(&self) -> KernelVariant {
        self.variant
    }

    /// Entry point name.
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    /// Bound value of `arg`.
    pub fn arg(&self, arg: KernelArg) -> Option<ArgValue> {
        self.args[arg.index()]
    }

    fn reject(&self, arg: KernelArg, reason: BindReason) -> BindError {
        BindError { kernel: self.entry_point.clone(), arg, reason }
    }

    /// Bind `value` to `arg`, checking kind and fit against the kernel's system.
    pub fn set_arg(&mut self, arg: KernelArg, value: ArgValue) -> Result<(), BindError> {
        if value.kind() != arg.expects() {
            return Err(self.reject(
                arg,
                BindReason::WrongKind { expected: arg.expects(), got: value.kind() },
            ));
        }
        let dim = self.variant.system.dim();
        match value {
            ArgValue::View(view) => {
                if view.validate(dim).is_err() {
                    return Err(self.reject(
                        arg,
                        BindReason::InvalidMapping { mapping: view.mapping, dim },
                    ));
                }
            }
            ArgValue::Number(n) if !n.fits(dim) => {
                return Err(self.reject(arg, BindReason::TooWide { dim }));
            }
            _ => {}
        }
        self.args[arg.index()] = Some(value);
        Ok(())
    }

    fn bound<T>(
        &self,
        arg: KernelArg,
        pick: impl Fn(ArgValue) -> Option<T>,
    ) -> Result<T, BindError> {
        self.arg(arg).and_then(pick).ok_or_else(|| self.reject(arg, BindReason::Unbound))
    }

    /// Assemble a dispatch over `extent`; every argument must be bound.
    pub fn launch(&self, extent: Extent) -> Result<Launch<'_>, BindError> {
        let output = self.bound(KernelArg::Output, |v| match v {
            ArgValue::Surface(s) => Some(s),
            _ => None,
        })?;
        let table = self.bound(KernelArg::Buffer, |v| match v {
            ArgValue::Buffer(t) => Some(t),
            _ => None,
        })?;
        let view = self.bound(KernelArg::View, |v| match v {
            ArgValue::View(view) => Some(view),
            _ => None,
        })?;
        let parameter = self.bound(KernelArg::Parameter, |v| match v {
            ArgValue::Number(n) => Some(n),
            _ => None,
        })?;
        let uint = |v: ArgValue| match v {
            ArgValue::Uint(u) => Some(u),
            _ => None,
        };
        let last = self.bound(KernelArg::LastIteration, uint)?;
        let max = self.bound(KernelArg::MaxIteration, uint)?;
        let global = self.bound(KernelArg::GlobalMax, uint)?;
        Ok(Launch {
            program: self.program,
            entry_point: &self.entry_point,
            variant: self.variant,
            extent,
            output,
            table,
            uniforms: KernelUniforms::new(&view, &parameter, extent, last, max, global),
        })
    }
}

#[cfg(test)]
mod tests {
    use hyperorbit_algebra::NumberSystem;

    use super::*;
    use crate::options::{RenderMode, Space};

    fn kernel() -> Kernel {
        let variant = KernelVariant::new(Space::Phase, RenderMode::Escape, NumberSystem::Complex);
        Kernel::new(ProgramId(0), variant, variant.entry_point())
    }

    #[test]
    fn rejects_wrong_kinds_and_wide_values() {
        let mut k = kernel();
        let err = k.set_arg(KernelArg::Output, ArgValue::Uint(3)).unwrap_err();
        assert_eq!(err.reason, BindReason::WrongKind { expected: "surface", got: "uint" });
        let wide = Number::from_components(&[0.0, 0.0, 1.0]);
        let err = k.set_arg(KernelArg::Parameter, ArgValue::Number(wide)).unwrap_err();
        assert_eq!(err.reason, BindReason::TooWide { dim: 2 });
        let view = Viewspace::new(Number::ZERO, 1.0, [1, 3, 0]);
        let err = k.set_arg(KernelArg::View, ArgValue::View(view)).unwrap_err();
        assert!(matches!(err.reason, BindReason::InvalidMapping { dim: 2, .. }));
        assert_eq!(err.to_string().split('`').nth(1), Some("phase_escape_complex"));
    }

    #[test]
    fn launch_requires_every_argument() {
        let mut k = kernel();
        k.set_arg(KernelArg::Output, ArgValue::Surface(SurfaceId(1))).unwrap();
        k.set_arg(KernelArg::Buffer, ArgValue::Buffer(TableId(2))).unwrap();
        k.set_arg(KernelArg::View, ArgValue::View(Viewspace::default())).unwrap();
        k.set_arg(KernelArg::Parameter, ArgValue::Number(Number::ZERO)).unwrap();
        k.set_arg(KernelArg::LastIteration, ArgValue::Uint(0)).unwrap();
        k.set_arg(KernelArg::MaxIteration, ArgValue::Uint(10)).unwrap();
        let err = k.launch(Extent::new(4, 4, 1)).unwrap_err();
        assert_eq!((err.arg, err.reason), (KernelArg::GlobalMax, BindReason::Unbound));
        k.set_arg(KernelArg::GlobalMax, ArgValue::Uint(10)).unwrap();
        let launch = k.launch(Extent::new(4, 4, 1)).unwrap();
        assert_eq!(launch.uniforms.max_iteration, 10);
        assert_eq!(launch.output, SurfaceId(1));
    }
}
