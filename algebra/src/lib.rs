#![forbid(unsafe_code)]
#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]
//! Host arithmetic for nested hypercomplex number systems.
//!
//! The same table drives the WGSL generator in the engine crate, so host results and
//! kernel results agree component for component.

mod arith;
mod number;
mod systems;

pub use arith::{Algebra, Arithmetic, CayleyDickson, Construction, Multicomplex, Real};
pub use number::Number;
pub use systems::{
    Bicomplex, Complex, NumberSystem, Octonion, Quaternion, SystemDef, SystemVisitor, Tricomplex,
    NUMBER_SYSTEMS,
};

/// Raw capacity of a [`Number`]: the largest table dimension.
pub const MAX_DIM: usize = 8;

/// Scalar type name used in generated kernels.
pub const FLOAT: &str = "f32";

#[cfg(test)]
mod tests;
