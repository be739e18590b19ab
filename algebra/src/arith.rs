//! Generic doubling constructions over a scalar base.
//!
//! Every composite system is a pair `(x, y)` of some element system. The two families only
//! differ in where conjugation enters the product.

use core::fmt::Debug;

/// Scalar base of every system. `f32` everywhere to mirror WGSL exactly.
pub type Real = f32;

/// Doubling family used to build a composite system from its element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Construction {
    /// Conjugation-aware doubling; modulus stays multiplicative (complex, quaternion, octonion).
    CayleyDickson,
    /// Conjugation-free doubling; commutative with zero divisors (bicomplex, tricomplex).
    Multicomplex,
}

impl Construction {
    /// Lowercase identifier used in logs and generated source.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::CayleyDickson => "cayley_dickson",
            Self::Multicomplex => "multicomplex",
        }
    }
}

/// Arithmetic every system provides, including the unnamed doubling building blocks.
pub trait Arithmetic: Copy + Debug + PartialEq + Default {
    /// Number of real components.
    const DIM: usize;

    /// Additive identity.
    fn zero() -> Self;
    /// Additive inverse.
    fn neg(self) -> Self;
    /// Component-wise sum.
    fn add(self, other: Self) -> Self;
    /// Component-wise difference.
    fn sub(self, other: Self) -> Self;
    /// Multiply every component by a real.
    fn scale(self, s: Real) -> Self;
    /// Conjugate (identity for multicomplex systems).
    fn conj(self) -> Self;
    /// System product.
    fn mul(self, other: Self) -> Self;
    /// `self * self`, with the family's cheaper formula.
    fn sqr(self) -> Self;
    /// Squared modulus: sum of squared components.
    fn modulus_sq(self) -> Real;
    /// Read `DIM` components starting at `offset`.
    fn from_raw(raw: &[Real], offset: usize) -> Self;
    /// Write `DIM` components starting at `offset`.
    fn to_raw(self, raw: &mut [Real], offset: usize);
}

/// A named entry of the number-system table (or the real base case).
pub trait Algebra: Arithmetic {
    /// Table name, also the suffix of generated WGSL functions.
    const NAME: &'static str;
    /// Name of the element system this one doubles; `None` for `real`.
    const ELEMENT: Option<&'static str>;
    /// Doubling family; `None` for `real`.
    const CONSTRUCTION: Option<Construction>;
}

impl Arithmetic for Real {
    const DIM: usize = 1;

    #[inline]
    fn zero() -> Self {
        0.0
    }
    #[inline]
    fn neg(self) -> Self {
        -self
    }
    #[inline]
    fn add(self, other: Self) -> Self {
        self + other
    }
    #[inline]
    fn sub(self, other: Self) -> Self {
        self - other
    }
    #[inline]
    fn scale(self, s: Real) -> Self {
        self * s
    }
    #[inline]
    fn conj(self) -> Self {
        self
    }
    #[inline]
    fn mul(self, other: Self) -> Self {
        self * other
    }
    #[inline]
    fn sqr(self) -> Self {
        self * self
    }
    #[inline]
    fn modulus_sq(self) -> Real {
        self * self
    }
    #[inline]
    fn from_raw(raw: &[Real], offset: usize) -> Self {
        raw[offset]
    }
    #[inline]
    fn to_raw(self, raw: &mut [Real], offset: usize) {
        raw[offset] = self;
    }
}

impl Algebra for Real {
    const NAME: &'static str = "real";
    const ELEMENT: Option<&'static str> = None;
    const CONSTRUCTION: Option<Construction> = None;
}

/// Cayley-Dickson double of `E`.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct CayleyDickson<E> {
    /// First half.
    pub x: E,
    /// Second half.
    pub y: E,
}

/// Multicomplex double of `E`.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Multicomplex<E> {
    /// First half.
    pub x: E,
    /// Second half.
    pub y: E,
}

// Shared pair arithmetic: everything except conj/mul/sqr is identical for both families.
macro_rules! pair_common {
    () => {
        const DIM: usize = 2 * E::DIM;

        #[inline]
        fn zero() -> Self {
            Self { x: E::zero(), y: E::zero() }
        }
        #[inline]
        fn neg(self) -> Self {
            Self { x: self.x.neg(), y: self.y.neg() }
        }
        #[inline]
        fn add(self, other: Self) -> Self {
            Self { x: self.x.add(other.x), y: self.y.add(other.y) }
        }
        #[inline]
        fn sub(self, other: Self) -> Self {
            Self { x: self.x.sub(other.x), y: self.y.sub(other.y) }
        }
        #[inline]
        fn scale(self, s: Real) -> Self {
            Self { x: self.x.scale(s), y: self.y.scale(s) }
        }
        #[inline]
        fn modulus_sq(self) -> Real {
            self.x.modulus_sq() + self.y.modulus_sq()
        }
        #[inline]
        fn from_raw(raw: &[Real], offset: usize) -> Self {
            Self { x: E::from_raw(raw, offset), y: E::from_raw(raw, offset + E::DIM) }
        }
        #[inline]
        fn to_raw(self, raw: &mut [Real], offset: usize) {
            self.x.to_raw(raw, offset);
            self.y.to_raw(raw, offset + E::DIM);
        }
    };
}

impl<E: Algebra> Arithmetic for CayleyDickson<E> {
    pair_common!();

    #[inline]
    fn conj(self) -> Self {
        Self { x: self.x.conj(), y: self.y.neg() }
    }

    // (a, b)(c, d) = (ac - conj(d) b, d a + b conj(c))
    #[inline]
    fn mul(self, other: Self) -> Self {
        let (a, b, c, d) = (self.x, self.y, other.x, other.y);
        Self { x: a.mul(c).sub(d.conj().mul(b)), y: d.mul(a).add(b.mul(c.conj())) }
    }

    #[inline]
    fn sqr(self) -> Self {
        let (a, b) = (self.x, self.y);
        Self { x: a.sqr().sub(b.conj().mul(b)), y: b.mul(a).add(b.mul(a.conj())) }
    }
}

impl<E: Algebra> Arithmetic for Multicomplex<E> {
    pair_common!();

    #[inline]
    fn conj(self) -> Self {
        self
    }

    // (a, b)(c, d) = (ac - d b, d a + b c)
    #[inline]
    fn mul(self, other: Self) -> Self {
        let (a, b, c, d) = (self.x, self.y, other.x, other.y);
        Self { x: a.mul(c).sub(d.mul(b)), y: d.mul(a).add(b.mul(c)) }
    }

    #[inline]
    fn sqr(self) -> Self {
        let (a, b) = (self.x, self.y);
        Self { x: a.sqr().sub(b.sqr()), y: a.mul(b).scale(2.0) }
    }
}
