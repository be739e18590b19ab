use bytemuck::{Pod, Zeroable};

use crate::arith::{Arithmetic, Real};
use crate::MAX_DIM;

/// Fixed-capacity raw storage for a value of any table system.
///
/// Components at or beyond the active system's dimension are kept at zero; `truncated`
/// restores that after the active system shrinks.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Default, Pod, Zeroable)]
pub struct Number {
    /// Components in depth-first pair order.
    pub raw: [Real; MAX_DIM],
}

impl Number {
    /// All components zero.
    pub const ZERO: Self = Self { raw: [0.0; MAX_DIM] };

    /// Build from leading components; the rest stay zero. Extra input is ignored.
    #[must_use]
    pub fn from_components(components: &[Real]) -> Self {
        let mut raw = [0.0; MAX_DIM];
        for (dst, src) in raw.iter_mut().zip(components) {
            *dst = *src;
        }
        Self { raw }
    }

    /// Serialize a system value.
    #[must_use]
    pub fn encode<A: Arithmetic>(value: A) -> Self {
        let mut raw = [0.0; MAX_DIM];
        value.to_raw(&mut raw, 0);
        Self { raw }
    }

    /// Deserialize as system `A`.
    #[must_use]
    pub fn decode<A: Arithmetic>(&self) -> A {
        A::from_raw(&self.raw, 0)
    }

    /// Copy with every component at index `dim` or above cleared.
    #[must_use]
    pub fn truncated(mut self, dim: usize) -> Self {
        for v in self.raw.iter_mut().skip(dim) {
            *v = 0.0;
        }
        self
    }

    /// True when no component at index `dim` or above is set.
    #[must_use]
    pub fn fits(&self, dim: usize) -> bool {
        self.raw.iter().skip(dim).all(|v| *v == 0.0)
    }

    /// Component `index`, or zero when out of range.
    #[must_use]
    pub fn component(&self, index: usize) -> Real {
        self.raw.get(index).copied().unwrap_or(0.0)
    }

    /// Split into two `vec4` halves for uniform upload.
    #[must_use]
    pub fn to_vec4_pair(&self) -> [[Real; 4]; 2] {
        let r = &self.raw;
        [[r[0], r[1], r[2], r[3]], [r[4], r[5], r[6], r[7]]]
    }
}

impl core::fmt::Display for Number {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let used = self.raw.iter().rposition(|v| *v != 0.0).map_or(1, |i| i + 1);
        f.write_str("(")?;
        for (i, v) in self.raw[..used].iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{v}")?;
        }
        f.write_str(")")
    }
}
