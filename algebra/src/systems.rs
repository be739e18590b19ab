//! The number-system table.
//!
//! `number_systems!` is the single source of truth: each row names a system, the element it
//! doubles and the construction used. The macro emits the host type, the `NumberSystem`
//! variant and the `SystemDef` row consumed by the kernel generator. A row whose element is
//! not a known `Algebra` type does not compile.

use crate::arith::{Algebra, Arithmetic, CayleyDickson, Construction, Multicomplex, Real};

/// One row of the table as seen by code generators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SystemDef {
    /// System name (`complex`, `quaternion`, ...).
    pub name: &'static str,
    /// Name of the doubled element system (`real` for the first level).
    pub element: &'static str,
    /// Doubling family.
    pub construction: Construction,
}

/// Instantiate generic code once per table entry; see [`NumberSystem::visit`].
pub trait SystemVisitor {
    /// Result of the visit.
    type Output;
    /// Called with the concrete host type of the visited system.
    fn visit<A: Algebra>(self) -> Self::Output;
}

macro_rules! number_systems {
    ($(
        $(#[$doc:meta])*
        $ty:ident => $name:literal : $kind:ident < $elem:ty >
    ),+ $(,)?) => {
        $(
            $(#[$doc])*
            #[derive(Clone, Copy, Debug, PartialEq, Default)]
            #[repr(transparent)]
            pub struct $ty(pub $kind<$elem>);

            impl Arithmetic for $ty {
                const DIM: usize = <$kind<$elem> as Arithmetic>::DIM;

                #[inline]
                fn zero() -> Self {
                    Self(Arithmetic::zero())
                }
                #[inline]
                fn neg(self) -> Self {
                    Self(self.0.neg())
                }
                #[inline]
                fn add(self, other: Self) -> Self {
                    Self(self.0.add(other.0))
                }
                #[inline]
                fn sub(self, other: Self) -> Self {
                    Self(self.0.sub(other.0))
                }
                #[inline]
                fn scale(self, s: Real) -> Self {
                    Self(self.0.scale(s))
                }
                #[inline]
                fn conj(self) -> Self {
                    Self(self.0.conj())
                }
                #[inline]
                fn mul(self, other: Self) -> Self {
                    Self(self.0.mul(other.0))
                }
                #[inline]
                fn sqr(self) -> Self {
                    Self(self.0.sqr())
                }
                #[inline]
                fn modulus_sq(self) -> Real {
                    self.0.modulus_sq()
                }
                #[inline]
                fn from_raw(raw: &[Real], offset: usize) -> Self {
                    Self(<$kind<$elem> as Arithmetic>::from_raw(raw, offset))
                }
                #[inline]
                fn to_raw(self, raw: &mut [Real], offset: usize) {
                    self.0.to_raw(raw, offset);
                }
            }

            const _: () = assert!(<$ty as Arithmetic>::DIM <= crate::MAX_DIM);

            impl Algebra for $ty {
                const NAME: &'static str = $name;
                const ELEMENT: Option<&'static str> = Some(<$elem as Algebra>::NAME);
                const CONSTRUCTION: Option<Construction> = Some(Construction::$kind);
            }
        )+

        /// Every composite number system known to the host and the kernel generator.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
        pub enum NumberSystem {
            #[default]
            $(
                $(#[$doc])*
                $ty,
            )+
        }

        impl NumberSystem {
            /// All systems in table order.
            pub const ALL: &'static [NumberSystem] = &[$(NumberSystem::$ty),+];

            /// Table name.
            #[must_use]
            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$ty => $name,)+
                }
            }

            /// Number of real components.
            #[must_use]
            pub const fn dim(self) -> usize {
                match self {
                    $(Self::$ty => <$ty as Arithmetic>::DIM,)+
                }
            }

            /// Doubling family of the system.
            #[must_use]
            pub const fn construction(self) -> Construction {
                match self {
                    $(Self::$ty => Construction::$kind,)+
                }
            }

            /// Look a system up by table name.
            #[must_use]
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(Self::$ty),)+
                    _ => None,
                }
            }

            /// Run `visitor` with the host type of this system.
            pub fn visit<V: SystemVisitor>(self, visitor: V) -> V::Output {
                match self {
                    $(Self::$ty => visitor.visit::<$ty>(),)+
                }
            }
        }

        /// The table rows, in definition order (elements always precede their users).
        pub const NUMBER_SYSTEMS: &[SystemDef] = &[$(
            SystemDef {
                name: $name,
                element: <$elem as Algebra>::NAME,
                construction: Construction::$kind,
            },
        )+];
    };
}

number_systems! {
    /// Complex numbers, `a + bi`.
    Complex => "complex": CayleyDickson<Real>,
    /// Quaternions, raw layout `[1, i, j, k]`.
    Quaternion => "quaternion": CayleyDickson<Complex>,
    /// Octonions, non-associative.
    Octonion => "octonion": CayleyDickson<Quaternion>,
    /// Bicomplex numbers, commutative with zero divisors.
    Bicomplex => "bicomplex": Multicomplex<Complex>,
    /// Tricomplex numbers.
    Tricomplex => "tricomplex": Multicomplex<Bicomplex>,
}

impl core::fmt::Display for NumberSystem {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}
