use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::*;

fn random_number(rng: &mut StdRng, dim: usize) -> Number {
    let mut n = Number::ZERO;
    for v in n.raw.iter_mut().take(dim) {
        *v = rng.gen_range(-2.0f32..2.0);
    }
    n
}

fn close(a: f32, b: f32, rel: f32) -> bool {
    (a - b).abs() <= rel * a.abs().max(b.abs()).max(1.0)
}

struct RoundTrip<'a>(&'a mut StdRng);

impl SystemVisitor for RoundTrip<'_> {
    type Output = ();
    fn visit<A: Algebra>(self) {
        for _ in 0..1000 {
            let n = random_number(self.0, A::DIM);
            let back = Number::encode(n.decode::<A>());
            for i in 0..A::DIM {
                assert_eq!(back.raw[i].to_bits(), n.raw[i].to_bits(), "{} component {i}", A::NAME);
            }
            assert!(back.fits(A::DIM), "{} wrote past its dimension", A::NAME);
        }
    }
}

#[test]
fn raw_round_trip_is_bitwise() {
    let mut rng = StdRng::seed_from_u64(7);
    for system in NumberSystem::ALL {
        system.visit(RoundTrip(&mut rng));
    }
}

struct Laws<'a>(&'a mut StdRng);

impl SystemVisitor for Laws<'_> {
    type Output = ();
    fn visit<A: Algebra>(self) {
        for _ in 0..200 {
            let x: A = random_number(self.0, A::DIM).decode();
            let y: A = random_number(self.0, A::DIM).decode();
            assert_eq!(x.add(A::zero()), x);
            assert!(x.modulus_sq() >= 0.0);
            assert!(close(x.modulus_sq(), x.conj().modulus_sq(), 1e-6));
            // sqr is a shortcut for mul(x, x)
            let (a, b) = (Number::encode(x.sqr()), Number::encode(x.mul(x)));
            for i in 0..A::DIM {
                assert!(close(a.raw[i], b.raw[i], 1e-4), "{} sqr component {i}", A::NAME);
            }
            if A::CONSTRUCTION == Some(Construction::CayleyDickson) {
                let lhs = x.mul(y).modulus_sq();
                let rhs = x.modulus_sq() * y.modulus_sq();
                assert!(close(lhs, rhs, 1e-4), "{}: {lhs} vs {rhs}", A::NAME);
            }
        }
    }
}

#[test]
fn algebra_laws_hold_for_every_system() {
    let mut rng = StdRng::seed_from_u64(11);
    for system in NumberSystem::ALL {
        system.visit(Laws(&mut rng));
    }
}

#[test]
fn multicomplex_modulus_is_not_multiplicative() {
    // x = 1 + i·j (bicomplex), x² = 2·i·j so |x²|² = 8 but (|x|²)² = 4
    let x: Bicomplex = Number::from_components(&[1.0, 0.0, 0.0, 1.0]).decode();
    let lhs = x.mul(x).modulus_sq();
    let rhs = x.modulus_sq() * x.modulus_sq();
    assert!(!close(lhs, rhs, 1e-4), "{lhs} vs {rhs}");

    let t: Tricomplex = Number::from_components(&[1.0, 0.0, 0.0, 1.0]).decode();
    assert!(!close(t.mul(t).modulus_sq(), t.modulus_sq() * t.modulus_sq(), 1e-4));
}

#[test]
fn bicomplex_has_zero_divisors() {
    let a: Bicomplex = Number::from_components(&[1.0, 0.0, 0.0, 1.0]).decode();
    let b: Bicomplex = Number::from_components(&[1.0, 0.0, 0.0, -1.0]).decode();
    assert_eq!(Number::encode(a.mul(b)), Number::ZERO);
}

fn unit(index: usize) -> Number {
    let mut n = Number::ZERO;
    n.raw[index] = 1.0;
    n
}

#[test]
fn quaternion_basis_products() {
    let (i, j, k) = (unit(1).decode::<Quaternion>(), unit(2).decode(), unit(3).decode());
    assert_eq!(Number::encode(i.mul(j)), unit(3));
    assert_eq!(Number::encode(j.mul(k)), unit(1));
    assert_eq!(Number::encode(k.mul(i)), unit(2));
    assert_eq!(Number::encode(j.mul(i)), Number::encode(k.neg()));
    assert_eq!(Number::encode(i.sqr()), Number::encode(Quaternion::zero().sub(unit(0).decode())));
}

#[test]
fn octonion_first_imaginary_units() {
    let e = |n| unit(n).decode::<Octonion>();
    assert_eq!(Number::encode(e(1).mul(e(2))), unit(3));
    assert_eq!(Number::encode(e(2).mul(e(1))), Number::encode(e(3).neg()));
}

#[test]
fn multicomplex_is_commutative() {
    let mut rng = StdRng::seed_from_u64(3);
    for _ in 0..100 {
        let x: Tricomplex = random_number(&mut rng, 8).decode();
        let y: Tricomplex = random_number(&mut rng, 8).decode();
        let (a, b) = (Number::encode(x.mul(y)), Number::encode(y.mul(x)));
        for c in 0..8 {
            assert!(close(a.raw[c], b.raw[c], 1e-5));
        }
    }
}

#[test]
fn table_rows_precede_their_users() {
    let mut seen = vec!["real"];
    for row in NUMBER_SYSTEMS {
        assert!(seen.contains(&row.element), "{} uses {} before it exists", row.name, row.element);
        seen.push(row.name);
    }
    assert_eq!(NUMBER_SYSTEMS.len(), NumberSystem::ALL.len());
    for (row, system) in NUMBER_SYSTEMS.iter().zip(NumberSystem::ALL) {
        assert_eq!(row.name, system.name());
        assert_eq!(NumberSystem::from_name(row.name), Some(*system));
    }
    assert_eq!(NumberSystem::Octonion.dim(), MAX_DIM);
    assert_eq!(NumberSystem::Bicomplex.dim(), 4);
}

#[test]
fn truncation_clears_unused_components() {
    let n = Number::from_components(&[1.0, 2.0, 3.0, 4.0]);
    let t = n.truncated(2);
    assert_eq!(t, Number::from_components(&[1.0, 2.0]));
    assert!(t.fits(2));
    assert!(!n.fits(2));
    assert_eq!(t.to_string(), "(1, 2)");
}
