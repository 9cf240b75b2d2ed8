//! Kernel lattices of linear maps, over the integers or modulo `m`

use crate::core::error::{LatticeError, Result};
use crate::core::lattice::Lattice;
use crate::core::matrix::Matrix;
use crate::smith::right_kernel;
use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Signed, Zero};

const WITNESSES: [u32; 13] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41];

/// Miller-Rabin test with the first thirteen primes as witnesses.
///
/// Deterministic below 3.3 * 10^24, probabilistic above.
pub fn is_probable_prime(n: &BigInt) -> bool {
    let two = BigInt::from(2);
    if *n < two {
        return false;
    }
    for &p in &WITNESSES {
        let p = BigInt::from(p);
        if *n == p {
            return true;
        }
        if n.is_multiple_of(&p) {
            return false;
        }
    }

    let n_minus_one = n - 1u32;
    let mut d = n_minus_one.clone();
    let mut s = 0u32;
    while d.is_even() {
        d >>= 1;
        s += 1;
    }

    'witness: for &a in &WITNESSES {
        let mut x = BigInt::from(a).modpow(&d, n);
        if x.is_one() || x == n_minus_one {
            continue;
        }
        for _ in 1..s {
            x = x.modpow(&two, n);
            if x == n_minus_one {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

/// Inverse of `a` modulo `m`, if it exists
fn mod_inverse(a: &BigInt, m: &BigInt) -> Option<BigInt> {
    let egcd = a.extended_gcd(m);
    if egcd.gcd.is_one() {
        Some(egcd.x.mod_floor(m))
    } else {
        None
    }
}

fn check_modulus(m: &BigInt) -> Result<()> {
    if m.is_positive() {
        Ok(())
    } else {
        Err(LatticeError::invalid_parameters(format!(
            "Modulus must be positive, got {}",
            m
        )))
    }
}

/// Basis of the right kernel of `a` over the field `Z/pZ`, as rows with
/// entries in `[0, p)`.
///
/// Works from the reduced row echelon form: one basis vector per free column.
/// Fails with `PreconditionViolated` when elimination meets a non-invertible
/// pivot, which means `p` is not prime.
pub fn mod_right_kernel(a: &Matrix, p: &BigInt) -> Result<Matrix> {
    check_modulus(p)?;
    let n = a.cols();
    let mut echelon: Vec<Vec<BigInt>> = a
        .row_iter()
        .map(|row| row.iter().map(|x| x.mod_floor(p)).collect())
        .collect();

    let mut pivots: Vec<usize> = Vec::new();
    let mut r = 0;
    for col in 0..n {
        if r == echelon.len() {
            break;
        }
        let Some(i) = (r..echelon.len()).find(|&i| !echelon[i][col].is_zero()) else {
            continue;
        };
        echelon.swap(r, i);

        let inv = mod_inverse(&echelon[r][col], p).ok_or_else(|| {
            LatticeError::precondition(format!("{} is not invertible modulo {}", echelon[r][col], p))
        })?;
        for x in echelon[r].iter_mut() {
            *x = (&*x * &inv).mod_floor(p);
        }

        let pivot_row = echelon[r].clone();
        for (i, row) in echelon.iter_mut().enumerate() {
            if i == r || row[col].is_zero() {
                continue;
            }
            let factor = row[col].clone();
            for (x, y) in row.iter_mut().zip(&pivot_row) {
                *x = (&*x - &factor * y).mod_floor(p);
            }
        }

        pivots.push(col);
        r += 1;
    }

    let kernel = (0..n)
        .filter(|col| !pivots.contains(col))
        .map(|free| {
            let mut v = vec![BigInt::zero(); n];
            v[free] = BigInt::one();
            for (row, &pivot_col) in echelon.iter().zip(&pivots) {
                v[pivot_col] = (-&row[free]).mod_floor(p);
            }
            v
        })
        .collect();

    Matrix::from_rows(kernel, n)
}

/// Upper triangular basis `H` of the lattice generated by the rows of `a`
/// and by `m Z^n`, together with coefficients `W` such that every row of `H`
/// is congruent to the matching row of `W·a` modulo `m`.
///
/// Each column is cleared with Bezout combinations against the generator
/// `m e_j`, so the diagonal entries divide `m`. Entries right of the diagonal
/// and all of `W` lie in `[0, m)`; rows that depend on earlier ones vanish.
pub fn modular_row_basis(a: &Matrix, m: &BigInt) -> Result<(Matrix, Matrix)> {
    check_modulus(m)?;
    let (r, n) = a.dimension();
    let reduce = |row: &mut [BigInt]| {
        for x in row.iter_mut() {
            *x = x.mod_floor(m);
        }
    };

    let mut pending: Vec<(Vec<BigInt>, Vec<BigInt>)> = a
        .row_iter()
        .zip(Matrix::identity(r).into_rows())
        .map(|(row, unit)| (row.iter().map(|x| x.mod_floor(m)).collect(), unit))
        .collect();
    let mut basis = Vec::with_capacity(n);
    let mut coefficients = Vec::with_capacity(n);

    for j in 0..n {
        let mut pivot = vec![BigInt::zero(); n];
        pivot[j] = m.clone();
        let mut pivot_coefficients = vec![BigInt::zero(); r];

        for (row, row_coefficients) in pending.iter_mut() {
            if row[j].is_zero() {
                continue;
            }
            let egcd = pivot[j].extended_gcd(&row[j]);
            let p = &pivot[j] / &egcd.gcd;
            let q = &row[j] / &egcd.gcd;

            // (pivot, row) <- (s pivot + t row, q pivot - p row), determinant -1
            for (u, v) in pivot
                .iter_mut()
                .zip(row.iter_mut())
                .chain(pivot_coefficients.iter_mut().zip(row_coefficients.iter_mut()))
            {
                let new_u = &egcd.x * &*u + &egcd.y * &*v;
                let new_v = &q * &*u - &p * &*v;
                *u = new_u;
                *v = new_v;
            }
            reduce(&mut pivot[j + 1..]);
            reduce(&mut row[j + 1..]);
            reduce(&mut pivot_coefficients[..]);
            reduce(&mut row_coefficients[..]);
        }

        basis.push(pivot);
        coefficients.push(pivot_coefficients);
    }

    let non_unit = (0..n).filter(|&j| !basis[j][j].is_one()).count();
    log::debug!(
        "modular row basis of a {}x{} map: {} non-unit pivots",
        r,
        n,
        non_unit
    );
    Ok((Matrix::from_rows(basis, n)?, Matrix::from_rows(coefficients, r)?))
}

/// Generators of `{x in Z^n : a x = 0 (mod m)}`, or of `{x : a x = 0}` when
/// `modulus` is `None`.
///
/// With a modulus the kernel generators are followed by the `n` rows `m e_i`.
/// Prime moduli use the field kernel; any other modulus projects the integer
/// kernel of `[a | m I]` onto its first `n` coordinates.
pub fn kernel_lattice(a: &Matrix, modulus: Option<&BigInt>) -> Result<Lattice> {
    let n = a.cols();
    let basis = match modulus {
        None => right_kernel(a),
        Some(m) => {
            check_modulus(m)?;
            let kernel = if is_probable_prime(m) {
                mod_right_kernel(a, m)?
            } else {
                composite_kernel(a, m)?
            };
            kernel.vstack(&Matrix::scalar_identity(n, m))?
        }
    };

    log::debug!(
        "kernel lattice of a {}x{} map: {} generators",
        a.rows(),
        n,
        basis.rows()
    );
    Lattice::new(basis)
}

fn composite_kernel(a: &Matrix, m: &BigInt) -> Result<Matrix> {
    let n = a.cols();
    let augmented = a.hstack(&Matrix::scalar_identity(a.rows(), m))?;
    let rows = right_kernel(&augmented)
        .into_rows()
        .into_iter()
        .map(|mut row| {
            row.truncate(n);
            row
        })
        .filter(|row| row.iter().any(|x| !x.is_zero()))
        .collect();
    Matrix::from_rows(rows, n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::LatticeVector;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn annihilated(a: &Matrix, lattice: &Lattice, m: Option<&BigInt>) -> bool {
        lattice.basis().row_iter().all(|row| {
            let image = a.mul_vec(&LatticeVector::new(row.to_vec())).unwrap();
            image.as_slice().iter().all(|x| match m {
                Some(m) => x.mod_floor(m).is_zero(),
                None => x.is_zero(),
            })
        })
    }

    fn random_matrix(rng: &mut StdRng, rows: usize, cols: usize, bound: i64) -> Matrix {
        Matrix::from_i64(
            (0..rows)
                .map(|_| (0..cols).map(|_| rng.random_range(-bound..=bound)).collect())
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_is_probable_prime() {
        let primes = [2u64, 3, 5, 37, 41, 7919, 1_000_000_007, (1 << 61) - 1];
        for p in primes {
            assert!(is_probable_prime(&BigInt::from(p)), "{}", p);
        }
        let composites = [0u64, 1, 4, 9, 561, 1_373_653, 3_215_031_751, 1_000_000_007 * 3];
        for c in composites {
            assert!(!is_probable_prime(&BigInt::from(c)), "{}", c);
        }
        assert!(!is_probable_prime(&BigInt::from(-7)));

        let big_prime: BigInt = "170141183460469231731687303715884105727".parse().unwrap();
        assert!(is_probable_prime(&big_prime));
        assert!(!is_probable_prime(&(&big_prime * BigInt::from(3))));

        // strong pseudoprime to every prime base up to 37
        let pseudoprime: BigInt = "318665857834031151167461".parse().unwrap();
        assert!(!is_probable_prime(&pseudoprime));
    }

    #[test]
    fn test_mod_right_kernel() {
        let a = Matrix::from_i64(vec![vec![1, 2, 3], vec![2, 4, 7]]).unwrap();
        let p = BigInt::from(11);
        let kernel = mod_right_kernel(&a, &p).unwrap();
        assert_eq!(kernel.dimension(), (1, 3));
        assert!(kernel.row(0).unwrap().iter().all(|x| !x.is_negative() && *x < p));
        let lattice = Lattice::new(kernel).unwrap();
        assert!(annihilated(&a, &lattice, Some(&p)));
    }

    #[test]
    fn test_mod_right_kernel_rejects_bad_modulus() {
        let a = Matrix::from_i64(vec![vec![2, 3]]).unwrap();
        assert!(matches!(
            mod_right_kernel(&a, &BigInt::zero()),
            Err(LatticeError::InvalidParameters(_))
        ));
        assert!(matches!(
            mod_right_kernel(&a, &BigInt::from(4)),
            Err(LatticeError::PreconditionViolated(_))
        ));
    }

    #[test]
    fn test_kernel_lattice_annihilates() {
        let mut rng = StdRng::seed_from_u64(5);
        let moduli = [
            Some(BigInt::from(101)),
            Some(BigInt::from(96)),
            Some(BigInt::from(7919u32 * 7907)),
            None,
        ];
        for _ in 0..5 {
            let rows = rng.random_range(1..=3);
            let cols = rng.random_range(rows..=5);
            let a = random_matrix(&mut rng, rows, cols, 1000);
            for m in &moduli {
                let lattice = kernel_lattice(&a, m.as_ref()).unwrap();
                assert_eq!(lattice.ambient_dimension(), cols);
                assert!(annihilated(&a, &lattice, m.as_ref()));
            }
        }
    }

    #[test]
    fn test_kernel_lattice_is_full() {
        // x = (1, 1) solves x1 + 5 x2 = 0 mod 6 and must be in the lattice
        let a = Matrix::from_i64(vec![vec![1, 5]]).unwrap();
        let m = BigInt::from(6);
        let lattice = kernel_lattice(&a, Some(&m)).unwrap();
        assert!(lattice.contains(&LatticeVector::from_integer_vec(vec![1, 1])).unwrap());
        assert!(!lattice.contains(&LatticeVector::from_integer_vec(vec![1, 0])).unwrap());
        assert_eq!(lattice.rank(), 2);

        let p = BigInt::from(7);
        let lattice = kernel_lattice(&a, Some(&p)).unwrap();
        assert!(lattice.contains(&LatticeVector::from_integer_vec(vec![2, 1])).unwrap());
    }

    #[test]
    fn test_modular_row_basis() {
        let mut rng = StdRng::seed_from_u64(17);
        for m in [BigInt::from(96), BigInt::from(101), BigInt::from(1_000_000)] {
            for _ in 0..4 {
                let rows = rng.random_range(1..=4);
                let cols = rng.random_range(1..=5);
                let a = random_matrix(&mut rng, rows, cols, 10_000);
                let (h, w) = modular_row_basis(&a, &m).unwrap();
                assert_eq!(h.dimension(), (cols, cols));
                assert_eq!(w.dimension(), (cols, rows));

                let combined = w.mul(&a).unwrap();
                for i in 0..cols {
                    assert!(h[(i, i)].is_positive() && m.is_multiple_of(&h[(i, i)]));
                    for j in 0..cols {
                        if j < i {
                            assert!(h[(i, j)].is_zero());
                        }
                        assert!((&h[(i, j)] - &combined[(i, j)]).mod_floor(&m).is_zero());
                    }
                }

                let stacked = a.vstack(&Matrix::scalar_identity(cols, &m)).unwrap();
                let generators = Lattice::new(stacked).unwrap();
                let triangular = Lattice::new(h.clone()).unwrap();
                for row in h.row_iter() {
                    assert!(generators.contains(&LatticeVector::new(row.to_vec())).unwrap());
                }
                for row in generators.basis().row_iter() {
                    assert!(triangular.contains(&LatticeVector::new(row.to_vec())).unwrap());
                }
            }
        }

        // x1 + 5 x2 spans an index-6 sublattice modulo 6
        let a = Matrix::from_i64(vec![vec![1, 5]]).unwrap();
        let (h, _) = modular_row_basis(&a, &BigInt::from(6)).unwrap();
        assert_eq!(&h[(0, 0)] * &h[(1, 1)], BigInt::from(6));
        assert!(matches!(
            modular_row_basis(&a, &BigInt::zero()),
            Err(LatticeError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_kernel_lattice_rejects_non_positive_modulus() {
        let a = Matrix::from_i64(vec![vec![1, 2]]).unwrap();
        let err = kernel_lattice(&a, Some(&BigInt::from(-5))).unwrap_err();
        assert!(matches!(err, LatticeError::InvalidParameters(_)));
    }
}
