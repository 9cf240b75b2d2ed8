//! Smith normal form and exact integer linear systems
//!
//! `SmithForm::compute` diagonalizes an integer matrix with unimodular row and
//! column operations, `D = U·A·V`, using Euclidean (round-to-nearest) pivot
//! elimination. The resulting triple solves `A·y = c` over the integers for any
//! number of right-hand sides and yields a basis of the integer kernel of `A`.

use crate::core::error::{LatticeError, Result};
use crate::core::matrix::{sub_row_multiple, Matrix};
use crate::core::types::{round_div, LatticeVector};
use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Signed, Zero};

/// Smith normal form triple `D = U·A·V`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmithForm {
    /// Diagonal matrix with the shape of `A`
    pub d: Matrix,
    /// Unimodular row transform
    pub u: Matrix,
    /// Unimodular column transform
    pub v: Matrix,
    rank: usize,
}

impl SmithForm {
    /// Compute the Smith normal form of `a`
    pub fn compute(a: &Matrix) -> Self {
        let (rows, cols) = a.dimension();
        let mut e = Elimination {
            d: a.to_vec(),
            u: Matrix::identity(rows).into_rows(),
            v: Matrix::identity(cols).into_rows(),
        };

        let mut rank = 0;
        for t in 0..rows.min(cols) {
            let Some((pi, pj)) = e.min_pivot(t) else {
                break;
            };
            e.swap_rows(t, pi);
            e.swap_cols(t, pj);
            e.clear_cross(t);
            if e.d[t][t].is_negative() {
                e.negate_row(t);
            }
            rank += 1;
        }

        log::debug!("Smith normal form of {}x{} matrix has rank {}", rows, cols, rank);

        SmithForm {
            d: Matrix::from_raw_parts(e.d, cols),
            u: Matrix::from_raw_parts(e.u, rows),
            v: Matrix::from_raw_parts(e.v, cols),
            rank,
        }
    }

    /// Number of nonzero invariant factors
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Diagonal entries of `D`, each dividing the next nonzero one
    pub fn invariant_factors(&self) -> Vec<BigInt> {
        (0..self.d.rows().min(self.d.cols()))
            .map(|i| self.d[(i, i)].clone())
            .collect()
    }

    /// Solve `A·y = c` over the integers using this decomposition
    pub fn solve(&self, c: &LatticeVector) -> Result<LatticeVector> {
        let (rows, cols) = self.d.dimension();
        if c.dimension() != rows {
            return Err(LatticeError::invalid_dimensions(
                (rows, 1),
                (c.dimension(), 1),
            ));
        }

        let c_prime = self.u.mul_vec(c)?;
        let zero = BigInt::zero();
        let mut y = vec![BigInt::zero(); cols];
        for (i, ci) in c_prime.as_slice().iter().enumerate() {
            let di = if i < cols { &self.d[(i, i)] } else { &zero };
            if di.is_zero() {
                if !ci.is_zero() {
                    return Err(LatticeError::infeasible(format!(
                        "right-hand side has a component outside the image at index {}",
                        i
                    )));
                }
                continue;
            }
            let (q, r) = ci.div_rem(di);
            if !r.is_zero() {
                return Err(LatticeError::infeasible(format!(
                    "invariant factor {} does not divide the transformed right-hand side",
                    i
                )));
            }
            y[i] = q;
        }

        self.v.mul_vec(&LatticeVector::new(y))
    }

    /// Basis of `{x : A·x = 0}` as rows: the columns of `V` past the rank
    pub fn kernel_basis(&self) -> Matrix {
        let cols = self.v.cols();
        let rows = (self.rank..cols)
            .map(|j| (0..self.v.rows()).map(|i| self.v[(i, j)].clone()).collect())
            .collect();
        Matrix::from_raw_parts(rows, self.v.rows())
    }
}

/// Solve `A·y = c` over the integers
pub fn solve_integer(a: &Matrix, c: &LatticeVector) -> Result<LatticeVector> {
    if c.dimension() != a.rows() {
        return Err(LatticeError::invalid_dimensions(
            (a.rows(), 1),
            (c.dimension(), 1),
        ));
    }
    SmithForm::compute(a).solve(c)
}

/// Solve `A·y = c` over the integers for a square nonsingular `A`.
///
/// Fraction-free (Bareiss) elimination keeps every intermediate entry a minor
/// of `[A | c]`, so the entry sizes stay bounded by Hadamard's inequality.
/// Back substitution divides exactly whenever the unique rational solution is
/// integral.
pub fn solve_nonsingular(a: &Matrix, c: &LatticeVector) -> Result<LatticeVector> {
    let n = a.rows();
    if a.cols() != n {
        return Err(LatticeError::invalid_dimensions((n, n), a.dimension()));
    }
    if c.dimension() != n {
        return Err(LatticeError::invalid_dimensions((n, 1), (c.dimension(), 1)));
    }

    let mut m: Vec<Vec<BigInt>> = a
        .row_iter()
        .zip(c.as_slice())
        .map(|(row, ci)| row.iter().cloned().chain(std::iter::once(ci.clone())).collect())
        .collect();

    let mut previous = BigInt::one();
    for k in 0..n {
        let Some(p) = (k..n).find(|&i| !m[i][k].is_zero()) else {
            return Err(LatticeError::degenerate(format!(
                "matrix is singular, no pivot in column {}",
                k
            )));
        };
        m.swap(k, p);
        let (upper, lower) = m.split_at_mut(k + 1);
        let pivot_row = &upper[k];
        for row in lower.iter_mut() {
            let factor = row[k].clone();
            for j in k + 1..=n {
                row[j] = (&pivot_row[k] * &row[j] - &factor * &pivot_row[j]) / &previous;
            }
            row[k] = BigInt::zero();
        }
        previous = m[k][k].clone();
    }

    let mut y = vec![BigInt::zero(); n];
    for i in (0..n).rev() {
        let mut rhs = m[i][n].clone();
        for j in i + 1..n {
            rhs -= &m[i][j] * &y[j];
        }
        let (q, r) = rhs.div_rem(&m[i][i]);
        if !r.is_zero() {
            return Err(LatticeError::infeasible(format!(
                "solution is not integral at index {}",
                i
            )));
        }
        y[i] = q;
    }
    Ok(LatticeVector::new(y))
}

/// Basis of the integer right kernel `{x : A·x = 0}`
pub fn right_kernel(a: &Matrix) -> Matrix {
    SmithForm::compute(a).kernel_basis()
}

/// Working state of the elimination: `d` starts as `A`, `u` and `v` as identities
struct Elimination {
    d: Vec<Vec<BigInt>>,
    u: Vec<Vec<BigInt>>,
    v: Vec<Vec<BigInt>>,
}

impl Elimination {
    /// Smallest nonzero entry (by absolute value) in the trailing submatrix
    fn min_pivot(&self, t: usize) -> Option<(usize, usize)> {
        let mut best: Option<(usize, usize)> = None;
        for (i, row) in self.d.iter().enumerate().skip(t) {
            for (j, x) in row.iter().enumerate().skip(t) {
                if x.is_zero() {
                    continue;
                }
                let better = match best {
                    None => true,
                    Some((bi, bj)) => x.abs() < self.d[bi][bj].abs(),
                };
                if better {
                    best = Some((i, j));
                }
            }
        }
        best
    }

    /// Zero row `t` and column `t` outside the pivot, then make the pivot
    /// divide every entry of the trailing submatrix.
    fn clear_cross(&mut self, t: usize) {
        let rows = self.d.len();
        let cols = self.d[t].len();
        loop {
            let mut clean = true;
            for i in t + 1..rows {
                if !self.d[i][t].is_zero() {
                    let q = round_div(&self.d[i][t], &self.d[t][t]);
                    self.sub_row(i, t, &q);
                    clean &= self.d[i][t].is_zero();
                }
            }
            for j in t + 1..cols {
                if !self.d[t][j].is_zero() {
                    let q = round_div(&self.d[t][j], &self.d[t][t]);
                    self.sub_col(j, t, &q);
                    clean &= self.d[t][j].is_zero();
                }
            }

            if !clean {
                // a remainder is strictly smaller than the pivot; promote the smallest
                let in_col = (t + 1..rows)
                    .filter(|&i| !self.d[i][t].is_zero())
                    .map(|i| (self.d[i][t].abs(), true, i));
                let in_row = (t + 1..cols)
                    .filter(|&j| !self.d[t][j].is_zero())
                    .map(|j| (self.d[t][j].abs(), false, j));
                let smallest = in_col.chain(in_row).min_by(|a, b| a.0.cmp(&b.0));
                if let Some((_, is_row, idx)) = smallest {
                    if is_row {
                        self.swap_rows(t, idx);
                    } else {
                        self.swap_cols(t, idx);
                    }
                }
                continue;
            }

            let pivot = self.d[t][t].clone();
            let offending = (t + 1..rows)
                .find(|&i| self.d[i][t + 1..].iter().any(|x| !(x % &pivot).is_zero()));
            match offending {
                // row t += row i, then eliminate again
                Some(i) => self.sub_row(t, i, &-BigInt::one()),
                None => break,
            }
        }
    }

    fn swap_rows(&mut self, i: usize, j: usize) {
        self.d.swap(i, j);
        self.u.swap(i, j);
    }

    fn swap_cols(&mut self, i: usize, j: usize) {
        for row in self.d.iter_mut().chain(self.v.iter_mut()) {
            row.swap(i, j);
        }
    }

    fn sub_row(&mut self, dst: usize, src: usize, q: &BigInt) {
        sub_row_multiple(&mut self.d, dst, src, q);
        sub_row_multiple(&mut self.u, dst, src, q);
    }

    fn sub_col(&mut self, dst: usize, src: usize, q: &BigInt) {
        for row in self.d.iter_mut().chain(self.v.iter_mut()) {
            let delta = q * &row[src];
            row[dst] -= delta;
        }
    }

    fn negate_row(&mut self, i: usize) {
        for x in self.d[i].iter_mut().chain(self.u[i].iter_mut()) {
            *x = -std::mem::take(x);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_matrix(rng: &mut StdRng, rows: usize, cols: usize) -> Matrix {
        let data = (0..rows)
            .map(|_| (0..cols).map(|_| rng.random_range(-20i64..=20)).collect())
            .collect();
        Matrix::from_i64(data).unwrap()
    }

    fn assert_smith_invariants(a: &Matrix, smith: &SmithForm) {
        let product = smith.u.mul(a).unwrap().mul(&smith.v).unwrap();
        assert_eq!(product, smith.d);

        for i in 0..smith.d.rows() {
            for j in 0..smith.d.cols() {
                if i != j {
                    assert!(smith.d[(i, j)].is_zero());
                }
            }
        }

        let factors = smith.invariant_factors();
        assert!(factors.iter().all(|d| !d.is_negative()));
        for pair in factors.windows(2) {
            if !pair[1].is_zero() {
                assert!((&pair[1] % &pair[0]).is_zero(), "{} does not divide {}", pair[0], pair[1]);
            }
        }

        // unimodular transforms have only unit invariant factors
        for t in [&smith.u, &smith.v] {
            if t.rows() > 0 {
                let inner = SmithForm::compute(t);
                assert!(inner.invariant_factors().iter().all(|d| d.is_one()));
            }
        }
    }

    #[test]
    fn test_smith_form_known_matrix() {
        let a = Matrix::from_i64(vec![vec![2, 4, 4], vec![-6, 6, 12], vec![10, -4, -16]]).unwrap();
        let smith = SmithForm::compute(&a);
        assert_smith_invariants(&a, &smith);
        let expected: Vec<BigInt> = [2, 6, 12].iter().map(|&x| BigInt::from(x)).collect();
        assert_eq!(smith.invariant_factors(), expected);
        assert_eq!(smith.rank(), 3);
    }

    #[test]
    fn test_smith_form_random_shapes() {
        let mut rng = StdRng::seed_from_u64(7);
        for (rows, cols) in [(1, 1), (2, 5), (5, 2), (4, 4), (3, 6), (6, 3)] {
            for _ in 0..4 {
                let a = random_matrix(&mut rng, rows, cols);
                let smith = SmithForm::compute(&a);
                assert_smith_invariants(&a, &smith);
            }
        }
    }

    #[test]
    fn test_smith_form_rank_deficient() {
        let a = Matrix::from_i64(vec![vec![1, 2, 3], vec![2, 4, 6], vec![0, 0, 0]]).unwrap();
        let smith = SmithForm::compute(&a);
        assert_smith_invariants(&a, &smith);
        assert_eq!(smith.rank(), 1);
    }

    #[test]
    fn test_solve_integer_round_trip() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..10 {
            let a = random_matrix(&mut rng, 3, 5);
            let y: Vec<i64> = (0..5).map(|_| rng.random_range(-50i64..=50)).collect();
            let c = a.mul_vec(&LatticeVector::from_integer_vec(y)).unwrap();
            let solution = solve_integer(&a, &c).unwrap();
            assert_eq!(a.mul_vec(&solution).unwrap(), c);
        }
    }

    #[test]
    fn test_solve_integer_infeasible() {
        let a = Matrix::from_i64(vec![vec![2, 4]]).unwrap();
        let err = solve_integer(&a, &LatticeVector::from_integer_vec(vec![3])).unwrap_err();
        assert!(matches!(err, LatticeError::InfeasibleSystem(_)));

        // consistent over Q only if the second entry doubles the first
        let a = Matrix::from_i64(vec![vec![1], vec![2]]).unwrap();
        let err = solve_integer(&a, &LatticeVector::from_integer_vec(vec![1, 3])).unwrap_err();
        assert!(matches!(err, LatticeError::InfeasibleSystem(_)));

        assert!(matches!(
            solve_integer(&a, &LatticeVector::from_integer_vec(vec![1])),
            Err(LatticeError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_solve_nonsingular() {
        let mut rng = StdRng::seed_from_u64(23);
        let mut solved = 0;
        while solved < 8 {
            let a = random_matrix(&mut rng, 5, 5);
            if SmithForm::compute(&a).rank() < 5 {
                continue;
            }
            let y: Vec<i64> = (0..5).map(|_| rng.random_range(-1000i64..=1000)).collect();
            let y = LatticeVector::from_integer_vec(y);
            let c = a.mul_vec(&y).unwrap();
            assert_eq!(solve_nonsingular(&a, &c).unwrap(), y);
            solved += 1;
        }

        // zero leading entry forces a row exchange
        let a = Matrix::from_i64(vec![vec![0, 3], vec![2, 1]]).unwrap();
        let c = LatticeVector::from_integer_vec(vec![9, 7]);
        assert_eq!(solve_nonsingular(&a, &c).unwrap(), LatticeVector::from_integer_vec(vec![2, 3]));

        // 2 y1 = 3 has only the rational solution
        let a = Matrix::from_i64(vec![vec![2, 0], vec![0, 1]]).unwrap();
        let err = solve_nonsingular(&a, &LatticeVector::from_integer_vec(vec![3, 1])).unwrap_err();
        assert!(matches!(err, LatticeError::InfeasibleSystem(_)));

        let singular = Matrix::from_i64(vec![vec![1, 2], vec![2, 4]]).unwrap();
        let err = solve_nonsingular(&singular, &LatticeVector::from_integer_vec(vec![1, 2])).unwrap_err();
        assert!(matches!(err, LatticeError::DegenerateLattice(_)));

        let wide = Matrix::from_i64(vec![vec![1, 2, 3]]).unwrap();
        assert!(matches!(
            solve_nonsingular(&wide, &LatticeVector::from_integer_vec(vec![1])),
            Err(LatticeError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_reused_form_solves_many_targets() {
        let a = Matrix::from_i64(vec![vec![3, 5, 7], vec![1, 1, 2]]).unwrap();
        let smith = SmithForm::compute(&a);
        for target in [vec![1, 0], vec![0, 1], vec![-4, 9]] {
            let c = LatticeVector::from_integer_vec(target);
            let y = smith.solve(&c).unwrap();
            assert_eq!(a.mul_vec(&y).unwrap(), c);
        }
    }

    #[test]
    fn test_right_kernel() {
        let a = Matrix::from_i64(vec![vec![1, 2, 3]]).unwrap();
        let kernel = right_kernel(&a);
        assert_eq!(kernel.dimension(), (2, 3));
        for row in kernel.row_iter() {
            let v = LatticeVector::new(row.to_vec());
            assert!(a.mul_vec(&v).unwrap().is_zero());
        }
        // the kernel basis spans every integer kernel vector
        let target = LatticeVector::from_integer_vec(vec![3, 0, -1]);
        assert!(solve_integer(&kernel.transpose(), &target).is_ok());

        let full_rank = Matrix::from_i64(vec![vec![1, 0], vec![0, 1]]).unwrap();
        assert_eq!(right_kernel(&full_rank).dimension(), (0, 2));
    }
}
