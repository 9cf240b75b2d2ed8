//! Small solutions of linear congruences `A x = c (mod m)`
//!
//! Three entry points:
//!
//! * [`ModularSolver::small_lgs`] for prime (or absent) moduli, through the
//!   kernel lattice and SVP/CVP approximation.
//! * [`ModularSolver::small_lgs2`] for composite moduli, through the reduced
//!   row lattice of `A` stacked over `m I`, echelonized modulo `m` first.
//! * [`ModularSolver::truncated_lgs`] for the correction that moves a
//!   near-solution onto an exact one.
//!
//! # Examples
//!
//! ```rust
//! use congruence_lattice::{Matrix, LatticeVector, ModularSolver};
//! use num_bigint::BigInt;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // x1 + 5 x2 = 0 (mod 101) has the short solution (-5, 1) up to sign
//! let a = Matrix::from_i64(vec![vec![1, 5]])?;
//! let x = ModularSolver::new().small_lgs(&a, None, Some(&BigInt::from(101)))?;
//! assert_eq!(x, LatticeVector::from_integer_vec(vec![5, -1]));
//! # Ok(())
//! # }
//! ```

use crate::core::error::{LatticeError, Result};
use crate::core::matrix::Matrix;
use crate::core::types::{dot, round_div, LatticeVector};
use crate::cvp::closest_vector;
use crate::kernel::{is_probable_prime, kernel_lattice, modular_row_basis};
use crate::lll::{LLLParams, LLLReducer, ReductionConfig, ReductionStrategy};
use crate::smith::{solve_integer, solve_nonsingular};
use crate::svp::approx_shortest;
use crate::utils::profiling::profile_function;
use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{FromPrimitive, Signed, ToPrimitive, Zero};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Reduction parameters for the three solvers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Reductions tried by the SVP/CVP searches of `small_lgs`
    pub reduction: ReductionConfig,
    /// Reduction of the augmented lattice in `small_lgs2`
    pub augmented: LLLParams,
    /// Reduction of the augmented lattice in `truncated_lgs`
    pub truncation: LLLParams,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            reduction: ReductionConfig::fast(),
            augmented: LLLParams::exact(0.999999),
            truncation: LLLParams::exact(0.99),
        }
    }
}

impl SolverConfig {
    /// Every reduction candidate for the SVP/CVP searches
    pub fn thorough() -> Self {
        SolverConfig {
            reduction: ReductionConfig::thorough(),
            ..Default::default()
        }
    }

    /// Load a JSON-serialized configuration
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SolverConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate parameters
    pub fn validate(&self) -> Result<()> {
        self.reduction.validate()?;
        for (name, params) in [("augmented", &self.augmented), ("truncation", &self.truncation)] {
            params.validate()?;
            // only the exact reduction tracks the row-lattice transform
            if params.strategy != ReductionStrategy::Exact {
                return Err(LatticeError::invalid_parameters(format!(
                    "{} reduction must use the exact strategy",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// Solver for small solutions of modular linear systems
#[derive(Debug, Clone, Default)]
pub struct ModularSolver {
    config: SolverConfig,
}

impl ModularSolver {
    /// Create a solver with the default configuration
    pub fn new() -> Self {
        Self::with_config(SolverConfig::default())
    }

    /// Create a solver with a custom configuration
    pub fn with_config(config: SolverConfig) -> Self {
        ModularSolver { config }
    }

    /// Configuration in use
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Small `x` with `A x = c (mod m)` for a prime modulus.
    ///
    /// Without a modulus the system is solved exactly over the integers. A zero
    /// or absent target asks for a short nonzero kernel vector. Otherwise a
    /// particular solution `y` is moved by the closest kernel lattice point.
    pub fn small_lgs(
        &self,
        a: &Matrix,
        c: Option<&LatticeVector>,
        modulus: Option<&BigInt>,
    ) -> Result<LatticeVector> {
        self.config.validate()?;
        check_system(a, c)?;
        if let Some(m) = modulus {
            check_modulus(m)?;
            if !is_probable_prime(m) {
                return Err(LatticeError::precondition(format!(
                    "small_lgs needs a prime modulus, {} is composite",
                    m
                )));
            }
        }

        let lattice = kernel_lattice(a, modulus)?;

        let Some(c) = c.filter(|c| !c.is_zero()) else {
            log::info!(
                "small_lgs: zero target, searching {} kernel generators for a short vector",
                lattice.num_generators()
            );
            return approx_shortest(&lattice, &self.config.reduction);
        };

        let y = particular_solution(a, c, modulus)?;
        let w = closest_vector(&lattice, &y, &self.config.reduction)?
            .unwrap_or_else(|| LatticeVector::zeros(y.dimension()));
        log::info!("small_lgs: corrected a particular solution by its closest kernel point");
        y.sub(&w)
    }

    /// Small `x` with `A x = c (mod m)` for any modulus.
    ///
    /// Reduces the row lattice of `A` stacked over `m I` and expresses the
    /// congruence in the reduced basis `L`: with `L = Y [A; m I]` every
    /// solution satisfies `L x = Y_A c (mod m)`, and the small solution is the
    /// exact solution of `L x = y` for the representatives `y` picked by
    /// nearest-plane decoding.
    pub fn small_lgs2(
        &self,
        a: &Matrix,
        c: Option<&LatticeVector>,
        modulus: &BigInt,
    ) -> Result<LatticeVector> {
        self.config.validate()?;
        check_system(a, c)?;
        check_modulus(modulus)?;

        let row_lattice = reduced_row_lattice(a, modulus, &self.config.augmented)?;
        let basis = &row_lattice.basis;
        let n = a.cols();

        let Some(c) = c.filter(|c| !c.is_zero()) else {
            // L x = (0, ..., 0, m) lands on a kernel vector of A
            let mut target = vec![BigInt::zero(); n];
            target[n - 1] = modulus.clone();
            let x = solve_nonsingular(basis, &LatticeVector::new(target))
                .map_err(|e| e.into_precondition("zero-target solve"))?
                .normalized();
            if x.as_slice().iter().any(|xi| xi.abs() >= *modulus) {
                return Err(LatticeError::precondition(
                    "zero target: the last reduced direction gives no solution below the modulus",
                ));
            }
            log::info!("small_lgs2: zero target solved along the last reduced direction");
            return Ok(x);
        };

        let residues: Vec<BigInt> = row_lattice
            .coefficients_of_a()?
            .mul_vec(c)?
            .as_slice()
            .iter()
            .map(|v| v.mod_floor(modulus))
            .collect();
        let target = nearest_plane_target(basis, &residues, modulus)?;

        let x = solve_nonsingular(basis, &target)
            .map_err(|e| e.into_precondition("solving in the reduced basis"))?;
        log::info!(
            "small_lgs2: recovered a solution of {} coordinates, largest entry {} bits",
            x.dimension(),
            x.as_slice().iter().map(|v| v.bits()).max().unwrap_or(0)
        );
        Ok(x)
    }

    /// Small correction `x` with `A (y + x) = 0 (mod m)`.
    ///
    /// `y` is a near-solution, for example a truncated one. Each row `l` of
    /// the reduced row lattice receives the correction that rounds `l y` to
    /// the nearest multiple of `m`.
    pub fn truncated_lgs(
        &self,
        a: &Matrix,
        y: &LatticeVector,
        modulus: &BigInt,
    ) -> Result<LatticeVector> {
        self.config.validate()?;
        check_system(a, None)?;
        check_modulus(modulus)?;
        if y.dimension() != a.cols() {
            return Err(LatticeError::invalid_dimensions(
                (a.cols(), 1),
                (y.dimension(), 1),
            ));
        }

        let basis = reduced_row_lattice(a, modulus, &self.config.truncation)?.basis;
        let w1 = basis.mul_vec(y)?;
        let w2: LatticeVector = w1
            .as_slice()
            .iter()
            .map(|w| round_div(w, modulus) * modulus - w)
            .collect();

        let x = solve_nonsingular(&basis, &w2)
            .map_err(|e| e.into_precondition("solving the correction"))?;
        log::info!("truncated_lgs: correction of squared norm {} bits", x.norm_squared().bits());
        Ok(x)
    }
}

/// `small_lgs` with the default configuration
pub fn small_lgs(
    a: &Matrix,
    c: Option<&LatticeVector>,
    modulus: Option<&BigInt>,
) -> Result<LatticeVector> {
    ModularSolver::new().small_lgs(a, c, modulus)
}

/// `small_lgs2` with the default configuration
pub fn small_lgs2(a: &Matrix, c: Option<&LatticeVector>, modulus: &BigInt) -> Result<LatticeVector> {
    ModularSolver::new().small_lgs2(a, c, modulus)
}

/// `truncated_lgs` with the default configuration
pub fn truncated_lgs(a: &Matrix, y: &LatticeVector, modulus: &BigInt) -> Result<LatticeVector> {
    ModularSolver::new().truncated_lgs(a, y, modulus)
}

fn check_system(a: &Matrix, c: Option<&LatticeVector>) -> Result<()> {
    if a.cols() == 0 {
        return Err(LatticeError::invalid_dimensions((a.rows(), 1), a.dimension()));
    }
    match c {
        Some(c) if c.dimension() != a.rows() => Err(LatticeError::invalid_dimensions(
            (a.rows(), 1),
            (c.dimension(), 1),
        )),
        _ => Ok(()),
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

/// Some integer `y` with `A y = c (mod m)`, or `A y = c` without a modulus
fn particular_solution(
    a: &Matrix,
    c: &LatticeVector,
    modulus: Option<&BigInt>,
) -> Result<LatticeVector> {
    match modulus {
        None => solve_integer(a, c),
        Some(m) => {
            let augmented = a.hstack(&Matrix::scalar_identity(a.rows(), m))?;
            let solution = solve_integer(&augmented, c)?;
            Ok(solution.as_slice()[..a.cols()].iter().cloned().collect())
        }
    }
}

/// Reduced basis of the lattice spanned by the rows of `A` and of `m I`
#[derive(Debug, Clone)]
struct RowLattice {
    /// `n x n` reduced basis `L`
    basis: Matrix,
    /// Coefficients `Y` with `L = Y [A; m I]`
    transform: Matrix,
    /// Number of rows of `A`
    equations: usize,
}

impl RowLattice {
    /// The columns of `Y` that multiply the rows of `A`
    fn coefficients_of_a(&self) -> Result<Matrix> {
        let rows = self
            .transform
            .row_iter()
            .map(|row| row[..self.equations].to_vec())
            .collect();
        Matrix::from_rows(rows, self.equations)
    }
}

/// Echelonize `A` stacked over `m I` modulo `m`, LLL-reduce the triangular
/// basis and assemble the coefficients of the reduced rows
fn reduced_row_lattice(a: &Matrix, m: &BigInt, params: &LLLParams) -> Result<RowLattice> {
    let n = a.cols();
    let (echelon, echelon_coefficients) = modular_row_basis(a, m)?;
    let (basis, unimodular, stats) = profile_function("reduction of the row lattice", || {
        LLLReducer::with_params(params.clone()).reduce_matrix_with_transform(&echelon)
    })?;
    if stats.rank != n {
        return Err(LatticeError::precondition(format!(
            "row lattice has rank {}, expected {}",
            stats.rank, n
        )));
    }
    log::debug!(
        "row lattice of a {}x{} system reduced with {} swaps, {} size reductions",
        a.rows(),
        n,
        stats.swaps,
        stats.size_reductions
    );

    // L = U H and H = W A (mod m), so L - (U W mod m) A is a multiple of m
    let coefficients: Vec<Vec<BigInt>> = unimodular
        .mul(&echelon_coefficients)?
        .into_rows()
        .into_iter()
        .map(|row| row.iter().map(|v| v.mod_floor(m)).collect())
        .collect();
    let coefficients = Matrix::from_rows(coefficients, a.rows())?;
    let image = coefficients.mul(a)?;

    let mut scaled = Vec::with_capacity(n);
    for (i, (l_row, image_row)) in basis.row_iter().zip(image.row_iter()).enumerate() {
        let row = l_row
            .iter()
            .zip(image_row)
            .map(|(l, v)| {
                let (q, r) = (l - v).div_rem(m);
                if r.is_zero() {
                    Ok(q)
                } else {
                    Err(LatticeError::precondition(format!(
                        "reduced row {} is not congruent to its coefficients times A",
                        i
                    )))
                }
            })
            .collect::<Result<Vec<_>>>()?;
        scaled.push(row);
    }
    let transform = coefficients.hstack(&Matrix::from_rows(scaled, n)?)?;

    Ok(RowLattice {
        basis,
        transform,
        equations: a.rows(),
    })
}

/// Representatives `y_i = r_i (mod m)` that keep `L^{-1} y` short.
///
/// The lift of each residue is chosen one Gram-Schmidt direction of `L` at a
/// time, against the rounding error already committed in the earlier
/// directions (nearest-plane decoding). For an orthogonal `L` this is plain
/// centering into `[-m/2, m/2)`.
fn nearest_plane_target(basis: &Matrix, residues: &[BigInt], m: &BigInt) -> Result<LatticeVector> {
    let mu = gram_schmidt_f64(basis)?;
    let modulus = m.to_f64().unwrap_or(f64::NAN);

    let mut z: Vec<f64> = Vec::with_capacity(residues.len());
    let mut target = Vec::with_capacity(residues.len());
    for (i, r) in residues.iter().enumerate() {
        let fraction = r.to_f64().unwrap_or(f64::NAN) / modulus;
        let shift: f64 = mu[i].iter().zip(&z).map(|(u, zj)| u * zj).sum();
        let k = (shift - fraction).round();
        let lift = BigInt::from_f64(k).ok_or_else(|| {
            LatticeError::precondition(format!("representative shift {} at row {} is not finite", k, i))
        })?;
        target.push(r + &lift * m);
        z.push(fraction + k - shift);
    }
    Ok(LatticeVector::new(target))
}

/// Strictly lower Gram-Schmidt coefficients `mu[i][j]`, `j < i`, in `f64`
fn gram_schmidt_f64(basis: &Matrix) -> Result<Vec<Vec<f64>>> {
    let n = basis.rows();
    let rows: Vec<&[BigInt]> = basis.row_iter().collect();
    let gram: Vec<Vec<f64>> = rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            rows[..=i]
                .iter()
                .map(|other| dot(row, other).to_f64().unwrap_or(f64::NAN))
                .collect()
        })
        .collect();

    let mut mu = vec![Vec::new(); n];
    let mut r_diag = vec![0.0f64; n];
    for i in 0..n {
        let mut r_row = Vec::with_capacity(i);
        for j in 0..i {
            let mut s = gram[i][j];
            for l in 0..j {
                s -= mu[j][l] * r_row[l];
            }
            r_row.push(s);
            mu[i].push(s / r_diag[j]);
        }
        let mut v = gram[i][i];
        for j in 0..i {
            v -= mu[i][j] * r_row[j];
        }
        if !(v.is_finite() && v > 0.0) {
            return Err(LatticeError::precondition(format!(
                "floating-point Gram-Schmidt lost row {} of the reduced basis",
                i
            )));
        }
        r_diag[i] = v;
    }
    Ok(mu)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::lattice::Lattice;

    fn residues(a: &Matrix, x: &LatticeVector, m: &BigInt) -> Vec<BigInt> {
        a.mul_vec(x)
            .unwrap()
            .as_slice()
            .iter()
            .map(|v| v.mod_floor(m))
            .collect()
    }

    #[test]
    fn test_config_validation() {
        assert!(SolverConfig::default().validate().is_ok());
        assert!(SolverConfig::thorough().validate().is_ok());

        let bad = SolverConfig {
            augmented: LLLParams::floating_point(0.99),
            ..Default::default()
        };
        assert!(bad.validate().is_err());

        let json = serde_json::to_string(&SolverConfig::thorough()).unwrap();
        let back: SolverConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SolverConfig::thorough());
    }

    #[test]
    fn test_small_lgs_zero_target() {
        let a = Matrix::from_i64(vec![vec![1, 5]]).unwrap();
        let m = BigInt::from(101);
        let x = small_lgs(&a, None, Some(&m)).unwrap();
        assert_eq!(x, LatticeVector::from_integer_vec(vec![5, -1]));

        let zero = LatticeVector::zeros(1);
        assert_eq!(small_lgs(&a, Some(&zero), Some(&m)).unwrap(), x);
    }

    #[test]
    fn test_small_lgs_planted_solution() {
        // x = (3, -2, 1) planted in two equations modulo 10007
        let m = BigInt::from(10007);
        let a = Matrix::from_i64(vec![vec![1234, 5678, 9101], vec![4321, 8765, 1019]]).unwrap();
        let planted = LatticeVector::from_integer_vec(vec![3, -2, 1]);
        let c: LatticeVector = residues(&a, &planted, &m).into_iter().collect();

        let x = small_lgs(&a, Some(&c), Some(&m)).unwrap();
        assert_eq!(residues(&a, &x, &m), c.as_slice().to_vec());
        assert!(x.norm_squared() <= planted.norm_squared());
    }

    #[test]
    fn test_small_lgs_without_modulus() {
        let a = Matrix::from_i64(vec![vec![2, 3, 5]]).unwrap();
        let c = LatticeVector::from_integer_vec(vec![1000]);
        let x = small_lgs(&a, Some(&c), None).unwrap();
        assert_eq!(a.mul_vec(&x).unwrap(), c);
        assert!(x.norm_squared() < BigInt::from(1000 * 1000));
    }

    #[test]
    fn test_small_lgs_rejects_composite() {
        let a = Matrix::from_i64(vec![vec![1, 5]]).unwrap();
        let err = small_lgs(&a, None, Some(&BigInt::from(100))).unwrap_err();
        assert!(matches!(err, LatticeError::PreconditionViolated(_)));
    }

    #[test]
    fn test_small_lgs_infeasible_exact_system() {
        let a = Matrix::from_i64(vec![vec![2, 4]]).unwrap();
        let c = LatticeVector::from_integer_vec(vec![3]);
        let err = small_lgs(&a, Some(&c), None).unwrap_err();
        assert!(matches!(err, LatticeError::InfeasibleSystem(_)));
    }

    #[test]
    fn test_small_lgs2_composite_modulus() {
        let m = BigInt::from(1_000_000u32);
        let a = Matrix::from_i64(vec![
            vec![123_457, 654_321, 111_111, 987_653],
            vec![222_223, 333_331, 444_449, 555_557],
        ])
        .unwrap();
        let planted = LatticeVector::from_integer_vec(vec![2, -1, 3, 1]);
        let c: LatticeVector = residues(&a, &planted, &m).into_iter().collect();

        let x = small_lgs2(&a, Some(&c), &m).unwrap();
        assert_eq!(x, planted);
    }

    #[test]
    fn test_small_lgs2_zero_target() {
        // the integer kernel of A is spanned by (1, -2, 1)
        let m = BigInt::from(1_000_000u32);
        let a = Matrix::from_i64(vec![vec![1, 2, 3], vec![4, 5, 6]]).unwrap();
        let x = small_lgs2(&a, None, &m).unwrap();
        assert!(!x.is_zero());
        assert!(residues(&a, &x, &m).iter().all(|r| r.is_zero()));
        assert_eq!(x, LatticeVector::from_integer_vec(vec![1, -2, 1]));

        let zero = LatticeVector::zeros(2);
        assert_eq!(small_lgs2(&a, Some(&zero), &m).unwrap(), x);
    }

    #[test]
    fn test_small_lgs2_zero_target_without_small_kernel_vector() {
        // only multiples of m annihilate the identity
        let a = Matrix::from_i64(vec![vec![1, 0], vec![0, 1]]).unwrap();
        let err = small_lgs2(&a, None, &BigInt::from(7)).unwrap_err();
        assert!(matches!(err, LatticeError::PreconditionViolated(_)));
    }

    #[test]
    fn test_row_lattice_transform() {
        let m = BigInt::from(720u32);
        let a = Matrix::from_i64(vec![
            vec![123, 457, 1000, 6],
            vec![90, 0, 45, 180],
            vec![7, 11, 13, 17],
        ])
        .unwrap();
        let row_lattice = reduced_row_lattice(&a, &m, &LLLParams::exact(0.99)).unwrap();
        let augmented = a.vstack(&Matrix::scalar_identity(4, &m)).unwrap();
        assert_eq!(row_lattice.basis.dimension(), (4, 4));
        assert_eq!(row_lattice.transform.dimension(), (4, 7));
        assert_eq!(row_lattice.transform.mul(&augmented).unwrap(), row_lattice.basis);
        assert_eq!(row_lattice.coefficients_of_a().unwrap().dimension(), (4, 3));

        // the reduced rows and the stacked generators span the same lattice
        let generators = Lattice::new(augmented).unwrap();
        let reduced = Lattice::new(row_lattice.basis.clone()).unwrap();
        for row in row_lattice.basis.row_iter() {
            assert!(generators.contains(&LatticeVector::new(row.to_vec())).unwrap());
        }
        for row in generators.basis().row_iter() {
            assert!(reduced.contains(&LatticeVector::new(row.to_vec())).unwrap());
        }
    }

    #[test]
    fn test_nearest_plane_target() {
        let m = BigInt::from(10);
        let residues: Vec<BigInt> = [3, 5, 6].iter().map(|&r| BigInt::from(r)).collect();
        let target = nearest_plane_target(&Matrix::identity(3), &residues, &m).unwrap();
        assert_eq!(target, LatticeVector::from_integer_vec(vec![3, -5, -4]));

        // centering would lift 12 to -10 and solve to (2, -3)
        let basis = Matrix::from_i64(vec![vec![3, 1], vec![1, 4]]).unwrap();
        let m = BigInt::from(22);
        let residues = vec![BigInt::from(3), BigInt::from(12)];
        let target = nearest_plane_target(&basis, &residues, &m).unwrap();
        assert_eq!(target, LatticeVector::from_integer_vec(vec![3, 12]));
        assert_eq!(
            solve_nonsingular(&basis, &target).unwrap(),
            LatticeVector::from_integer_vec(vec![0, 3])
        );
    }

    #[test]
    fn test_truncated_lgs_returns_correction() {
        let m = BigInt::from(1_000_000u32);
        let a = Matrix::from_i64(vec![
            vec![123_457, 654_321, 111_111, 987_653],
            vec![222_223, 333_331, 444_449, 555_557],
        ])
        .unwrap();
        // every entry of exact is a multiple of m, so A exact = 0 (mod m)
        let exact = LatticeVector::from_integer_vec(vec![1_000_000, -2_000_000, 0, 3_000_000]);
        let offset = LatticeVector::from_integer_vec(vec![1, 0, -1, 2]);
        let y = exact.add(&offset).unwrap();

        let x = truncated_lgs(&a, &y, &m).unwrap();
        assert_eq!(x, offset.scalar_mul(&BigInt::from(-1)));
    }

    #[test]
    fn test_dimension_and_modulus_errors() {
        let a = Matrix::from_i64(vec![vec![1, 2, 3]]).unwrap();
        let c = LatticeVector::from_integer_vec(vec![1, 2]);
        let m = BigInt::from(7);
        assert!(matches!(
            small_lgs2(&a, Some(&c), &m),
            Err(LatticeError::InvalidDimensions { .. })
        ));
        assert!(matches!(
            small_lgs2(&a, None, &BigInt::zero()),
            Err(LatticeError::InvalidParameters(_))
        ));
        assert!(matches!(
            truncated_lgs(&a, &LatticeVector::zeros(2), &m),
            Err(LatticeError::InvalidDimensions { .. })
        ));
    }
}
