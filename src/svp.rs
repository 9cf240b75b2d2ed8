//! SVP (Shortest Vector Problem) approximation
//!
//! No enumeration: the lattice is reduced once per configured parameter set
//! and the shortest nonzero row over all reduced bases wins.

use crate::core::error::{LatticeError, Result};
use crate::core::lattice::Lattice;
use crate::core::types::LatticeVector;
use crate::lll::{LLLParams, ReductionConfig};
use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

/// Parameters for SVP solver
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SVPSolverParams {
    /// Reductions to try
    pub reduction: ReductionConfig,
}

impl SVPSolverParams {
    /// Parameters trying the given reductions
    pub fn with_reduction(reduction: ReductionConfig) -> Self {
        SVPSolverParams { reduction }
    }

    /// Validate parameters
    pub fn validate(&self) -> Result<()> {
        self.reduction.validate()
    }
}

/// Result of SVP computation
#[derive(Debug, Clone)]
pub struct SVPResult {
    /// The shortest vector found, sign-canonicalized
    pub solution: LatticeVector,
    /// Squared norm of the solution
    pub norm_squared: BigInt,
    /// Norm of the solution
    pub norm: f64,
    /// Reduction that produced the solution
    pub reduction: LLLParams,
    /// Number of nonzero candidate rows compared
    pub candidates_examined: usize,
    /// Execution time in seconds
    pub execution_time: f64,
}

/// SVP solver implementation
#[derive(Debug, Clone, Default)]
pub struct SVPSolver {
    params: SVPSolverParams,
}

impl SVPSolver {
    /// Create new SVP solver with default parameters
    pub fn new() -> Self {
        Self::with_params(SVPSolverParams::default())
    }

    /// Create new SVP solver with custom parameters
    pub fn with_params(params: SVPSolverParams) -> Self {
        SVPSolver { params }
    }

    /// Find a short nonzero vector of `lattice`
    pub fn solve(&self, lattice: &Lattice) -> Result<SVPResult> {
        self.params.validate()?;

        let start_time = std::time::Instant::now();
        let reductions = self.params.reduction.reduce_all(lattice)?;
        let mut best: Option<(LatticeVector, BigInt, &LLLParams)> = None;
        let mut candidates_examined = 0;

        for (params, reduced) in &reductions {
            for row in reduced.nonzero_rows() {
                candidates_examined += 1;
                let norm_squared = row.norm_squared();
                let shorter = best
                    .as_ref()
                    .map_or(true, |(_, best_norm, _)| norm_squared < *best_norm);
                if shorter {
                    best = Some((row, norm_squared, params));
                }
            }
        }

        let (vector, norm_squared, params) = best.ok_or_else(|| {
            LatticeError::degenerate("lattice has no nonzero vector")
        })?;
        let solution = vector.normalized();
        let execution_time = start_time.elapsed().as_secs_f64();

        log::debug!(
            "SVP: squared norm {} bits from {} candidates ({} LLL, delta = {})",
            norm_squared.bits(),
            candidates_examined,
            params.strategy,
            params.delta
        );

        Ok(SVPResult {
            norm: solution.norm(),
            solution,
            norm_squared,
            reduction: params.clone(),
            candidates_examined,
            execution_time,
        })
    }
}

/// Shortest nonzero row over every reduction in `config`, sign-canonicalized
pub fn approx_shortest(lattice: &Lattice, config: &ReductionConfig) -> Result<LatticeVector> {
    SVPSolver::with_params(SVPSolverParams::with_reduction(config.clone()))
        .solve(lattice)
        .map(|result| result.solution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::Signed;

    #[test]
    fn test_svp_params_validation() {
        assert!(SVPSolverParams::default().validate().is_ok());

        let invalid_params = SVPSolverParams {
            reduction: ReductionConfig { candidates: vec![] },
        };
        assert!(invalid_params.validate().is_err());
    }

    #[test]
    fn test_svp_2d() {
        let lattice = Lattice::from_matrix(vec![vec![3, 0], vec![0, 4]]).unwrap();
        let result = SVPSolver::new().solve(&lattice).unwrap();

        assert_eq!(result.solution, LatticeVector::from_integer_vec(vec![3, 0]));
        assert_eq!(result.norm_squared, BigInt::from(9));
        assert!((result.norm - 3.0).abs() < 1e-12);
        assert!(result.candidates_examined >= 2);
    }

    #[test]
    fn test_svp_finds_hidden_short_vector() {
        // (1, 1, 0) hides behind a skewed basis
        let lattice = Lattice::from_matrix(vec![
            vec![1, 1, 0],
            vec![40, 39, 7],
            vec![101, 100, 13],
        ])
        .unwrap();
        let shortest = approx_shortest(&lattice, &ReductionConfig::thorough()).unwrap();
        assert!(shortest.norm_squared() <= BigInt::from(2));
        assert!(!shortest.is_zero());
        assert!(lattice.contains(&shortest).unwrap());
    }

    #[test]
    fn test_svp_sign_canonical() {
        let lattice = Lattice::from_matrix(vec![vec![-2, 5], vec![0, 100]]).unwrap();
        let shortest = approx_shortest(&lattice, &ReductionConfig::fast()).unwrap();
        assert!(!shortest.as_slice()[0].is_negative());
        assert_eq!(shortest, LatticeVector::from_integer_vec(vec![2, -5]));
    }

    #[test]
    fn test_svp_skips_zero_rows() {
        let lattice = Lattice::from_matrix(vec![vec![0, 0], vec![4, 6], vec![6, 9]]).unwrap();
        let shortest = approx_shortest(&lattice, &ReductionConfig::fast()).unwrap();
        assert!(!shortest.is_zero());
        assert_eq!(shortest, LatticeVector::from_integer_vec(vec![2, 3]));
    }

    #[test]
    fn test_svp_degenerate() {
        let lattice = Lattice::from_matrix(vec![vec![0, 0, 0]]).unwrap();
        let err = SVPSolver::new().solve(&lattice).unwrap_err();
        assert!(matches!(err, LatticeError::DegenerateLattice(_)));
    }
}
