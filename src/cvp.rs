//! CVP (Closest Vector Problem) approximation
//!
//! Two heuristics run over every configured reduction:
//! Babai's nearest-plane algorithm on each reduced basis, and Kannan's
//! embedding, which turns the CVP instance into a short-vector search one
//! dimension up. [`CVPAlgorithm::Combined`] runs both and keeps the closer
//! answer.

use crate::core::error::{LatticeError, Result};
use crate::core::lattice::Lattice;
use crate::core::matrix::Matrix;
use crate::core::types::{round_ratio, LatticeVector};
use crate::lll::{LLLParams, ReductionConfig};
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};
use serde::{Deserialize, Serialize};

/// Parameters for CVP solver
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CVPSolverParams {
    /// Algorithm type
    pub algorithm: CVPAlgorithm,
    /// Reductions to try
    pub reduction: ReductionConfig,
    /// Embedding constant; defaults to the largest absolute basis entry
    pub embedding_bound: Option<BigInt>,
}

impl CVPSolverParams {
    /// Create new CVP parameters with specific algorithm
    pub fn with_algorithm(algorithm: CVPAlgorithm) -> Self {
        CVPSolverParams {
            algorithm,
            ..Default::default()
        }
    }

    /// Validate parameters
    pub fn validate(&self) -> Result<()> {
        if let Some(bound) = &self.embedding_bound {
            if !bound.is_positive() {
                return Err(LatticeError::invalid_parameters(format!(
                    "Embedding bound must be positive, got {}",
                    bound
                )));
            }
        }
        self.reduction.validate()
    }
}

/// CVP algorithm types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CVPAlgorithm {
    /// Babai's nearest plane algorithm
    BabaiNearestPlane,
    /// Kannan embedding
    Embedding,
    /// Both, keeping the closer point
    #[default]
    Combined,
}

impl std::fmt::Display for CVPAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CVPAlgorithm::BabaiNearestPlane => write!(f, "babai"),
            CVPAlgorithm::Embedding => write!(f, "embedding"),
            CVPAlgorithm::Combined => write!(f, "combined"),
        }
    }
}

/// Result of CVP computation
#[derive(Debug, Clone)]
pub struct CVPResult {
    /// The closest lattice vector found
    pub closest_vector: LatticeVector,
    /// Squared distance to the target
    pub distance_squared: BigInt,
    /// Distance to the target
    pub distance: f64,
    /// Heuristic that produced the point
    pub algorithm: CVPAlgorithm,
    /// Reduction that produced the point
    pub reduction: LLLParams,
    /// Execution time in seconds
    pub execution_time: f64,
}

/// A lattice point with its squared distance to the target
struct Candidate {
    point: LatticeVector,
    distance_squared: BigInt,
    reduction: LLLParams,
}

impl Candidate {
    fn closer_than(&self, other: &Option<Candidate>) -> bool {
        other
            .as_ref()
            .map_or(true, |best| self.distance_squared < best.distance_squared)
    }
}

/// CVP solver implementation
#[derive(Debug, Clone, Default)]
pub struct CVPSolver {
    params: CVPSolverParams,
}

impl CVPSolver {
    /// Create new CVP solver with default parameters
    pub fn new() -> Self {
        Self::with_params(CVPSolverParams::default())
    }

    /// Create new CVP solver with custom parameters
    pub fn with_params(params: CVPSolverParams) -> Self {
        CVPSolver { params }
    }

    /// Find a lattice point close to `target`.
    ///
    /// Returns `Ok(None)` when the lattice has no nonzero generator.
    pub fn solve(&self, lattice: &Lattice, target: &LatticeVector) -> Result<Option<CVPResult>> {
        self.params.validate()?;

        if target.dimension() != lattice.ambient_dimension() {
            return Err(LatticeError::invalid_dimensions(
                (lattice.ambient_dimension(), 1),
                (target.dimension(), 1),
            ));
        }

        if lattice.nonzero_rows().is_empty() {
            return Ok(None);
        }

        let start_time = std::time::Instant::now();

        let (candidate, algorithm) = match self.params.algorithm {
            CVPAlgorithm::BabaiNearestPlane => (
                self.solve_babai_nearest_plane(lattice, target)?,
                CVPAlgorithm::BabaiNearestPlane,
            ),
            CVPAlgorithm::Embedding => {
                (self.solve_embedding(lattice, target)?, CVPAlgorithm::Embedding)
            }
            CVPAlgorithm::Combined => {
                let babai = self.solve_babai_nearest_plane(lattice, target)?;
                let embedding = self.solve_embedding(lattice, target)?;
                match (babai, embedding) {
                    (Some(b), e) if b.closer_than(&e) => {
                        (Some(b), CVPAlgorithm::BabaiNearestPlane)
                    }
                    (_, e) => (e, CVPAlgorithm::Embedding),
                }
            }
        };

        let execution_time = start_time.elapsed().as_secs_f64();

        Ok(candidate.map(|c| {
            log::debug!(
                "CVP: {} point at squared distance of {} bits ({} LLL, delta = {})",
                algorithm,
                c.distance_squared.bits(),
                c.reduction.strategy,
                c.reduction.delta
            );
            CVPResult {
                distance: c.distance_squared.to_f64().map_or(f64::INFINITY, f64::sqrt),
                closest_vector: c.point,
                distance_squared: c.distance_squared,
                algorithm,
                reduction: c.reduction,
                execution_time,
            }
        }))
    }

    /// Babai's nearest plane algorithm on every reduced basis, best point by distance
    fn solve_babai_nearest_plane(
        &self,
        lattice: &Lattice,
        target: &LatticeVector,
    ) -> Result<Option<Candidate>> {
        let mut best: Option<Candidate> = None;

        for (params, reduced) in self.params.reduction.reduce_all(lattice)? {
            let point = match nearest_plane(&reduced, target) {
                Some(point) => point,
                None => continue,
            };
            let candidate = Candidate {
                distance_squared: target.sub(&point)?.norm_squared(),
                point,
                reduction: params,
            };
            if candidate.closer_than(&best) {
                best = Some(candidate);
            }
        }

        Ok(best)
    }

    /// Kannan embedding: short vectors of the lattice spanned by `(b_i, 0)` and
    /// `(target, bound)` whose last coordinate is `-bound` encode lattice points
    /// close to the target
    fn solve_embedding(
        &self,
        lattice: &Lattice,
        target: &LatticeVector,
    ) -> Result<Option<Candidate>> {
        let n = lattice.ambient_dimension();
        let bound = match &self.params.embedding_bound {
            Some(bound) => bound.clone(),
            None => {
                let max = lattice.basis().max_abs_entry();
                if max.is_zero() {
                    BigInt::one()
                } else {
                    max
                }
            }
        };

        let mut rows: Vec<Vec<BigInt>> = lattice
            .basis()
            .row_iter()
            .map(|row| {
                let mut extended = row.to_vec();
                extended.push(BigInt::zero());
                extended
            })
            .collect();
        rows.push(target.extended(bound.clone()).into_vec());
        let embedded = Lattice::new(Matrix::from_rows(rows, n + 1)?)?;

        let minus_bound = -&bound;
        let mut best: Option<Candidate> = None;

        for (params, reduced) in self.params.reduction.reduce_all(&embedded)? {
            for row in reduced.basis().row_iter() {
                let flip = row[n].is_positive();
                let last = if flip { -&row[n] } else { row[n].clone() };
                if last != minus_bound {
                    continue;
                }

                let point: LatticeVector = row[..n]
                    .iter()
                    .zip(target.as_slice())
                    .map(|(x, t)| if flip { t - x } else { x + t })
                    .collect();
                if !lattice.contains(&point)? {
                    log::warn!("embedding candidate failed the lattice membership check");
                    continue;
                }

                let candidate = Candidate {
                    distance_squared: target.sub(&point)?.norm_squared(),
                    point,
                    reduction: params.clone(),
                };
                if candidate.closer_than(&best) {
                    best = Some(candidate);
                }
            }
        }

        Ok(best)
    }
}

/// Babai's nearest plane on one basis. `None` when every Gram-Schmidt vector is zero.
fn nearest_plane(basis: &Lattice, target: &LatticeVector) -> Option<LatticeVector> {
    let gs = basis.gram_schmidt();
    if gs.rank() == 0 {
        return None;
    }

    let mut residual = target.as_slice().to_vec();
    for (i, row) in basis.basis().row_iter().enumerate().rev() {
        let norm = &gs.norm_squared[i];
        if norm.is_zero() {
            continue;
        }
        let projection = residual
            .iter()
            .zip(&gs.b_star[i])
            .fold(BigRational::zero(), |acc, (r, b)| {
                acc + b * BigRational::from_integer(r.clone())
            });
        let coefficient = round_ratio(&(projection / norm));
        if coefficient.is_zero() {
            continue;
        }
        for (r, b) in residual.iter_mut().zip(row) {
            *r -= &coefficient * b;
        }
    }

    Some(
        target
            .as_slice()
            .iter()
            .zip(&residual)
            .map(|(t, r)| t - r)
            .collect(),
    )
}

/// Closest-vector approximation with the combined strategy over `config`
pub fn closest_vector(
    lattice: &Lattice,
    target: &LatticeVector,
    config: &ReductionConfig,
) -> Result<Option<LatticeVector>> {
    let params = CVPSolverParams {
        reduction: config.clone(),
        ..Default::default()
    };
    Ok(CVPSolver::with_params(params)
        .solve(lattice, target)?
        .map(|result| result.closest_vector))
}
