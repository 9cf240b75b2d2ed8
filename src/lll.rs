//! LLL (Lenstra-Lenstra-Lovász) lattice reduction
//!
//! Two strategies share one parameter type:
//!
//! * [`ReductionStrategy::Exact`] runs an all-integer modified LLL that
//!   accepts linearly dependent generating sets. Dependent generators come
//!   out as zero rows placed first, followed by a reduced basis.
//! * [`ReductionStrategy::FloatingPoint`] keeps the basis exact but tracks
//!   the Gram-Schmidt data in `f64`. It is fast on small full-rank inputs
//!   and only ever used as an extra candidate for SVP/CVP searches.

use crate::core::error::{LatticeError, Result};
use crate::core::lattice::Lattice;
use crate::core::matrix::{sub_row_multiple, Matrix};
use crate::core::types::{decimal_ratio, dot, round_div, AlgorithmParams};
use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{FromPrimitive, One, Signed, ToPrimitive, Zero};
use serde::{Deserialize, Serialize};

/// Arithmetic used for the reduction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReductionStrategy {
    /// Integral modified LLL over exact integers
    Exact,
    /// Schnorr-Euchner style LLL with `f64` Gram-Schmidt coefficients
    FloatingPoint,
}

impl std::fmt::Display for ReductionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReductionStrategy::Exact => write!(f, "exact"),
            ReductionStrategy::FloatingPoint => write!(f, "floating-point"),
        }
    }
}

/// Parameters for LLL reduction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LLLParams {
    /// Reduction parameter (0.25 < delta < 1), typically 0.99
    pub delta: f64,
    /// Size-reduction slack for the floating-point strategy (0.5 < eta < sqrt(delta))
    pub eta: f64,
    /// Arithmetic used for the reduction
    pub strategy: ReductionStrategy,
    /// Algorithm parameters
    #[serde(default)]
    pub algorithm_params: AlgorithmParams,
}

impl Default for LLLParams {
    fn default() -> Self {
        LLLParams {
            delta: 0.99,
            eta: 0.51,
            strategy: ReductionStrategy::Exact,
            algorithm_params: AlgorithmParams::default(),
        }
    }
}

impl LLLParams {
    /// Create new parameters with custom delta and eta for the exact strategy
    pub fn new(delta: f64, eta: f64) -> Self {
        LLLParams {
            delta,
            eta,
            ..Default::default()
        }
    }

    /// Exact reduction with the given delta
    pub fn exact(delta: f64) -> Self {
        LLLParams {
            delta,
            ..Default::default()
        }
    }

    /// Floating-point reduction with the given delta
    pub fn floating_point(delta: f64) -> Self {
        LLLParams {
            delta,
            strategy: ReductionStrategy::FloatingPoint,
            ..Default::default()
        }
    }

    /// Validate parameters
    pub fn validate(&self) -> Result<()> {
        if !(0.25 < self.delta && self.delta < 1.0) {
            return Err(LatticeError::invalid_parameters(format!(
                "Delta must be in (0.25, 1.0), got {}",
                self.delta
            )));
        }

        if self.strategy == ReductionStrategy::FloatingPoint
            && !(0.5 < self.eta && self.eta < self.delta.sqrt())
        {
            return Err(LatticeError::invalid_parameters(format!(
                "Eta must be in (0.5, sqrt(delta)), got {}",
                self.eta
            )));
        }

        Ok(())
    }

    /// Delta as an exact fraction `(numerator, denominator)`
    fn delta_ratio(&self) -> Result<(BigInt, BigInt)> {
        let ratio = decimal_ratio(self.delta)
            .ok_or_else(|| LatticeError::invalid_parameters("Delta must be finite"))?;
        Ok((ratio.numer().clone(), ratio.denom().clone()))
    }
}

/// Counters collected during a reduction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LLLStats {
    /// Number of size-reduction steps that changed a row
    pub size_reductions: usize,
    /// Number of exchange steps
    pub swaps: usize,
    /// Main-loop iterations
    pub iterations: usize,
    /// Rank of the generated lattice
    pub rank: usize,
}

/// LLL reducer implementation
#[derive(Debug, Clone, Default)]
pub struct LLLReducer {
    params: LLLParams,
}

impl LLLReducer {
    /// Create new LLL reducer with default parameters
    pub fn new() -> Self {
        Self::with_params(LLLParams::default())
    }

    /// Create new LLL reducer with custom parameters
    pub fn with_params(params: LLLParams) -> Self {
        LLLReducer { params }
    }

    /// Parameters in use
    pub fn params(&self) -> &LLLParams {
        &self.params
    }

    /// Reduce the generators of `lattice`
    pub fn reduce(&self, lattice: &Lattice) -> Result<Lattice> {
        self.reduce_with_stats(lattice).map(|(reduced, _)| reduced)
    }

    /// Reduce the generators of `lattice` and report what the reduction did
    pub fn reduce_with_stats(&self, lattice: &Lattice) -> Result<(Lattice, LLLStats)> {
        let (basis, stats) = self.reduce_matrix(lattice.basis())?;
        Ok((Lattice::new(basis)?, stats))
    }

    /// Reduce the rows of a matrix
    pub fn reduce_matrix(&self, basis: &Matrix) -> Result<(Matrix, LLLStats)> {
        self.params.validate()?;
        let cols = basis.cols();
        let rows = basis.to_vec();

        let (rows, stats) = match self.params.strategy {
            ReductionStrategy::Exact => {
                let (num, den) = self.params.delta_ratio()?;
                let (rows, _, stats) = IntegralReduction::new(rows, num, den).run();
                (rows, stats)
            }
            ReductionStrategy::FloatingPoint => {
                FloatReduction::new(rows, &self.params).run()
            }
        };

        log::debug!(
            "{} LLL (delta = {}) on {}x{}: rank {}, {} swaps, {} size reductions",
            self.params.strategy,
            self.params.delta,
            basis.rows(),
            cols,
            stats.rank,
            stats.swaps,
            stats.size_reductions
        );

        Ok((Matrix::from_raw_parts(rows, cols), stats))
    }

    /// Reduce the rows of a matrix and return the unimodular `U` with `U·basis = reduced`.
    ///
    /// Only the exact strategy records its row operations.
    pub fn reduce_matrix_with_transform(&self, basis: &Matrix) -> Result<(Matrix, Matrix, LLLStats)> {
        self.params.validate()?;
        if self.params.strategy != ReductionStrategy::Exact {
            return Err(LatticeError::invalid_parameters(format!(
                "transform tracking needs the exact strategy, got {}",
                self.params.strategy
            )));
        }

        let (num, den) = self.params.delta_ratio()?;
        let (rows, transform, stats) = IntegralReduction::new(basis.to_vec(), num, den)
            .tracking_transform()
            .run();
        let transform = transform.unwrap_or_else(|| Matrix::identity(basis.rows()).into_rows());

        log::debug!(
            "exact LLL (delta = {}) with transform on {}x{}: rank {}, {} swaps",
            self.params.delta,
            basis.rows(),
            basis.cols(),
            stats.rank,
            stats.swaps
        );

        Ok((
            Matrix::from_raw_parts(rows, basis.cols()),
            Matrix::from_raw_parts(transform, basis.rows()),
            stats,
        ))
    }
}

/// Integral modified LLL state.
///
/// Rows are tracked together with the Gram determinants `d` of the
/// independent rows seen so far and the scaled coefficients
/// `lambda[k][p] = d[p] * mu(k, p)`. `position[k]` is the 1-based rank
/// position of row `k`, or 0 when row `k` depends on the earlier rows.
/// When `transform` is present it receives every row operation applied to `b`.
struct IntegralReduction {
    b: Vec<Vec<BigInt>>,
    transform: Option<Vec<Vec<BigInt>>>,
    position: Vec<usize>,
    d: Vec<BigInt>,
    lambda: Vec<Vec<BigInt>>,
    rank: usize,
    seen: usize,
    delta_num: BigInt,
    delta_den: BigInt,
    stats: LLLStats,
}

impl IntegralReduction {
    fn new(b: Vec<Vec<BigInt>>, delta_num: BigInt, delta_den: BigInt) -> Self {
        let m = b.len();
        let mut d = vec![BigInt::zero(); m + 1];
        d[0] = BigInt::one();
        IntegralReduction {
            b,
            transform: None,
            position: vec![0; m],
            d,
            lambda: vec![vec![BigInt::zero(); m + 1]; m],
            rank: 0,
            seen: 0,
            delta_num,
            delta_den,
            stats: LLLStats::default(),
        }
    }

    /// Accumulate the row operations, starting from the identity
    fn tracking_transform(mut self) -> Self {
        let m = self.b.len();
        self.transform = Some(Matrix::identity(m).into_rows());
        self
    }

    fn run(mut self) -> (Vec<Vec<BigInt>>, Option<Vec<Vec<BigInt>>>, LLLStats) {
        let m = self.b.len();
        let mut k = 0;
        let mut force_reduce = true;

        while k < m {
            self.stats.iterations += 1;

            if k >= self.seen {
                self.extend_gram_schmidt(k);
                self.seen = k + 1;
            }

            if k == 0 {
                force_reduce = true;
                k += 1;
                continue;
            }

            if force_reduce {
                for j in (0..k).rev() {
                    self.size_reduce(k, j);
                }
            }

            if self.position[k - 1] != 0 && (self.position[k] == 0 || self.lovasz_fails(k)) {
                force_reduce = self.exchange(k);
                self.stats.swaps += 1;
                k -= 1;
            } else {
                force_reduce = true;
                k += 1;
            }
        }

        self.stats.rank = self.rank;
        (self.b, self.transform, self.stats)
    }

    fn swap_rows(&mut self, i: usize, j: usize) {
        self.b.swap(i, j);
        if let Some(u) = self.transform.as_mut() {
            u.swap(i, j);
        }
    }

    /// Bring row `k` into the Gram-Schmidt data
    fn extend_gram_schmidt(&mut self, k: usize) {
        for j in 0..k {
            let pj = self.position[j];
            if pj == 0 {
                continue;
            }
            let mut u = dot(&self.b[k], &self.b[j]);
            for i in 1..pj {
                u = (&self.d[i] * &u - &self.lambda[k][i] * &self.lambda[j][i]) / &self.d[i - 1];
            }
            self.lambda[k][pj] = u;
        }

        let mut u = dot(&self.b[k], &self.b[k]);
        for i in 1..=self.rank {
            u = (&self.d[i] * &u - &self.lambda[k][i] * &self.lambda[k][i]) / &self.d[i - 1];
        }

        if u.is_zero() {
            self.position[k] = 0;
        } else {
            self.rank += 1;
            self.position[k] = self.rank;
            self.d[self.rank] = u;
        }
    }

    /// Size-reduce row `k` against row `l`
    fn size_reduce(&mut self, k: usize, l: usize) {
        let pl = self.position[l];
        if pl == 0 {
            return;
        }
        let coefficient = &self.lambda[k][pl];
        if (coefficient + coefficient).abs() <= self.d[pl] {
            return;
        }

        let r = round_div(coefficient, &self.d[pl]);
        for j in 1..pl {
            let t = &r * &self.lambda[l][j];
            self.lambda[k][j] -= t;
        }
        let t = &r * &self.d[pl];
        self.lambda[k][pl] -= t;
        sub_row_multiple(&mut self.b, k, l, &r);
        if let Some(u) = self.transform.as_mut() {
            sub_row_multiple(u, k, l, &r);
        }
        self.stats.size_reductions += 1;
    }

    /// Lovász test between rows `k - 1` and `k`, both independent
    fn lovasz_fails(&self, k: usize) -> bool {
        let p = self.position[k];
        let l = &self.lambda[k][p - 1];
        let lhs = &self.delta_num * &self.d[p - 1] * &self.d[p - 1];
        let rhs = &self.delta_den * (&self.d[p] * &self.d[p - 2] + l * l);
        lhs > rhs
    }

    /// Swap the lambda entries of rows `k - 1` and `k` at the positions of rows before `k - 1`
    fn swap_earlier_lambdas(&mut self, k: usize) {
        for j in 0..k - 1 {
            let pj = self.position[j];
            if pj != 0 {
                let (lo, hi) = self.lambda.split_at_mut(k);
                std::mem::swap(&mut lo[k - 1][pj], &mut hi[0][pj]);
            }
        }
    }

    /// Exchange step at `k`. Returns whether row `k - 1` must be size-reduced again.
    fn exchange(&mut self, k: usize) -> bool {
        let m = self.seen;

        if self.position[k] != 0 {
            // both rows independent
            let p = self.position[k];
            self.swap_rows(k - 1, k);
            self.swap_earlier_lambdas(k);

            let l = self.lambda[k][p - 1].clone();
            for i in k + 1..m {
                let t1 = (&self.lambda[i][p - 1] * &l + &self.lambda[i][p] * &self.d[p - 2])
                    / &self.d[p - 1];
                let t2 = (&self.lambda[i][p - 1] * &self.d[p] - &self.lambda[i][p] * &l)
                    / &self.d[p - 1];
                self.lambda[i][p - 1] = t1;
                self.lambda[i][p] = t2;
            }
            self.d[p - 1] = (&self.d[p] * &self.d[p - 2] + &l * &l) / &self.d[p - 1];
            return false;
        }

        let p = self.position[k - 1];
        let l = self.lambda[k][p].clone();

        if l.is_zero() {
            self.swap_rows(k - 1, k);
            self.swap_earlier_lambdas(k);
            self.position.swap(k - 1, k);
            return false;
        }

        // row k depends on rows up to k - 1 but not on rows before k - 1:
        // replace the pair by a unimodular combination that zeroes row k - 1
        let egcd = l.extended_gcd(&self.d[p]);
        let (e, x, y) = (egcd.gcd, egcd.x, egcd.y);
        let t1 = &l / &e;
        let t2 = &self.d[p] / &e;
        let t2_squared = &t2 * &t2;

        combine_pair(&mut self.b, k, [&t1, &t2, &y, &x]);
        if let Some(u) = self.transform.as_mut() {
            combine_pair(u, k, [&t1, &t2, &y, &x]);
        }

        for j in 0..k - 1 {
            let pj = self.position[j];
            if pj == 0 {
                continue;
            }
            let (lo, hi) = self.lambda.split_at_mut(k);
            let a = &mut lo[k - 1][pj];
            let c = &mut hi[0][pj];
            let new_a = &t1 * &*a - &t2 * &*c;
            let new_c = &y * &*a + &x * &*c;
            *a = new_a;
            *c = new_c;
        }

        self.d[p] = &self.d[p] / &t2_squared;
        for q in p + 1..=self.rank {
            self.d[q] = &self.d[q] / &t2_squared;
        }
        for i in k + 1..m {
            self.lambda[i][p] = &self.lambda[i][p] / &t2;
            for q in p + 1..=self.rank {
                self.lambda[i][q] = &self.lambda[i][q] / &t2_squared;
            }
        }
        self.lambda[k - 1][p] = BigInt::zero();
        self.position.swap(k - 1, k);
        true
    }
}

/// Rows `k - 1` and `k` become `t1 a - t2 c` and `y a + x c`
fn combine_pair(rows: &mut [Vec<BigInt>], k: usize, [t1, t2, y, x]: [&BigInt; 4]) {
    let (upper, lower) = rows.split_at_mut(k);
    for (a, c) in upper[k - 1].iter_mut().zip(lower[0].iter_mut()) {
        let new_a = t1 * &*a - t2 * &*c;
        let new_c = y * &*a + x * &*c;
        *a = new_a;
        *c = new_c;
    }
}

/// Floating-point LLL state: exact rows and Gram matrix, `f64` orthogonalization
struct FloatReduction {
    b: Vec<Vec<BigInt>>,
    gram: Vec<Vec<BigInt>>,
    mu: Vec<Vec<f64>>,
    r: Vec<Vec<f64>>,
    r_diag: Vec<f64>,
    delta: f64,
    eta: f64,
    max_iterations: usize,
    stats: LLLStats,
}

impl FloatReduction {
    fn new(b: Vec<Vec<BigInt>>, params: &LLLParams) -> Self {
        let n = b.len();
        let gram = (0..n)
            .map(|i| (0..n).map(|j| dot(&b[i], &b[j])).collect())
            .collect();
        FloatReduction {
            b,
            gram,
            mu: vec![vec![0.0; n]; n],
            r: vec![vec![0.0; n]; n],
            r_diag: vec![0.0; n],
            delta: params.delta,
            eta: params.eta,
            max_iterations: params.algorithm_params.max_iterations,
            stats: LLLStats::default(),
        }
    }

    fn run(mut self) -> (Vec<Vec<BigInt>>, LLLStats) {
        let n = self.b.len();
        if n == 0 {
            return (self.b, self.stats);
        }
        self.orthogonalize(0);

        let mut k = 1;
        while k < n {
            self.stats.iterations += 1;
            if self.stats.iterations > self.max_iterations {
                log::warn!("LLL reduction reached maximum iterations");
                break;
            }

            loop {
                self.orthogonalize(k);
                let mut changed = false;
                for j in (0..k).rev() {
                    let mu = self.mu[k][j];
                    if !mu.is_finite() || mu.abs() <= self.eta {
                        continue;
                    }
                    if let Some(q) = BigInt::from_f64(mu.round()) {
                        if !q.is_zero() {
                            self.subtract(k, j, &q);
                            self.orthogonalize(k);
                            changed = true;
                        }
                    }
                }
                if !changed {
                    break;
                }
                self.stats.iterations += 1;
                if self.stats.iterations > self.max_iterations {
                    break;
                }
            }

            let mu = self.mu[k][k - 1];
            let shortened = self.r_diag[k] + mu * mu * self.r_diag[k - 1];
            if self.delta * self.r_diag[k - 1] > shortened {
                self.swap(k);
                self.stats.swaps += 1;
                k = (k - 1).max(1);
                self.orthogonalize(k - 1);
            } else {
                k += 1;
            }
        }

        self.stats.rank = self.r_diag.iter().filter(|&&x| x > 0.0).count();
        (self.b, self.stats)
    }

    /// Recompute row `k` of the orthogonalization from the Gram matrix
    fn orthogonalize(&mut self, k: usize) {
        for j in 0..k {
            if self.r_diag[j] <= 0.0 {
                self.r[k][j] = 0.0;
                self.mu[k][j] = 0.0;
                continue;
            }
            let mut s = self.gram[k][j].to_f64().unwrap_or(f64::NAN);
            for i in 0..j {
                s -= self.mu[j][i] * self.r[k][i];
            }
            self.r[k][j] = s;
            self.mu[k][j] = s / self.r_diag[j];
        }

        let mut v = self.gram[k][k].to_f64().unwrap_or(f64::NAN);
        for j in 0..k {
            v -= self.mu[k][j] * self.r[k][j];
        }
        self.r_diag[k] = if !self.gram[k][k].is_zero() && v > 0.0 { v } else { 0.0 };
    }

    /// b[k] -= q * b[j], keeping the Gram matrix exact
    fn subtract(&mut self, k: usize, j: usize, q: &BigInt) {
        sub_row_multiple(&mut self.b, k, j, q);
        let n = self.b.len();
        let gkk = &self.gram[k][k] - BigInt::from(2) * q * &self.gram[k][j]
            + q * q * &self.gram[j][j];
        for i in 0..n {
            if i == k {
                continue;
            }
            let updated = &self.gram[k][i] - q * &self.gram[j][i];
            self.gram[i][k] = updated.clone();
            self.gram[k][i] = updated;
        }
        self.gram[k][k] = gkk;
        self.stats.size_reductions += 1;
    }

    fn swap(&mut self, k: usize) {
        self.b.swap(k - 1, k);
        self.gram.swap(k - 1, k);
        for row in self.gram.iter_mut() {
            row.swap(k - 1, k);
        }
    }
}

/// A set of reduction parameters to try, in order.
///
/// SVP and CVP searches reduce the input once per candidate and keep the
/// best answer over all of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReductionConfig {
    /// Parameter sets, tried in order
    pub candidates: Vec<LLLParams>,
}

impl Default for ReductionConfig {
    fn default() -> Self {
        Self::fast()
    }
}

impl ReductionConfig {
    /// A single exact reduction with delta 0.99
    pub fn fast() -> Self {
        Self::single(LLLParams::exact(0.99))
    }

    /// Both strategies at delta 0.75, 0.9, 0.99 and 0.999
    pub fn thorough() -> Self {
        let deltas = [0.75, 0.9, 0.99, 0.999];
        let candidates = [ReductionStrategy::Exact, ReductionStrategy::FloatingPoint]
            .iter()
            .flat_map(|&strategy| {
                deltas.iter().map(move |&delta| LLLParams {
                    delta,
                    strategy,
                    ..Default::default()
                })
            })
            .collect();
        ReductionConfig { candidates }
    }

    /// Exactly one parameter set
    pub fn single(params: LLLParams) -> Self {
        ReductionConfig {
            candidates: vec![params],
        }
    }

    /// Number of candidates
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Whether there are no candidates
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Validate every candidate
    pub fn validate(&self) -> Result<()> {
        if self.candidates.is_empty() {
            return Err(LatticeError::invalid_parameters(
                "Reduction config needs at least one candidate",
            ));
        }
        self.candidates.iter().try_for_each(LLLParams::validate)
    }

    /// Reduce `lattice` once per candidate, lazily, in candidate order
    pub fn reductions<'a>(
        &'a self,
        lattice: &'a Lattice,
    ) -> impl Iterator<Item = Result<(&'a LLLParams, Lattice)>> + 'a {
        self.candidates.iter().map(move |params| {
            LLLReducer::with_params(params.clone())
                .reduce(lattice)
                .map(|reduced| (params, reduced))
        })
    }

    /// Reduce `lattice` once per candidate and collect the results in candidate order
    #[cfg(not(feature = "parallel"))]
    pub fn reduce_all(&self, lattice: &Lattice) -> Result<Vec<(LLLParams, Lattice)>> {
        self.reductions(lattice)
            .map(|res| res.map(|(params, reduced)| (params.clone(), reduced)))
            .collect()
    }

    /// Reduce `lattice` once per candidate and collect the results in candidate order
    #[cfg(feature = "parallel")]
    pub fn reduce_all(&self, lattice: &Lattice) -> Result<Vec<(LLLParams, Lattice)>> {
        use rayon::prelude::*;

        self.candidates
            .par_iter()
            .map(|params| {
                LLLReducer::with_params(params.clone())
                    .reduce(lattice)
                    .map(|reduced| (params.clone(), reduced))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::LatticeVector;
    use crate::smith::SmithForm;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn same_lattice(a: &Lattice, b: &Lattice) -> bool {
        let covers = |x: &Lattice, y: &Lattice| {
            y.basis()
                .row_iter()
                .all(|row| x.contains(&LatticeVector::new(row.to_vec())).unwrap())
        };
        covers(a, b) && covers(b, a)
    }

    fn zero_rows_first(lattice: &Lattice) -> bool {
        let basis = lattice.basis();
        let zeros = (0..basis.rows()).take_while(|&i| basis.is_zero_row(i)).count();
        (zeros..basis.rows()).all(|i| !basis.is_zero_row(i))
    }

    fn random_generators(rng: &mut StdRng, rows: usize, cols: usize, bound: i64) -> Lattice {
        let data = (0..rows)
            .map(|_| (0..cols).map(|_| rng.random_range(-bound..=bound)).collect())
            .collect();
        Lattice::from_matrix(data).unwrap()
    }

    #[test]
    fn test_lll_params_validation() {
        let valid_params = LLLParams::new(0.99, 0.51);
        assert!(valid_params.validate().is_ok());

        let invalid_delta = LLLParams::new(0.2, 0.51);
        assert!(invalid_delta.validate().is_err());

        let invalid_delta = LLLParams::exact(1.0);
        assert!(invalid_delta.validate().is_err());

        // eta only matters for the floating-point strategy
        let mut params = LLLParams::floating_point(0.6);
        params.eta = 0.9;
        assert!(params.validate().is_err());
        assert!(LLLParams::new(0.6, 0.9).validate().is_ok());
    }

    #[test]
    fn test_lll_reduction_2d() {
        let lattice = Lattice::from_matrix(vec![vec![201, 37], vec![1648, 297]]).unwrap();

        for params in [LLLParams::exact(0.99), LLLParams::floating_point(0.99)] {
            let exact = params.strategy == ReductionStrategy::Exact;
            let reduced = LLLReducer::with_params(params).reduce(&lattice).unwrap();
            assert_eq!(reduced.dimension(), lattice.dimension());
            if exact {
                assert!(reduced.is_reduced(0.99).unwrap());
            }
            assert!(same_lattice(&lattice, &reduced));
            assert!(reduced.basis().get_row(0).unwrap().norm_squared() <= BigInt::from(2000));
        }
    }

    #[test]
    fn test_dependent_generators() {
        let lattice = Lattice::from_matrix(vec![
            vec![1, 2, 3],
            vec![2, 4, 6],
            vec![1, 0, 1],
            vec![3, 2, 5],
        ])
        .unwrap();

        let (reduced, stats) = LLLReducer::new().reduce_with_stats(&lattice).unwrap();
        assert_eq!(stats.rank, 2);
        assert_eq!(reduced.num_generators(), 4);
        assert!(zero_rows_first(&reduced));
        assert!(reduced.basis().is_zero_row(0));
        assert!(reduced.basis().is_zero_row(1));
        assert!(reduced.is_reduced(0.99).unwrap());
        assert!(same_lattice(&lattice, &reduced));
    }

    #[test]
    fn test_gcd_collapse() {
        // 6 and 10 generate 2Z
        let lattice = Lattice::from_matrix(vec![vec![6], vec![10]]).unwrap();
        let reduced = LLLReducer::new().reduce(&lattice).unwrap();
        assert!(reduced.basis().is_zero_row(0));
        assert_eq!(reduced.basis()[(1, 0)].abs(), BigInt::from(2));
    }

    #[test]
    fn test_zero_and_empty_inputs() {
        let zero = Lattice::from_matrix(vec![vec![0, 0], vec![0, 0]]).unwrap();
        let reduced = LLLReducer::new().reduce(&zero).unwrap();
        assert_eq!(reduced.nonzero_rows().len(), 0);

        let empty = Lattice::new(Matrix::empty(3)).unwrap();
        let reduced = LLLReducer::new().reduce(&empty).unwrap();
        assert_eq!(reduced.num_generators(), 0);

        let fp = LLLReducer::with_params(LLLParams::floating_point(0.9))
            .reduce(&empty)
            .unwrap();
        assert_eq!(fp.num_generators(), 0);
    }

    #[test]
    fn test_random_dependent_sets() {
        let mut rng = StdRng::seed_from_u64(7);
        for trial in 0..25 {
            let rows = rng.random_range(1..=7);
            let cols = rng.random_range(1..=5);
            let lattice = random_generators(&mut rng, rows, cols, 30);
            let delta = [0.75, 0.9, 0.99, 0.999999][trial % 4];

            let (reduced, stats) = LLLReducer::with_params(LLLParams::exact(delta))
                .reduce_with_stats(&lattice)
                .unwrap();

            assert_eq!(stats.rank, lattice.rank(), "trial {}", trial);
            assert!(zero_rows_first(&reduced), "trial {}", trial);
            assert_eq!(reduced.nonzero_rows().len(), stats.rank);
            assert!(reduced.is_reduced(delta).unwrap(), "trial {}", trial);
            assert!(same_lattice(&lattice, &reduced), "trial {}", trial);
        }
    }

    #[test]
    fn test_transform_reproduces_reduction() {
        let mut rng = StdRng::seed_from_u64(19);
        let reducer = LLLReducer::with_params(LLLParams::exact(0.99));
        for trial in 0..15 {
            let rows = rng.random_range(1..=7);
            let cols = rng.random_range(1..=5);
            let basis = random_generators(&mut rng, rows, cols, 1000).into_basis();

            let (reduced, transform, stats) = reducer.reduce_matrix_with_transform(&basis).unwrap();
            assert_eq!(transform.mul(&basis).unwrap(), reduced, "trial {}", trial);
            assert_eq!(reducer.reduce_matrix(&basis).unwrap(), (reduced, stats), "trial {}", trial);

            // unimodular: full rank with unit invariant factors
            let smith = SmithForm::compute(&transform);
            assert_eq!(smith.rank(), rows, "trial {}", trial);
            assert!(smith.invariant_factors().iter().all(|d| d.is_one()), "trial {}", trial);
        }

        let fp = LLLReducer::with_params(LLLParams::floating_point(0.99));
        assert!(matches!(
            fp.reduce_matrix_with_transform(&Matrix::identity(2)),
            Err(LatticeError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_floating_point_preserves_lattice() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..10 {
            let n = rng.random_range(2..=5);
            let lattice = random_generators(&mut rng, n, n, 1000);
            let reduced = LLLReducer::with_params(LLLParams::floating_point(0.99))
                .reduce(&lattice)
                .unwrap();
            assert!(same_lattice(&lattice, &reduced));
        }
    }

    #[test]
    fn test_reduction_config() {
        assert_eq!(ReductionConfig::default(), ReductionConfig::fast());
        assert_eq!(ReductionConfig::fast().len(), 1);

        let thorough = ReductionConfig::thorough();
        assert_eq!(thorough.len(), 8);
        assert!(thorough.validate().is_ok());
        assert_eq!(thorough.candidates[0].strategy, ReductionStrategy::Exact);
        assert_eq!(thorough.candidates[7].strategy, ReductionStrategy::FloatingPoint);

        let empty = ReductionConfig { candidates: vec![] };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_reduce_all_keeps_candidate_order() {
        let lattice = Lattice::from_matrix(vec![vec![1, 1, 1], vec![-1, 0, 2], vec![3, 5, 6]])
            .unwrap();
        let config = ReductionConfig::thorough();
        let results = config.reduce_all(&lattice).unwrap();
        assert_eq!(results.len(), config.len());
        for ((params, reduced), expected) in results.iter().zip(&config.candidates) {
            assert_eq!(params, expected);
            assert!(same_lattice(&lattice, reduced));
        }

        let lazy: Vec<_> = config.reductions(&lattice).take(2).collect();
        assert_eq!(lazy.len(), 2);
    }

    #[test]
    fn test_params_serde() {
        let params = LLLParams::floating_point(0.9);
        let json = serde_json::to_string(&params).unwrap();
        let back: LLLParams = serde_json::from_str(&json).unwrap();
        assert_eq!(params, back);

        let value: serde_json::Value = serde_json::to_value(&params.algorithm_params).unwrap();
        assert_eq!(value, serde_json::json!({ "max_iterations": 1_000_000 }));
        let capped: LLLParams = serde_json::from_str(
            r#"{"delta":0.75,"eta":0.51,"strategy":"FloatingPoint","algorithm_params":{"max_iterations":5}}"#,
        )
        .unwrap();
        assert_eq!(capped.algorithm_params.max_iterations, 5);
    }
}
