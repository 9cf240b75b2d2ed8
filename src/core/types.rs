//! Core types for lattice operations

use crate::core::error::{LatticeError, Result};
use crate::core::matrix::Matrix;
use num_bigint::BigInt;
use num_integer::Integer;
use num_rational::BigRational;
use num_traits::{Signed, ToPrimitive, Zero};
use serde::{Deserialize, Serialize};

/// Integer vector in lattice space
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct LatticeVector {
    data: Vec<BigInt>,
}

impl LatticeVector {
    /// Create a new lattice vector
    pub fn new(data: Vec<BigInt>) -> Self {
        LatticeVector { data }
    }

    /// Create a zero vector of given dimension
    pub fn zeros(dimension: usize) -> Self {
        LatticeVector {
            data: vec![BigInt::zero(); dimension],
        }
    }

    /// Create from machine integers
    pub fn from_integer_vec(data: Vec<i64>) -> Self {
        LatticeVector::new(data.into_iter().map(BigInt::from).collect())
    }

    /// Get the dimension
    pub fn dimension(&self) -> usize {
        self.data.len()
    }

    /// Get element at index
    pub fn get(&self, index: usize) -> Option<&BigInt> {
        self.data.get(index)
    }

    /// Get backing slice
    pub fn as_slice(&self) -> &[BigInt] {
        &self.data
    }

    /// Consume into the coordinate vector
    pub fn into_vec(self) -> Vec<BigInt> {
        self.data
    }

    /// Set element at index
    pub fn set(&mut self, index: usize, value: BigInt) -> Result<()> {
        let dimension = self.dimension();
        match self.data.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(LatticeError::invalid_parameters(format!(
                "index {} out of bounds for dimension {}",
                index, dimension
            ))),
        }
    }

    fn check_same_dimension(&self, other: &LatticeVector) -> Result<()> {
        if self.dimension() != other.dimension() {
            return Err(LatticeError::invalid_dimensions(
                (self.dimension(), 1),
                (other.dimension(), 1),
            ));
        }
        Ok(())
    }

    /// Dot product with another vector
    pub fn dot(&self, other: &LatticeVector) -> Result<BigInt> {
        self.check_same_dimension(other)?;
        Ok(dot(&self.data, &other.data))
    }

    /// Addition
    pub fn add(&self, other: &LatticeVector) -> Result<Self> {
        self.check_same_dimension(other)?;
        Ok(self.data.iter().zip(&other.data).map(|(a, b)| a + b).collect())
    }

    /// Subtraction
    pub fn sub(&self, other: &LatticeVector) -> Result<Self> {
        self.check_same_dimension(other)?;
        Ok(self.data.iter().zip(&other.data).map(|(a, b)| a - b).collect())
    }

    /// Scalar multiplication
    pub fn scalar_mul(&self, scalar: &BigInt) -> Self {
        self.data.iter().map(|x| x * scalar).collect()
    }

    /// Exact squared Euclidean norm
    pub fn norm_squared(&self) -> BigInt {
        dot(&self.data, &self.data)
    }

    /// Euclidean norm, for reporting only
    pub fn norm(&self) -> f64 {
        self.norm_squared().to_f64().unwrap_or(f64::INFINITY).sqrt()
    }

    /// True if every coordinate is zero
    pub fn is_zero(&self) -> bool {
        self.data.iter().all(Zero::is_zero)
    }

    /// Sign canonical form: the first nonzero coordinate is made non-negative,
    /// so `v` and `-v` normalize to the same vector.
    pub fn normalized(&self) -> Self {
        match self.data.iter().find(|x| !x.is_zero()) {
            Some(first) if first.is_negative() => self.data.iter().map(|x| -x).collect(),
            _ => self.clone(),
        }
    }

    /// Copy of this vector with one extra trailing coordinate
    pub fn extended(&self, value: BigInt) -> Self {
        let mut data = self.data.clone();
        data.push(value);
        LatticeVector { data }
    }
}

impl FromIterator<BigInt> for LatticeVector {
    fn from_iter<I: IntoIterator<Item = BigInt>>(iter: I) -> Self {
        LatticeVector::new(iter.into_iter().collect())
    }
}

impl From<Vec<BigInt>> for LatticeVector {
    fn from(data: Vec<BigInt>) -> Self {
        LatticeVector::new(data)
    }
}

impl std::fmt::Display for LatticeVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}]",
            self.data.iter().map(|x| x.to_string()).collect::<Vec<_>>().join(", ")
        )
    }
}

/// Exact Gram-Schmidt coefficients and vectors over the rationals
///
/// Rows that depend linearly on earlier rows get a zero `b*`; their `mu`
/// entries against zero `b*_j` are defined as 0.
#[derive(Debug, Clone)]
pub struct GramSchmidt {
    /// Orthogonal vectors (b*_i)
    pub b_star: Vec<Vec<BigRational>>,
    /// Coefficients mu[i][j] = <b_i, b*_j> / ||b*_j||^2 for j < i
    pub mu: Vec<Vec<BigRational>>,
    /// Squared norms of orthogonal vectors
    pub norm_squared: Vec<BigRational>,
}

impl GramSchmidt {
    /// Compute the orthogonalization of the rows of `basis`
    pub fn from_basis(basis: &Matrix) -> Self {
        let n = basis.rows();
        let mut b_star: Vec<Vec<BigRational>> = Vec::with_capacity(n);
        let mut mu: Vec<Vec<BigRational>> = Vec::with_capacity(n);
        let mut norm_squared: Vec<BigRational> = Vec::with_capacity(n);

        for row in basis.row_iter() {
            let mut w: Vec<BigRational> =
                row.iter().map(|x| BigRational::from_integer(x.clone())).collect();
            let mut mu_row = Vec::with_capacity(b_star.len());

            for (u, u_norm) in b_star.iter().zip(&norm_squared) {
                if u_norm.is_zero() {
                    mu_row.push(BigRational::zero());
                    continue;
                }
                let projection: BigRational = row
                    .iter()
                    .zip(u)
                    .map(|(a, b)| b * BigRational::from_integer(a.clone()))
                    .fold(BigRational::zero(), |acc, x| acc + x);
                let coefficient = projection / u_norm;
                for (wi, ui) in w.iter_mut().zip(u) {
                    *wi -= &coefficient * ui;
                }
                mu_row.push(coefficient);
            }

            let w_norm = w.iter().fold(BigRational::zero(), |acc, x| acc + x * x);
            b_star.push(w);
            mu.push(mu_row);
            norm_squared.push(w_norm);
        }

        GramSchmidt { b_star, mu, norm_squared }
    }

    /// Get mu coefficient
    pub fn get_mu(&self, i: usize, j: usize) -> Option<&BigRational> {
        self.mu.get(i)?.get(j)
    }

    /// Number of nonzero orthogonal vectors
    pub fn rank(&self) -> usize {
        self.norm_squared.iter().filter(|x| !x.is_zero()).count()
    }

    /// Check size reduction and the Lovász condition for every position
    pub fn check_lovasz_condition(&self, delta: &BigRational) -> bool {
        let half = BigRational::new(BigInt::from(1), BigInt::from(2));
        for i in 0..self.mu.len() {
            if self.mu[i].iter().any(|m| m.abs() > half) {
                return false;
            }
            if i > 0 {
                let mu = &self.mu[i][i - 1];
                let rhs = (delta - mu * mu) * &self.norm_squared[i - 1];
                if self.norm_squared[i] < rhs {
                    return false;
                }
            }
        }
        true
    }
}

/// Algorithm parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlgorithmParams {
    /// Maximum main-loop iterations for the floating-point strategy
    pub max_iterations: usize,
}

impl Default for AlgorithmParams {
    fn default() -> Self {
        AlgorithmParams {
            max_iterations: 1_000_000,
        }
    }
}

/// Dot product of two integer slices of equal length
pub fn dot(a: &[BigInt], b: &[BigInt]) -> BigInt {
    a.iter().zip(b).fold(BigInt::zero(), |acc, (x, y)| acc + x * y)
}

/// Nearest integer to `num / den`, ties rounded away from zero.
///
/// Panics if `den` is zero.
pub fn round_div(num: &BigInt, den: &BigInt) -> BigInt {
    let (num, den) = if den.is_negative() {
        (-num, -den)
    } else {
        (num.clone(), den.clone())
    };
    let (q, r) = num.div_mod_floor(&den);
    let twice = &r + &r;
    if twice > den || (twice == den && num.is_positive()) {
        q + 1
    } else {
        q
    }
}

/// Nearest integer to a rational, ties rounded away from zero
pub fn round_ratio(value: &BigRational) -> BigInt {
    round_div(value.numer(), value.denom())
}

/// Exact rational with the decimal expansion `value` prints as.
///
/// `0.99` becomes `99/100` rather than the binary fraction closest to it.
pub fn decimal_ratio(value: f64) -> Option<BigRational> {
    if !value.is_finite() {
        return None;
    }
    let text = format!("{}", value);
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), ""));
    let numer: BigInt = format!("{}{}", int_part, frac_part).parse().ok()?;
    let denom = BigInt::from(10u32).pow(frac_part.len() as u32);
    Some(BigRational::new(numer, denom))
}
