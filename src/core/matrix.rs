//! Matrix operations and utilities

use crate::core::error::{LatticeError, Result};
use crate::core::types::{dot, LatticeVector};
use num_bigint::BigInt;
use num_traits::{One, Zero};

/// Integer matrix represented as a vector of rows (row-major)
///
/// A matrix may have zero rows while still carrying a column count; the
/// empty kernel of a full-rank map is represented that way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matrix {
    data: Vec<Vec<BigInt>>,
    rows: usize,
    cols: usize,
}

impl Matrix {
    /// Create a new matrix from 2D vector
    pub fn new(data: Vec<Vec<BigInt>>) -> Result<Self> {
        if data.is_empty() {
            return Err(LatticeError::invalid_parameters("Matrix cannot be empty"));
        }
        let cols = data[0].len();
        Self::from_rows(data, cols)
    }

    /// Create a matrix from rows with an explicit column count, allowing zero rows
    pub fn from_rows(data: Vec<Vec<BigInt>>, cols: usize) -> Result<Self> {
        let rows = data.len();
        for (i, row) in data.iter().enumerate() {
            if row.len() != cols {
                return Err(LatticeError::invalid_dimensions(
                    (rows, cols),
                    (i + 1, row.len()),
                ));
            }
        }
        Ok(Matrix { data, rows, cols })
    }

    /// Wrap rows already known to have `cols` entries each
    pub(crate) fn from_raw_parts(data: Vec<Vec<BigInt>>, cols: usize) -> Self {
        debug_assert!(data.iter().all(|row| row.len() == cols));
        Matrix { rows: data.len(), data, cols }
    }

    /// Create from machine integers
    pub fn from_i64(data: Vec<Vec<i64>>) -> Result<Self> {
        Self::new(
            data.into_iter()
                .map(|row| row.into_iter().map(BigInt::from).collect())
                .collect(),
        )
    }

    /// Matrix with no rows and `cols` columns
    pub fn empty(cols: usize) -> Self {
        Matrix { data: Vec::new(), rows: 0, cols }
    }

    /// Create a matrix with given dimensions, filled with zeros
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Matrix {
            data: vec![vec![BigInt::zero(); cols]; rows],
            rows,
            cols,
        }
    }

    /// Create an identity matrix
    pub fn identity(n: usize) -> Self {
        Self::scalar_identity(n, &BigInt::one())
    }

    /// `scale` times the identity matrix
    pub fn scalar_identity(n: usize, scale: &BigInt) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m.data[i][i] = scale.clone();
        }
        m
    }

    /// Get the number of rows
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Get the number of columns
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// (rows, cols)
    pub fn dimension(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Get a reference to a specific element
    pub fn get(&self, row: usize, col: usize) -> Option<&BigInt> {
        self.data.get(row)?.get(col)
    }

    /// Set a specific element
    pub fn set(&mut self, row: usize, col: usize, value: BigInt) -> Result<()> {
        if row >= self.rows || col >= self.cols {
            return Err(LatticeError::invalid_dimensions(
                (self.rows, self.cols),
                (row + 1, col + 1),
            ));
        }
        self.data[row][col] = value;
        Ok(())
    }

    /// Borrow a row
    pub fn row(&self, row: usize) -> Result<&[BigInt]> {
        self.data.get(row).map(Vec::as_slice).ok_or_else(|| {
            LatticeError::invalid_dimensions((self.rows, self.cols), (row + 1, self.cols))
        })
    }

    /// Get a row as a vector
    pub fn get_row(&self, row: usize) -> Result<LatticeVector> {
        Ok(LatticeVector::new(self.row(row)?.to_vec()))
    }

    /// Iterate over rows
    pub fn row_iter(
        &self,
    ) -> impl DoubleEndedIterator<Item = &[BigInt]> + ExactSizeIterator + '_ {
        self.data.iter().map(Vec::as_slice)
    }

    /// Get a column as a vector
    pub fn get_col(&self, col: usize) -> Result<LatticeVector> {
        if col >= self.cols {
            return Err(LatticeError::invalid_dimensions(
                (self.rows, self.cols),
                (self.rows, col + 1),
            ));
        }
        Ok(self.data.iter().map(|row| row[col].clone()).collect())
    }

    /// Transpose the matrix
    pub fn transpose(&self) -> Self {
        let data = (0..self.cols)
            .map(|j| self.data.iter().map(|row| row[j].clone()).collect())
            .collect();
        Matrix { data, rows: self.cols, cols: self.rows }
    }

    /// Matrix multiplication
    pub fn mul(&self, other: &Matrix) -> Result<Self> {
        if self.cols != other.rows {
            return Err(LatticeError::invalid_dimensions(
                (self.rows, self.cols),
                (other.rows, other.cols),
            ));
        }
        let columns = other.transpose();
        let data = self
            .data
            .iter()
            .map(|row| columns.data.iter().map(|col| dot(row, col)).collect())
            .collect();
        Ok(Matrix { data, rows: self.rows, cols: other.cols })
    }

    /// Matrix-vector product `self * v`
    pub fn mul_vec(&self, v: &LatticeVector) -> Result<LatticeVector> {
        if self.cols != v.dimension() {
            return Err(LatticeError::invalid_dimensions(
                (self.cols, 1),
                (v.dimension(), 1),
            ));
        }
        Ok(self.data.iter().map(|row| dot(row, v.as_slice())).collect())
    }

    /// Stack `other` below `self`
    pub fn vstack(&self, other: &Matrix) -> Result<Self> {
        if self.cols != other.cols {
            return Err(LatticeError::invalid_dimensions(
                (other.rows, self.cols),
                (other.rows, other.cols),
            ));
        }
        let mut data = self.data.clone();
        data.extend(other.data.iter().cloned());
        Ok(Matrix { rows: data.len(), data, cols: self.cols })
    }

    /// Place `other` to the right of `self`
    pub fn hstack(&self, other: &Matrix) -> Result<Self> {
        if self.rows != other.rows {
            return Err(LatticeError::invalid_dimensions(
                (self.rows, other.cols),
                (other.rows, other.cols),
            ));
        }
        let data = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| a.iter().chain(b).cloned().collect())
            .collect();
        Ok(Matrix { data, rows: self.rows, cols: self.cols + other.cols })
    }

    /// Append a row
    pub fn push_row(&mut self, row: Vec<BigInt>) -> Result<()> {
        if row.len() != self.cols {
            return Err(LatticeError::invalid_dimensions(
                (1, self.cols),
                (1, row.len()),
            ));
        }
        self.data.push(row);
        self.rows += 1;
        Ok(())
    }

    /// Keep only the rows in `range`
    pub fn slice_rows(&self, range: std::ops::Range<usize>) -> Result<Self> {
        if range.start > range.end || range.end > self.rows {
            return Err(LatticeError::invalid_dimensions(
                (self.rows, self.cols),
                (range.end, self.cols),
            ));
        }
        Ok(Matrix {
            data: self.data[range.clone()].to_vec(),
            rows: range.len(),
            cols: self.cols,
        })
    }

    /// Swap two rows
    pub fn swap_rows(&mut self, i: usize, j: usize) -> Result<()> {
        if i >= self.rows || j >= self.rows {
            return Err(LatticeError::invalid_dimensions(
                (self.rows, self.cols),
                (i.max(j) + 1, self.cols),
            ));
        }
        self.data.swap(i, j);
        Ok(())
    }

    /// True if row `i` is all zeros
    pub fn is_zero_row(&self, i: usize) -> bool {
        self.data.get(i).map_or(true, |row| row.iter().all(Zero::is_zero))
    }

    /// Largest absolute entry, zero for an empty matrix
    pub fn max_abs_entry(&self) -> BigInt {
        self.data
            .iter()
            .flatten()
            .map(|x| num_traits::Signed::abs(x))
            .max()
            .unwrap_or_else(BigInt::zero)
    }

    /// Convert to a 2D vector
    pub fn to_vec(&self) -> Vec<Vec<BigInt>> {
        self.data.clone()
    }

    /// Consume into rows
    pub fn into_rows(self) -> Vec<Vec<BigInt>> {
        self.data
    }
}

/// rows[dst] -= q * rows[src]
pub(crate) fn sub_row_multiple(rows: &mut [Vec<BigInt>], dst: usize, src: usize, q: &BigInt) {
    if q.is_zero() || dst == src {
        return;
    }
    let (target, source) = if dst < src {
        let (lo, hi) = rows.split_at_mut(src);
        (&mut lo[dst], &hi[0])
    } else {
        let (lo, hi) = rows.split_at_mut(dst);
        (&mut hi[0], &lo[src])
    };
    for (x, y) in target.iter_mut().zip(source.iter()) {
        *x -= q * y;
    }
}

impl std::ops::Index<(usize, usize)> for Matrix {
    type Output = BigInt;

    fn index(&self, (row, col): (usize, usize)) -> &BigInt {
        &self.data[row][col]
    }
}

impl std::fmt::Display for Matrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "[")?;
        for row in &self.data {
            let entries: Vec<String> = row.iter().map(|x| x.to_string()).collect();
            writeln!(f, "  [{}]", entries.join(" "))?;
        }
        write!(f, "]")
    }
}
