//! Lattice representation and operations

use crate::core::error::{LatticeError, Result};
use crate::core::matrix::Matrix;
use crate::core::types::{decimal_ratio, GramSchmidt, LatticeVector};
use crate::smith::solve_integer;
use num_bigint::BigInt;
use std::fs;
use std::path::Path;

/// A lattice given by the integer span of a generating matrix's rows
///
/// The rows need not be linearly independent; zero rows are allowed and
/// contribute nothing to the span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lattice {
    basis: Matrix,
}

impl Lattice {
    /// Create a new lattice from a generating matrix
    pub fn new(basis: Matrix) -> Result<Self> {
        if basis.cols() == 0 {
            return Err(LatticeError::invalid_parameters(
                "Lattice ambient dimension cannot be zero",
            ));
        }
        Ok(Lattice { basis })
    }

    /// Create from machine integers
    pub fn from_matrix(data: Vec<Vec<i64>>) -> Result<Self> {
        Self::new(Matrix::from_i64(data)?)
    }

    /// (generators, ambient dimension)
    pub fn dimension(&self) -> (usize, usize) {
        self.basis.dimension()
    }

    /// Number of generating rows
    pub fn num_generators(&self) -> usize {
        self.basis.rows()
    }

    /// Dimension of the span of the generators
    pub fn rank(&self) -> usize {
        self.gram_schmidt().rank()
    }

    /// Ambient dimension (number of columns)
    pub fn ambient_dimension(&self) -> usize {
        self.basis.cols()
    }

    /// Get the generating matrix
    pub fn basis(&self) -> &Matrix {
        &self.basis
    }

    /// Consume into the generating matrix
    pub fn into_basis(self) -> Matrix {
        self.basis
    }

    /// Exact Gram-Schmidt orthogonalization of the generators
    pub fn gram_schmidt(&self) -> GramSchmidt {
        GramSchmidt::from_basis(&self.basis)
    }

    /// Nonzero generating rows, in order
    pub fn nonzero_rows(&self) -> Vec<LatticeVector> {
        self.basis
            .row_iter()
            .map(|row| LatticeVector::new(row.to_vec()))
            .filter(|v| !v.is_zero())
            .collect()
    }

    /// Check that the nonzero rows form a size-reduced basis satisfying the
    /// Lovász condition for `delta`
    pub fn is_reduced(&self, delta: f64) -> Result<bool> {
        let delta = decimal_ratio(delta)
            .ok_or_else(|| LatticeError::invalid_parameters("delta must be finite"))?;
        let rows: Vec<Vec<BigInt>> =
            self.nonzero_rows().into_iter().map(LatticeVector::into_vec).collect();
        let nonzero = Matrix::from_rows(rows, self.ambient_dimension())?;
        let gs = GramSchmidt::from_basis(&nonzero);
        Ok(gs.rank() == nonzero.rows() && gs.check_lovasz_condition(&delta))
    }

    /// Membership test: `vector` is an integer combination of the generators
    pub fn contains(&self, vector: &LatticeVector) -> Result<bool> {
        if vector.dimension() != self.ambient_dimension() {
            return Err(LatticeError::invalid_dimensions(
                (self.ambient_dimension(), 1),
                (vector.dimension(), 1),
            ));
        }
        match solve_integer(&self.basis.transpose(), vector) {
            Ok(_) => Ok(true),
            Err(LatticeError::InfeasibleSystem(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Convert to string representation: a "rows cols" header followed by one row per line
    pub fn to_fplll_format(&self) -> String {
        let mut output = format!("{} {}\n", self.num_generators(), self.ambient_dimension());
        for row in self.basis.row_iter() {
            output.push_str(&row.iter().map(|x| x.to_string()).collect::<Vec<_>>().join(" "));
            output.push('\n');
        }
        output
    }

    /// Parse the text format. The "rows cols" header is optional; rows may be
    /// wrapped in fplll-style brackets and separated by spaces, commas or semicolons.
    pub fn from_fplll_format(input: &str) -> Result<Self> {
        let lines: Vec<&str> = input
            .lines()
            .map(str::trim)
            .filter(|l| !l.starts_with('#'))
            .filter(|l| !l.trim_matches(|c| c == '[' || c == ']').trim().is_empty())
            .collect();

        let (first_line, rest) = lines
            .split_first()
            .ok_or_else(|| LatticeError::parse("Lattice input is empty"))?;

        let header: Vec<usize> = first_line
            .split_whitespace()
            .map(|t| t.parse::<usize>())
            .collect::<std::result::Result<Vec<usize>, _>>()
            .unwrap_or_default();
        // A two-column first row is only a header if the row count agrees with it
        let has_header = header.len() == 2 && rest.len() == header[0];

        let body: &[&str] = if has_header { rest } else { &lines };
        let rows = body
            .iter()
            .enumerate()
            .map(|(i, line)| Self::parse_row(line, i + 1))
            .collect::<Result<Vec<_>>>()?;

        let cols = if has_header {
            header[1]
        } else {
            rows.first().map_or(0, Vec::len)
        };

        Self::new(Matrix::from_rows(rows, cols).map_err(|e| LatticeError::parse(e.to_string()))?)
    }

    /// Helper: parse a single matrix row from a line
    fn parse_row(line: &str, line_no: usize) -> Result<Vec<BigInt>> {
        let tokens: Vec<&str> = line
            .split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | '[' | ']'))
            .filter(|t| !t.is_empty())
            .collect();

        tokens
            .into_iter()
            .map(|tok| {
                tok.parse::<BigInt>().map_err(|e| {
                    LatticeError::parse(format!(
                        "Failed to parse integer at row {}: '{}': {}",
                        line_no, tok, e
                    ))
                })
            })
            .collect()
    }

    /// Save to file in the text format
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.to_fplll_format())?;
        Ok(())
    }

    /// Load a lattice from a file.
    ///
    /// Supported formats:
    ///  1. JSON: `[[1, 2], ["340282366920938463463374607431768211456", 3]]`;
    ///     entries are numbers or decimal strings
    ///  2. Text, see [`Lattice::from_fplll_format`]
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            LatticeError::io(format!("Failed to read lattice file {}: {}", path.display(), e))
        })?;
        let trimmed = content.trim();

        if trimmed.starts_with("[[") || trimmed.starts_with("[ [") {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
                return Self::from_json_value(&value);
            }
            // not JSON; fall through to the bracketed text parser
        }
        Self::from_fplll_format(trimmed)
    }

    fn from_json_value(value: &serde_json::Value) -> Result<Self> {
        let rows = value
            .as_array()
            .ok_or_else(|| LatticeError::parse("expected an array of rows"))?;
        let mut data = Vec::with_capacity(rows.len());
        for row in rows {
            let entries = row
                .as_array()
                .ok_or_else(|| LatticeError::parse("expected each row to be an array"))?;
            data.push(
                entries
                    .iter()
                    .map(json_integer)
                    .collect::<Result<Vec<BigInt>>>()?,
            );
        }
        let cols = data.first().map_or(0, Vec::len);
        Self::new(Matrix::from_rows(data, cols)?)
    }
}

/// Parse a JSON number or decimal string as an integer
pub(crate) fn json_integer(value: &serde_json::Value) -> Result<BigInt> {
    let text = match value {
        serde_json::Value::Number(n) if n.is_i64() || n.is_u64() => n.to_string(),
        serde_json::Value::String(s) => s.trim().to_string(),
        other => {
            return Err(LatticeError::parse(format!(
                "expected an integer or decimal string, found {}",
                other
            )))
        }
    };
    text.parse::<BigInt>()
        .map_err(|e| LatticeError::parse(format!("invalid integer '{}': {}", text, e)))
}

impl std::fmt::Display for Lattice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Lattice with {} generators in dimension {}:",
            self.num_generators(),
            self.ambient_dimension()
        )?;
        write!(f, "{}", self.basis)
    }
}
