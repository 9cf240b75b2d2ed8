//! Core error types for lattice operations

use thiserror::Error;

/// Error types for lattice reduction and congruence solving
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LatticeError {
    /// No integer solution exists for the exact system being solved
    #[error("Infeasible system: {0}")]
    InfeasibleSystem(String),

    /// An invariant expected of a solvable instance does not hold
    #[error("Algorithm precondition violated: {0}")]
    PreconditionViolated(String),

    /// Rank-0 or all-zero basis where a nonzero result was expected
    #[error("Degenerate lattice: {0}")]
    DegenerateLattice(String),

    /// Invalid matrix or vector dimensions
    #[error("Invalid dimensions: expected {expected:?}, found {found:?}")]
    InvalidDimensions {
        expected: (usize, usize),
        found: (usize, usize),
    },

    /// Invalid parameters
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// Malformed instance or lattice data
    #[error("Parse error: {0}")]
    Parse(String),

    /// File I/O error
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for LatticeError {
    fn from(e: std::io::Error) -> Self {
        LatticeError::io(e.to_string())
    }
}

impl From<serde_json::Error> for LatticeError {
    fn from(e: serde_json::Error) -> Self {
        LatticeError::parse(format!("JSON: {}", e))
    }
}

/// Result type for lattice operations
pub type Result<T> = std::result::Result<T, LatticeError>;

impl LatticeError {
    /// Create an infeasible system error
    pub fn infeasible(msg: impl Into<String>) -> Self {
        LatticeError::InfeasibleSystem(msg.into())
    }

    /// Create a precondition violation error
    pub fn precondition(msg: impl Into<String>) -> Self {
        LatticeError::PreconditionViolated(msg.into())
    }

    /// Create a degenerate lattice error
    pub fn degenerate(msg: impl Into<String>) -> Self {
        LatticeError::DegenerateLattice(msg.into())
    }

    /// Create an invalid dimensions error
    pub fn invalid_dimensions(expected: (usize, usize), found: (usize, usize)) -> Self {
        LatticeError::InvalidDimensions { expected, found }
    }

    /// Create an invalid parameters error
    pub fn invalid_parameters(msg: impl Into<String>) -> Self {
        LatticeError::InvalidParameters(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        LatticeError::Parse(msg.into())
    }

    /// Create an I/O error
    pub fn io(msg: impl Into<String>) -> Self {
        LatticeError::Io(msg.into())
    }

    /// Re-tag an infeasibility raised by an internal solve as a precondition failure.
    ///
    /// The modular solvers use this for sub-systems that are solvable whenever the
    /// instance itself is within the algorithm's validity conditions.
    pub fn into_precondition(self, context: &str) -> Self {
        match self {
            LatticeError::InfeasibleSystem(msg) => {
                LatticeError::PreconditionViolated(format!("{}: {}", context, msg))
            }
            other => other,
        }
    }
}
