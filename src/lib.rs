//! Lattice toolkit for small solutions of linear congruences
//!
//! Recovers small integer `x` with `A x = c (mod m)`, for prime and composite
//! moduli and for zero targets. The crate provides:
//! - Smith normal form and exact integer linear algebra
//! - LLL reduction of possibly dependent generating sets (exact integral MLLL
//!   or floating-point Gram-Schmidt)
//! - SVP and CVP approximation over a list of reduction candidates
//! - kernel lattices modulo `m`
//! - the modular solvers `small_lgs`, `small_lgs2` and `truncated_lgs`
//!
//! # Examples
//!
//! Reducing a dependent generating set:
//! ```rust
//! use congruence_lattice::{Lattice, LLLReducer, LLLParams};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // the first two generators are parallel
//! let lattice = Lattice::from_matrix(vec![
//!     vec![2, 4, 6],
//!     vec![3, 6, 9],
//!     vec![1, 0, 1],
//! ])?;
//!
//! let reducer = LLLReducer::with_params(LLLParams::exact(0.99));
//! let reduced = reducer.reduce(&lattice)?;
//! assert!(reduced.basis().is_zero_row(0));
//! assert_eq!(reduced.nonzero_rows().len(), 2);
//! # Ok(())
//! # }
//! ```
//!
//! Recovering a planted solution modulo a composite number:
//! ```rust
//! use congruence_lattice::{small_lgs2, Matrix, LatticeVector};
//! use num_bigint::BigInt;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let m = BigInt::from(1_000_000);
//! let a = Matrix::from_i64(vec![
//!     vec![123_457, 654_321, 111_111, 987_653],
//!     vec![222_223, 333_331, 444_449, 555_557],
//! ])?;
//! let planted = LatticeVector::from_integer_vec(vec![2, -1, 3, 1]);
//! let c = a.mul_vec(&planted)?;
//!
//! assert_eq!(small_lgs2(&a, Some(&c), &m)?, planted);
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod cvp;
pub mod kernel;
pub mod lll;
pub mod smith;
pub mod solver;
pub mod svp;
pub mod utils;

pub use crate::core::*;
pub use cvp::*;
pub use kernel::*;
pub use lll::*;
pub use smith::*;
pub use solver::*;
pub use svp::*;

// Re-export commonly used types
pub use crate::core::error::{LatticeError, Result};
pub use crate::core::lattice::Lattice;
pub use crate::core::matrix::Matrix;
pub use crate::core::types::LatticeVector;

/// Feature flag utilities
pub mod features {
    /// Check if parallel evaluation of reduction candidates is enabled
    pub fn parallel_enabled() -> bool {
        cfg!(feature = "parallel")
    }
}

/// Log the status of optional features
pub fn validate_features() -> Result<()> {
    log::info!("Feature status - Parallel: {}", features::parallel_enabled());
    Ok(())
}
