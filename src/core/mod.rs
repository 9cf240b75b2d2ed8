//! Integer vectors and matrices, lattices over them, and the shared error type.

pub mod error;
pub mod lattice;
pub mod matrix;
pub mod types;

pub use error::*;
pub use lattice::*;
pub use matrix::*;
pub use types::*;
