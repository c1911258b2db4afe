//! Partial least squares regression (PLS1).
//!
//! The model is implemented as small, pure functions over nalgebra types so
//! that the cross-validation and search code can stay generic.

pub mod pls;

pub use pls::*;
