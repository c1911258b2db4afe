//! Terminal diagnostics.

pub mod ascii;

pub use ascii::*;
