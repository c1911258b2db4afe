//! Mathematical utilities: least squares, Savitzky–Golay filtering, metrics.

pub mod ols;
pub mod savgol;
pub mod stats;

pub use ols::*;
pub use savgol::*;
pub use stats::*;
