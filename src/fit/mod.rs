//! Calibration orchestration.
//!
//! Responsibilities:
//!
//! - split samples into deterministic cross-validation folds
//! - score each candidate component count by out-of-fold RMSE (parallel)
//! - select the component count and refit on all samples

pub mod cv;
pub mod search;

pub use cv::*;
pub use search::*;
