//! Input/output helpers.
//!
//! - spectral CSV ingest + validation (`ingest`)
//! - per-sample prediction and demo-data exports (`export`)
//! - model JSON read/write (`model`)

pub mod export;
pub mod ingest;
pub mod model;

pub use export::*;
pub use ingest::*;
pub use model::*;
