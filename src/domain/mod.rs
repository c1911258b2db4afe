//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the in-memory spectral dataset (`Dataset`, `DatasetStats`)
//! - preprocessing configuration (`PreprocessSpec`)
//! - fitted-model types (`PlsModel`, `FitQuality`, `ComponentScore`)
//! - the saved model artifact (`ModelFile`)

pub mod types;

pub use types::*;
