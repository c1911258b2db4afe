//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - exported to JSON/CSV
//! - reloaded later for prediction or plotting

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::NaiveDate;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Savitzky–Golay preprocessing configuration.
///
/// The filter fits a local polynomial of degree `polyorder` over a sliding
/// window of `window` points and evaluates its `derivative`-th derivative at
/// the window center. `derivative = 0` is plain smoothing; `derivative = 2`
/// is the classic treatment for diffuse-reflectance spectra because it
/// removes additive baseline offsets and linear slopes while sharpening
/// absorption features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreprocessSpec {
    /// Window length in spectral bands. Must be odd and greater than `polyorder`.
    pub window: usize,
    /// Degree of the local polynomial.
    pub polyorder: usize,
    /// Derivative order evaluated at the window center (`0` = smoothing).
    pub derivative: usize,
}

impl PreprocessSpec {
    /// Validate the window/polyorder/derivative combination against a
    /// spectrum of `n_bands` points.
    ///
    /// `window = 1, polyorder = 0, derivative = 0` is accepted and yields the
    /// identity filter, so raw spectra remain reachable without a separate
    /// bypass flag.
    pub fn validate(&self, n_bands: usize) -> Result<(), String> {
        if self.window % 2 == 0 {
            return Err(format!(
                "Savitzky–Golay window must be odd (got {})",
                self.window
            ));
        }
        if self.window <= self.polyorder {
            return Err(format!(
                "Savitzky–Golay window ({}) must exceed the polynomial order ({})",
                self.window, self.polyorder
            ));
        }
        if self.derivative > self.polyorder {
            return Err(format!(
                "derivative order ({}) must not exceed the polynomial order ({})",
                self.derivative, self.polyorder
            ));
        }
        if self.window > n_bands {
            return Err(format!(
                "Savitzky–Golay window ({}) exceeds the number of spectral bands ({n_bands})",
                self.window
            ));
        }
        Ok(())
    }

    /// Human-readable label for terminal output, e.g. `SG(w=17, p=2, d=2)`.
    pub fn label(&self) -> String {
        format!(
            "SG(w={}, p={}, d={})",
            self.window, self.polyorder, self.derivative
        )
    }
}

impl Default for PreprocessSpec {
    fn default() -> Self {
        // Window 17, quadratic, second derivative: the standard treatment for
        // VNIR soil spectra at a 2 nm step.
        Self {
            window: 17,
            polyorder: 2,
            derivative: 2,
        }
    }
}

/// An ingested spectral dataset, aligned by row.
///
/// `x` holds one spectrum per row (columns ordered by ascending wavelength);
/// `y` holds the reference SOC value (% by mass) for the same row; `ids` and
/// `meta` carry the identifier and untyped metadata columns for reporting and
/// exports.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub ids: Vec<String>,
    /// Per-sample metadata, keyed by (lowercased) column name.
    pub meta: Vec<BTreeMap<String, String>>,
    /// Metadata column names in input order (for stable export headers).
    pub meta_columns: Vec<String>,
    /// Wavelength of each column of `x`, in nm, strictly ascending and
    /// uniformly spaced.
    pub wavelengths: Vec<f64>,
    pub x: DMatrix<f64>,
    pub y: DVector<f64>,
}

impl Dataset {
    pub fn n_samples(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_bands(&self) -> usize {
        self.x.ncols()
    }

    /// Wavelength step in nm. The ingest layer guarantees uniform spacing.
    pub fn wavelength_step(&self) -> f64 {
        if self.wavelengths.len() < 2 {
            return 0.0;
        }
        (self.wavelengths[self.wavelengths.len() - 1] - self.wavelengths[0])
            / (self.wavelengths.len() - 1) as f64
    }

    pub fn stats(&self) -> DatasetStats {
        let (y_min, y_max) = self
            .y
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        DatasetStats {
            n_samples: self.n_samples(),
            n_bands: self.n_bands(),
            wl_min: self.wavelengths.first().copied().unwrap_or(0.0),
            wl_max: self.wavelengths.last().copied().unwrap_or(0.0),
            wl_step: self.wavelength_step(),
            y_min,
            y_max,
            y_mean: crate::math::stats::mean(self.y.as_slice()),
            y_sd: crate::math::stats::sample_std(self.y.as_slice()),
        }
    }
}

/// Summary statistics shown in reports and debug bundles.
#[derive(Debug, Clone)]
pub struct DatasetStats {
    pub n_samples: usize,
    pub n_bands: usize,
    pub wl_min: f64,
    pub wl_max: f64,
    pub wl_step: f64,
    pub y_min: f64,
    pub y_max: f64,
    pub y_mean: f64,
    pub y_sd: f64,
}

/// A fitted PLS regression in portable form.
///
/// Prediction is `y = Σ_j coefficients[j] * x[j] + intercept`, where `x` is a
/// *preprocessed* spectrum on the model's wavelength grid. Centering is folded
/// into the intercept so the saved form needs no column means.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlsModel {
    /// Number of latent components actually extracted.
    pub n_components: usize,
    /// One regression coefficient per spectral band.
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

/// Regression quality diagnostics.
///
/// `rpd` is the residual prediction deviation, sd(reference) / RMSE — the
/// conventional chemometrics screen for whether a calibration is usable
/// (rules of thumb: < 1.4 poor, 1.4–2 fair, > 2 good). `bias` is the mean of
/// (predicted − observed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitQuality {
    pub r2: f64,
    pub mse: f64,
    pub rmse: f64,
    pub rpd: f64,
    pub bias: f64,
    pub n: usize,
}

/// One point of the metric-vs-component-count curve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentScore {
    pub components: usize,
    /// RMSE of the out-of-fold predictions at this component count.
    pub rmse: f64,
    /// R² of the out-of-fold predictions at this component count.
    pub r2: f64,
}

/// A candidate component count rejected during the search, with the reason.
#[derive(Debug, Clone)]
pub struct SkippedCandidate {
    pub components: usize,
    pub reason: String,
}

/// Per-sample predictions of the final model (used for ranking and exports).
///
/// `y_fit` is the calibration prediction (model applied to its own training
/// row); `y_cv` is the out-of-fold prediction at the chosen component count.
/// `residual` is `y_cv − y_obs`, the honest error estimate.
#[derive(Debug, Clone)]
pub struct SampleResidual {
    pub index: usize,
    pub id: String,
    pub y_obs: f64,
    pub y_fit: f64,
    pub y_cv: f64,
    pub residual: f64,
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct FitConfig {
    /// CSV to ingest. `None` with `synthetic = true` means generated data.
    pub csv_path: Option<PathBuf>,
    pub synthetic: bool,
    /// Sample count for synthetic data.
    pub sample_count: usize,
    /// Seed for synthetic data and for shuffled cross-validation.
    pub seed: u64,

    pub id_column: String,
    /// Target column name, or `auto` to probe common SOC column names.
    pub target: String,
    pub wl_min: Option<f64>,
    pub wl_max: Option<f64>,

    pub preprocess: PreprocessSpec,

    /// Largest candidate component count (capped by data size).
    pub max_components: usize,
    pub folds: usize,
    /// Shuffle samples (seeded) before assigning folds; default is the
    /// in-order contiguous layout.
    pub cv_shuffle: bool,
    /// Prefer the smallest component count whose RMSECV is within
    /// `(1 + tol) ×` the best. `0.0` is a pure argmin.
    pub parsimony_tol: f64,

    pub top_n: usize,
    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,

    pub export_predictions: Option<PathBuf>,
    pub export_model: Option<PathBuf>,
    pub debug_bundle: bool,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            csv_path: None,
            synthetic: false,
            sample_count: 120,
            seed: 42,
            id_column: "id".to_string(),
            target: "auto".to_string(),
            wl_min: None,
            wl_max: None,
            preprocess: PreprocessSpec::default(),
            max_components: 20,
            folds: 10,
            cv_shuffle: false,
            parsimony_tol: 0.0,
            top_n: 10,
            plot: true,
            plot_width: 100,
            plot_height: 25,
            export_predictions: None,
            export_model: None,
            debug_bundle: false,
        }
    }
}

/// A saved model file (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelFile {
    pub tool: String,
    pub created: NaiveDate,
    /// Name of the target column the model was calibrated on.
    pub target: String,
    pub preprocess: PreprocessSpec,
    /// Wavelength grid (nm) the model expects, after any crop.
    pub wavelength_nm: Vec<f64>,
    pub model: PlsModel,
    pub calibration: FitQuality,
    pub cross_validation: FitQuality,
    pub cv_curve: Vec<ComponentScore>,
}
