//! Command-line parsing for the SOC spectroscopy fitter.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod picker;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "soc", version, about = "Soil organic carbon from VNIR spectra (PLS regression)")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Calibrate a PLS model on a spectral CSV (or synthetic data), print
    /// diagnostics, and optionally plot/export.
    Fit(FitArgs),
    /// Apply a saved model JSON to a new spectral CSV.
    Predict(PredictArgs),
    /// Plot a previously exported model JSON.
    Plot(PlotArgs),
    /// Write a synthetic demo CSV.
    Sample(SampleArgs),
    /// Launch the interactive TUI.
    ///
    /// This uses the same underlying fit pipeline as `soc fit`, but renders
    /// results in a terminal UI using Ratatui.
    Tui(FitArgs),
}

/// Common options for fitting (CLI and TUI).
#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// Spectral CSV (wide format: id, metadata, one column per wavelength).
    #[arg(short = 'f', long = "csv", value_name = "FILE")]
    pub csv: Option<PathBuf>,

    /// Generate a synthetic dataset instead of reading a CSV.
    #[arg(long)]
    pub synthetic: bool,

    /// Number of synthetic samples to generate.
    #[arg(short = 'n', long, default_value_t = 120)]
    pub sample_count: usize,

    /// Random seed (synthetic data and shuffled cross-validation).
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Identifier column name.
    #[arg(long, default_value = "id")]
    pub id_column: String,

    /// Target column name, or `auto` to probe soc/soc_percent/oc/toc.
    #[arg(long, default_value = "auto")]
    pub target: String,

    /// Drop wavelengths below this value (nm).
    #[arg(long)]
    pub wl_min: Option<f64>,

    /// Drop wavelengths above this value (nm).
    #[arg(long)]
    pub wl_max: Option<f64>,

    /// Savitzky-Golay window length (odd band count; 1 disables filtering).
    #[arg(long, default_value_t = 17)]
    pub window: usize,

    /// Savitzky-Golay polynomial order.
    #[arg(long, default_value_t = 2)]
    pub polyorder: usize,

    /// Savitzky-Golay derivative order (0 = smoothing only).
    #[arg(long, default_value_t = 2)]
    pub derivative: usize,

    /// Largest component count to evaluate.
    #[arg(short = 'k', long, default_value_t = 20)]
    pub max_components: usize,

    /// Cross-validation folds.
    #[arg(long, default_value_t = 10)]
    pub folds: usize,

    /// Shuffle samples (seeded) before assigning folds.
    #[arg(long)]
    pub cv_shuffle: bool,

    /// Prefer fewer components when RMSECV is within this relative tolerance
    /// of the best (0.05 = 5%).
    #[arg(long, default_value_t = 0.0)]
    pub parsimony_tol: f64,

    /// Show top-N worst-predicted samples.
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// Render ASCII plots in the terminal (enabled by default).
    #[arg(long, default_value_t = true)]
    pub plot: bool,

    /// Disable the terminal plots.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,

    /// Export per-sample predictions to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Export the calibrated model (weights + grid + quality) to JSON.
    #[arg(long = "export-model")]
    pub export_model: Option<PathBuf>,

    /// Write a markdown debug bundle after the run.
    #[arg(long)]
    pub debug_bundle: bool,
}

/// Options for applying a saved model.
#[derive(Debug, Parser)]
pub struct PredictArgs {
    /// Model JSON produced by `soc fit --export-model`.
    #[arg(short = 'm', long, value_name = "JSON")]
    pub model: PathBuf,

    /// Spectral CSV on the same wavelength grid as the model.
    #[arg(short = 'f', long = "csv", value_name = "FILE")]
    pub csv: PathBuf,

    /// Identifier column name.
    #[arg(long, default_value = "id")]
    pub id_column: String,

    /// Export per-sample predictions to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Render the scatter plot when observed values are present.
    #[arg(long, default_value_t = true)]
    pub plot: bool,

    /// Disable the terminal plot.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,
}

/// Options for plotting a saved model.
#[derive(Debug, Parser)]
pub struct PlotArgs {
    /// Model JSON produced by `soc fit --export-model`.
    #[arg(short = 'm', long, value_name = "JSON")]
    pub model: PathBuf,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,
}

/// Options for writing a synthetic demo CSV.
#[derive(Debug, Parser)]
pub struct SampleArgs {
    /// Output CSV path.
    #[arg(short = 'o', long, value_name = "FILE", default_value = "soc_demo.csv")]
    pub out: PathBuf,

    /// Number of samples.
    #[arg(short = 'n', long, default_value_t = 120)]
    pub sample_count: usize,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}
