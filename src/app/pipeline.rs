//! Shared "fit pipeline" logic used by both CLI and TUI front-ends.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! load/generate -> preprocess -> component search -> final fit -> residuals
//!
//! The CLI and the TUI can then focus on presentation (printing vs widgets).

use chrono::Local;
use nalgebra::DMatrix;

use crate::data::generate_sample;
use crate::domain::{FitConfig, ModelFile, SampleResidual};
use crate::error::AppError;
use crate::fit::{SearchOutcome, k_fold, search_components};
use crate::io::ingest::{IngestedData, load_spectra};
use crate::math::{SavgolFilter, quality, sample_std};

/// All computed outputs of a single `soc fit` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub ingest: IngestedData,
    /// Spectra after Savitzky-Golay preprocessing (model space).
    pub x_pre: DMatrix<f64>,
    pub outcome: SearchOutcome,
    /// The chosen model plus its qualities, in exportable form.
    pub artifact: ModelFile,
    /// Fraction of target variance captured by each extracted component.
    pub explained_y: Vec<f64>,
    pub residuals: Vec<SampleResidual>,
    pub worst: Vec<SampleResidual>,
}

/// Execute the full fitting pipeline and return the computed outputs.
pub fn run_fit(config: &FitConfig) -> Result<RunOutput, AppError> {
    let ingest = load_input(config)?;
    run_fit_with_data(config, ingest)
}

/// Resolve the input source: a CSV path or the synthetic generator.
pub fn load_input(config: &FitConfig) -> Result<IngestedData, AppError> {
    if config.synthetic {
        let dataset = generate_sample(config)?;
        return Ok(IngestedData::from_dataset(dataset, "soc"));
    }
    match &config.csv_path {
        Some(path) => load_spectra(path, config),
        None => Err(AppError::new(2, "No input: pass --csv FILE or --synthetic.")),
    }
}

/// Execute the fitting pipeline on already-loaded data.
///
/// This is useful for the TUI where we want to refit without re-reading the
/// CSV after a settings change.
pub fn run_fit_with_data(config: &FitConfig, ingest: IngestedData) -> Result<RunOutput, AppError> {
    let dataset = &ingest.dataset;

    if sample_std(dataset.y.as_slice()) <= f64::EPSILON {
        return Err(AppError::new(
            3,
            format!(
                "Target '{}' has no variance; nothing to calibrate.",
                ingest.target_column
            ),
        ));
    }

    let filter = SavgolFilter::new(&config.preprocess, dataset.wavelength_step(), dataset.n_bands())?;
    let x_pre = filter.apply_matrix(&dataset.x);

    let folds = k_fold(dataset.n_samples(), config.folds, config.cv_shuffle, config.seed)?;
    let outcome = search_components(
        &x_pre,
        &dataset.y,
        config.max_components,
        &folds,
        config.parsimony_tol,
    )?;

    // Refit on all samples at the chosen count for the exportable model.
    let fit = crate::models::fit(&x_pre, &dataset.y, outcome.chosen.components)?;
    let y_fit = crate::models::predict(&fit.model, &x_pre);

    let calibration = quality(dataset.y.as_slice(), y_fit.as_slice());
    let cross_validation = quality(dataset.y.as_slice(), outcome.y_cv.as_slice());

    let residuals = crate::report::compute_residuals(dataset, &y_fit, &outcome.y_cv)?;
    let worst = crate::report::rank_worst(&residuals, config.top_n);

    let artifact = ModelFile {
        tool: "soc".to_string(),
        created: Local::now().date_naive(),
        target: ingest.target_column.clone(),
        preprocess: config.preprocess,
        wavelength_nm: dataset.wavelengths.clone(),
        model: fit.model,
        calibration,
        cross_validation,
        cv_curve: outcome.scores.clone(),
    };

    Ok(RunOutput {
        ingest,
        x_pre,
        outcome,
        artifact,
        explained_y: fit.explained_y,
        residuals,
        worst,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PreprocessSpec;

    fn synthetic_config() -> FitConfig {
        FitConfig {
            synthetic: true,
            sample_count: 60,
            seed: 11,
            max_components: 8,
            folds: 5,
            ..FitConfig::default()
        }
    }

    #[test]
    fn synthetic_end_to_end_recovers_signal() {
        let run = run_fit(&synthetic_config()).unwrap();

        assert_eq!(run.ingest.rows_used, 60);
        assert_eq!(run.residuals.len(), 60);
        assert_eq!(run.x_pre.nrows(), 60);
        assert_eq!(run.artifact.wavelength_nm.len(), 1050);
        assert!(!run.outcome.scores.is_empty());
        assert_eq!(run.explained_y.len(), run.artifact.model.n_components);

        // The generator plants a linear SOC signal; cross-validated R2 should
        // clear a comfortable bar even with nuisance moisture and noise.
        assert!(
            run.artifact.cross_validation.r2 > 0.7,
            "cv r2 {}",
            run.artifact.cross_validation.r2
        );
        assert!(run.artifact.calibration.r2 >= run.artifact.cross_validation.r2 - 0.05);
    }

    #[test]
    fn runs_are_reproducible() {
        let a = run_fit(&synthetic_config()).unwrap();
        let b = run_fit(&synthetic_config()).unwrap();
        assert_eq!(a.outcome.chosen.components, b.outcome.chosen.components);
        assert_eq!(a.artifact.model.coefficients, b.artifact.model.coefficients);
        assert_eq!(a.outcome.y_cv, b.outcome.y_cv);
    }

    #[test]
    fn identity_preprocessing_also_calibrates() {
        let config = FitConfig {
            preprocess: PreprocessSpec { window: 1, polyorder: 0, derivative: 0 },
            ..synthetic_config()
        };
        let run = run_fit(&config).unwrap();
        assert!(run.artifact.cross_validation.r2 > 0.5, "cv r2 {}", run.artifact.cross_validation.r2);
    }

    #[test]
    fn missing_input_is_a_usage_error() {
        let config = FitConfig::default();
        let err = run_fit(&config).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn fold_count_above_sample_count_is_insufficient_data() {
        let config = FitConfig {
            synthetic: true,
            sample_count: 4,
            folds: 10,
            ..FitConfig::default()
        };
        let err = run_fit(&config).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
