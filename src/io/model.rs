//! Read/write model JSON files.
//!
//! Model JSON is the portable representation of a calibration:
//! - preprocessing settings and the wavelength grid the model expects
//! - the regression coefficients + intercept
//! - calibration and cross-validation quality, plus the full CV curve
//!
//! The schema is defined by `domain::ModelFile`. `soc predict` and
//! `soc plot` consume these files.

use std::fs::File;
use std::path::Path;

use crate::domain::ModelFile;
use crate::error::AppError;

/// Write a model JSON file. Refuses to persist non-finite values.
pub fn write_model_json(path: &Path, model: &ModelFile) -> Result<(), AppError> {
    ensure_finite(model)?;
    let file = File::create(path).map_err(|e| {
        AppError::new(
            2,
            format!("Failed to create model JSON '{}': {e}", path.display()),
        )
    })?;
    serde_json::to_writer_pretty(file, model)
        .map_err(|e| AppError::new(2, format!("Failed to write model JSON: {e}")))?;
    Ok(())
}

/// Read a model JSON file.
pub fn read_model_json(path: &Path) -> Result<ModelFile, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::new(
            2,
            format!("Failed to open model JSON '{}': {e}", path.display()),
        )
    })?;
    let model: ModelFile = serde_json::from_reader(file)
        .map_err(|e| AppError::new(2, format!("Invalid model JSON: {e}")))?;
    Ok(model)
}

/// Check that an ingested wavelength grid matches what a saved model expects.
pub fn check_grid_match(expected: &[f64], found: &[f64]) -> Result<(), AppError> {
    if expected.len() != found.len() {
        return Err(AppError::new(
            2,
            format!(
                "Model expects {} spectral bands but the input provides {}.",
                expected.len(),
                found.len()
            ),
        ));
    }
    for (i, (e, f)) in expected.iter().zip(found.iter()).enumerate() {
        if (e - f).abs() > 1e-6 {
            return Err(AppError::new(
                2,
                format!("Wavelength grid mismatch at band {i}: model {e} nm vs input {f} nm."),
            ));
        }
    }
    Ok(())
}

fn ensure_finite(model: &ModelFile) -> Result<(), AppError> {
    let quality_values = |q: &crate::domain::FitQuality| [q.r2, q.mse, q.rmse, q.rpd, q.bias];

    let mut all = Vec::new();
    all.push(model.model.intercept);
    all.extend(model.model.coefficients.iter().copied());
    all.extend(model.wavelength_nm.iter().copied());
    all.extend(quality_values(&model.calibration));
    all.extend(quality_values(&model.cross_validation));
    for s in &model.cv_curve {
        all.push(s.rmse);
        all.push(s.r2);
    }

    if all.iter().any(|v| !v.is_finite()) {
        return Err(AppError::new(
            4,
            "Model contains non-finite values; refusing to export.",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ComponentScore, FitQuality, PlsModel, PreprocessSpec};
    use chrono::NaiveDate;

    fn sample_model() -> ModelFile {
        let quality = FitQuality {
            r2: 0.91,
            mse: 0.04,
            rmse: 0.2,
            rpd: 2.4,
            bias: -0.01,
            n: 120,
        };
        ModelFile {
            tool: "soc".to_string(),
            created: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            target: "soc".to_string(),
            preprocess: PreprocessSpec::default(),
            wavelength_nm: vec![400.0, 402.0, 404.0],
            model: PlsModel {
                n_components: 2,
                coefficients: vec![0.1, -0.2, 0.3],
                intercept: 1.5,
            },
            calibration: quality.clone(),
            cross_validation: quality,
            cv_curve: vec![ComponentScore {
                components: 1,
                rmse: 0.3,
                r2: 0.8,
            }],
        }
    }

    #[test]
    fn model_json_round_trips() {
        let model = sample_model();
        let text = serde_json::to_string(&model).unwrap();
        let back: ModelFile = serde_json::from_str(&text).unwrap();
        assert_eq!(back.model.coefficients, model.model.coefficients);
        assert_eq!(back.wavelength_nm, model.wavelength_nm);
        assert_eq!(back.preprocess, model.preprocess);
        assert_eq!(back.created, model.created);
    }

    #[test]
    fn non_finite_models_are_refused() {
        let mut model = sample_model();
        model.cross_validation.rpd = f64::INFINITY;
        assert_eq!(ensure_finite(&model).unwrap_err().exit_code(), 4);
    }

    #[test]
    fn grid_mismatches_are_usage_errors() {
        assert!(check_grid_match(&[400.0, 402.0], &[400.0, 402.0]).is_ok());
        assert_eq!(
            check_grid_match(&[400.0, 402.0], &[400.0])
                .unwrap_err()
                .exit_code(),
            2
        );
        assert_eq!(
            check_grid_match(&[400.0, 402.0], &[400.0, 403.0])
                .unwrap_err()
                .exit_code(),
            2
        );
    }
}
