//! Export per-sample results and demo datasets to CSV.
//!
//! The exports are meant to be easy to consume in spreadsheets or downstream
//! scripts, so the layout mirrors the input: one row per sample, metadata
//! columns echoed verbatim.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::domain::{Dataset, SampleResidual};
use crate::error::AppError;

/// Write per-sample predictions to a CSV file.
///
/// Columns: id, the dataset's metadata columns, the observed target, the
/// calibration prediction, the out-of-fold prediction, and the out-of-fold
/// residual.
pub fn write_predictions_csv(
    path: &Path,
    residuals: &[SampleResidual],
    dataset: &Dataset,
    target: &str,
) -> Result<(), AppError> {
    let mut file = File::create(path).map_err(|e| {
        AppError::new(
            2,
            format!("Failed to create export CSV '{}': {e}", path.display()),
        )
    })?;

    let mut header = String::from("id");
    for col in &dataset.meta_columns {
        header.push(',');
        header.push_str(col);
    }
    header.push_str(&format!(",{target},{target}_fit,{target}_cv,residual"));
    writeln!(file, "{header}")
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV header: {e}")))?;

    for r in residuals {
        let mut line = r.id.clone();
        let meta = &dataset.meta[r.index];
        for col in &dataset.meta_columns {
            line.push(',');
            line.push_str(meta.get(col).map(String::as_str).unwrap_or(""));
        }
        line.push_str(&format!(
            ",{:.4},{:.4},{:.4},{:.4}",
            r.y_obs, r.y_fit, r.y_cv, r.residual
        ));
        writeln!(file, "{line}")
            .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
    }

    Ok(())
}

/// Write predict-mode output: one prediction per row, plus the observed
/// value and residual when the input carried the target column.
pub fn write_predict_csv(
    path: &Path,
    dataset: &Dataset,
    target: &str,
    predictions: &[f64],
    has_observed: bool,
) -> Result<(), AppError> {
    let mut file = File::create(path).map_err(|e| {
        AppError::new(
            2,
            format!("Failed to create export CSV '{}': {e}", path.display()),
        )
    })?;

    let mut header = String::from("id");
    for col in &dataset.meta_columns {
        header.push(',');
        header.push_str(col);
    }
    header.push_str(&format!(",{target}_pred"));
    if has_observed {
        header.push_str(&format!(",{target},residual"));
    }
    writeln!(file, "{header}")
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV header: {e}")))?;

    for i in 0..dataset.n_samples() {
        let mut line = dataset.ids[i].clone();
        let meta = &dataset.meta[i];
        for col in &dataset.meta_columns {
            line.push(',');
            line.push_str(meta.get(col).map(String::as_str).unwrap_or(""));
        }
        line.push_str(&format!(",{:.4}", predictions[i]));
        if has_observed {
            line.push_str(&format!(
                ",{:.4},{:.4}",
                dataset.y[i],
                predictions[i] - dataset.y[i]
            ));
        }
        writeln!(file, "{line}")
            .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
    }

    Ok(())
}

/// Write a dataset back out as a wide spectral CSV (used by `soc sample`).
///
/// The produced file round-trips through ingest: numeric wavelength headers,
/// an `id` column, metadata columns, and the target column.
pub fn write_sample_csv(path: &Path, dataset: &Dataset, target: &str) -> Result<(), AppError> {
    let mut file = File::create(path).map_err(|e| {
        AppError::new(
            2,
            format!("Failed to create sample CSV '{}': {e}", path.display()),
        )
    })?;

    let mut header = String::from("id");
    for col in &dataset.meta_columns {
        header.push(',');
        header.push_str(col);
    }
    header.push(',');
    header.push_str(target);
    for wl in &dataset.wavelengths {
        header.push(',');
        header.push_str(&fmt_wavelength(*wl));
    }
    writeln!(file, "{header}")
        .map_err(|e| AppError::new(2, format!("Failed to write sample CSV header: {e}")))?;

    for i in 0..dataset.n_samples() {
        let mut line = dataset.ids[i].clone();
        let meta = &dataset.meta[i];
        for col in &dataset.meta_columns {
            line.push(',');
            line.push_str(meta.get(col).map(String::as_str).unwrap_or(""));
        }
        line.push_str(&format!(",{:.4}", dataset.y[i]));
        for c in 0..dataset.n_bands() {
            line.push_str(&format!(",{:.6}", dataset.x[(i, c)]));
        }
        writeln!(file, "{line}")
            .map_err(|e| AppError::new(2, format!("Failed to write sample CSV row: {e}")))?;
    }

    Ok(())
}

fn fmt_wavelength(wl: f64) -> String {
    if (wl - wl.round()).abs() < 1e-9 {
        format!("{wl:.0}")
    } else {
        format!("{wl}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wavelength_headers_drop_trailing_zeros() {
        assert_eq!(fmt_wavelength(400.0), "400");
        assert_eq!(fmt_wavelength(1500.5), "1500.5");
    }
}
