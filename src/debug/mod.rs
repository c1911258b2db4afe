//! Debug bundle writer for inspecting a calibration run offline.

use std::fs::{File, create_dir_all};
use std::io::Write;
use std::path::PathBuf;

use chrono::Local;

use crate::app::pipeline::RunOutput;
use crate::domain::FitConfig;
use crate::error::AppError;

/// How many regression coefficients to list, ranked by magnitude.
const TOP_COEFFICIENTS: usize = 15;

pub fn write_debug_bundle(run: &RunOutput, config: &FitConfig) -> Result<PathBuf, AppError> {
    let dir = PathBuf::from("debug");
    create_dir_all(&dir).map_err(|e| AppError::new(4, format!("Failed to create debug dir: {e}")))?;

    let ts = Local::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("soc_debug_seed{}_{}.md", config.seed, ts));

    let mut file = File::create(&path)
        .map_err(|e| AppError::new(4, format!("Failed to create debug file: {e}")))?;

    let stats = run.ingest.dataset.stats();

    writeln!(file, "# soc debug bundle")
        .map_err(|e| AppError::new(4, format!("Failed to write debug header: {e}")))?;
    writeln!(file, "- generated: {}", Local::now().to_rfc3339())
        .map_err(|e| AppError::new(4, format!("Failed to write debug header: {e}")))?;
    writeln!(file, "- source: {}", describe_source(config))
        .map_err(|e| AppError::new(4, format!("Failed to write debug header: {e}")))?;
    writeln!(file, "- target: {}", run.ingest.target_column)
        .map_err(|e| AppError::new(4, format!("Failed to write debug header: {e}")))?;
    writeln!(file, "- preprocess: {}", config.preprocess.label())
        .map_err(|e| AppError::new(4, format!("Failed to write debug header: {e}")))?;
    writeln!(
        file,
        "- cv: {} folds, {}",
        config.folds,
        if config.cv_shuffle {
            format!("shuffled (seed {})", config.seed)
        } else {
            "contiguous".to_string()
        }
    )
    .map_err(|e| AppError::new(4, format!("Failed to write debug header: {e}")))?;
    writeln!(
        file,
        "- candidates: 1..={}{}",
        run.outcome.cap,
        if run.outcome.capped {
            format!(" (capped from {})", config.max_components)
        } else {
            String::new()
        }
    )
    .map_err(|e| AppError::new(4, format!("Failed to write debug header: {e}")))?;
    writeln!(file, "- parsimony_tol: {}", config.parsimony_tol)
        .map_err(|e| AppError::new(4, format!("Failed to write debug header: {e}")))?;

    writeln!(file, "\n## Dataset")
        .map_err(|e| AppError::new(4, format!("Failed to write debug: {e}")))?;
    writeln!(file, "| stat | value |")
        .map_err(|e| AppError::new(4, format!("Failed to write debug: {e}")))?;
    writeln!(file, "| - | - |")
        .map_err(|e| AppError::new(4, format!("Failed to write debug: {e}")))?;
    writeln!(
        file,
        "| samples | {} used ({} read, {} rejected) |",
        run.ingest.rows_used,
        run.ingest.rows_read,
        run.ingest.row_errors.len()
    )
    .map_err(|e| AppError::new(4, format!("Failed to write debug: {e}")))?;
    writeln!(file, "| bands | {} |", stats.n_bands)
        .map_err(|e| AppError::new(4, format!("Failed to write debug: {e}")))?;
    writeln!(
        file,
        "| wavelength | {:.1}..{:.1} nm, step {:.2} nm |",
        stats.wl_min, stats.wl_max, stats.wl_step
    )
    .map_err(|e| AppError::new(4, format!("Failed to write debug: {e}")))?;
    writeln!(file, "| {} min/max | {:.3} / {:.3} |", run.ingest.target_column, stats.y_min, stats.y_max)
        .map_err(|e| AppError::new(4, format!("Failed to write debug: {e}")))?;
    writeln!(file, "| {} mean/sd | {:.3} / {:.3} |", run.ingest.target_column, stats.y_mean, stats.y_sd)
        .map_err(|e| AppError::new(4, format!("Failed to write debug: {e}")))?;

    if !run.ingest.row_errors.is_empty() {
        writeln!(file, "\n### Rejected rows")
            .map_err(|e| AppError::new(4, format!("Failed to write debug: {e}")))?;
        for err in &run.ingest.row_errors {
            let id = err.id.as_deref().unwrap_or("?");
            writeln!(file, "- line {} (id={}): {}", err.line, id, err.message)
                .map_err(|e| AppError::new(4, format!("Failed to write debug: {e}")))?;
        }
    }

    writeln!(file, "\n## Component search")
        .map_err(|e| AppError::new(4, format!("Failed to write debug: {e}")))?;
    writeln!(file, "| k | rmsecv | r2cv | |")
        .map_err(|e| AppError::new(4, format!("Failed to write debug: {e}")))?;
    writeln!(file, "| - | - | - | - |")
        .map_err(|e| AppError::new(4, format!("Failed to write debug: {e}")))?;
    for score in &run.outcome.scores {
        let mark = if score.components == run.outcome.chosen.components {
            "chosen"
        } else {
            ""
        };
        writeln!(
            file,
            "| {} | {:.6} | {:.4} | {} |",
            score.components, score.rmse, score.r2, mark
        )
        .map_err(|e| AppError::new(4, format!("Failed to write debug: {e}")))?;
    }
    for skipped in &run.outcome.skipped {
        writeln!(file, "- skipped k={}: {}", skipped.components, skipped.reason)
            .map_err(|e| AppError::new(4, format!("Failed to write debug: {e}")))?;
    }

    writeln!(file, "\n## Chosen model")
        .map_err(|e| AppError::new(4, format!("Failed to write debug: {e}")))?;
    writeln!(file, "- components: {}", run.artifact.model.n_components)
        .map_err(|e| AppError::new(4, format!("Failed to write debug: {e}")))?;
    writeln!(file, "- intercept: {:.6}", run.artifact.model.intercept)
        .map_err(|e| AppError::new(4, format!("Failed to write debug: {e}")))?;
    writeln!(file, "- explained y-variance: {}", fmt_explained(&run.explained_y))
        .map_err(|e| AppError::new(4, format!("Failed to write debug: {e}")))?;
    writeln!(file, "| set | r2 | mse | rmse | rpd | bias | n |")
        .map_err(|e| AppError::new(4, format!("Failed to write debug: {e}")))?;
    writeln!(file, "| - | - | - | - | - | - | - |")
        .map_err(|e| AppError::new(4, format!("Failed to write debug: {e}")))?;
    write_quality_row(&mut file, "calibration", &run.artifact.calibration)?;
    write_quality_row(&mut file, "cross-validation", &run.artifact.cross_validation)?;

    writeln!(file, "\n### Strongest coefficients")
        .map_err(|e| AppError::new(4, format!("Failed to write debug: {e}")))?;
    writeln!(file, "| wavelength_nm | coefficient |")
        .map_err(|e| AppError::new(4, format!("Failed to write debug: {e}")))?;
    writeln!(file, "| - | - |")
        .map_err(|e| AppError::new(4, format!("Failed to write debug: {e}")))?;
    for (wl, b) in top_coefficients(&run.artifact.wavelength_nm, &run.artifact.model.coefficients) {
        writeln!(file, "| {:.1} | {:+.6e} |", wl, b)
            .map_err(|e| AppError::new(4, format!("Failed to write debug: {e}")))?;
    }

    writeln!(file, "\n## Worst predicted (out-of-fold)")
        .map_err(|e| AppError::new(4, format!("Failed to write debug: {e}")))?;
    writeln!(file, "| id | y_obs | y_fit | y_cv | residual |")
        .map_err(|e| AppError::new(4, format!("Failed to write debug: {e}")))?;
    writeln!(file, "| - | - | - | - | - |")
        .map_err(|e| AppError::new(4, format!("Failed to write debug: {e}")))?;
    for r in &run.worst {
        writeln!(
            file,
            "| {} | {:.4} | {:.4} | {:.4} | {:+.4} |",
            r.id, r.y_obs, r.y_fit, r.y_cv, r.residual
        )
        .map_err(|e| AppError::new(4, format!("Failed to write debug: {e}")))?;
    }

    Ok(path)
}

fn describe_source(config: &FitConfig) -> String {
    if config.synthetic {
        return format!("synthetic (n={}, seed={})", config.sample_count, config.seed);
    }
    match &config.csv_path {
        Some(path) => path.display().to_string(),
        None => "-".to_string(),
    }
}

/// Per-component variance shares as `48.2% + 21.9% + 7.1% (total 77.2%)`.
fn fmt_explained(fractions: &[f64]) -> String {
    if fractions.is_empty() {
        return "-".to_string();
    }
    let parts: Vec<String> = fractions.iter().map(|f| format!("{:.1}%", f * 100.0)).collect();
    let total: f64 = fractions.iter().sum();
    format!("{} (total {:.1}%)", parts.join(" + "), total * 100.0)
}

fn write_quality_row(
    file: &mut File,
    label: &str,
    q: &crate::domain::FitQuality,
) -> Result<(), AppError> {
    writeln!(
        file,
        "| {} | {:.4} | {:.6} | {:.6} | {:.3} | {:+.4} | {} |",
        label, q.r2, q.mse, q.rmse, q.rpd, q.bias, q.n
    )
    .map_err(|e| AppError::new(4, format!("Failed to write debug: {e}")))
}

/// Coefficient/wavelength pairs ranked by coefficient magnitude.
fn top_coefficients(wavelengths: &[f64], coefficients: &[f64]) -> Vec<(f64, f64)> {
    let mut pairs: Vec<(f64, f64)> = wavelengths
        .iter()
        .copied()
        .zip(coefficients.iter().copied())
        .collect();
    pairs.sort_by(|a, b| {
        b.1.abs()
            .partial_cmp(&a.1.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    pairs.truncate(TOP_COEFFICIENTS);
    pairs
}
