//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized (important for future snapshot tests)

use crate::domain::{FitConfig, FitQuality, ModelFile, SampleResidual};
use crate::fit::SearchOutcome;
use crate::io::ingest::IngestedData;

/// How many row-level ingest errors to echo in the summary before eliding.
const MAX_ROW_ERRORS_SHOWN: usize = 5;

/// Format the full run summary (dataset stats + search diagnostics + chosen model).
pub fn format_run_summary(
    ingest: &IngestedData,
    artifact: &ModelFile,
    outcome: &SearchOutcome,
    config: &FitConfig,
) -> String {
    let stats = ingest.dataset.stats();
    let mut out = String::new();

    out.push_str("=== soc - PLS regression on VNIR soil spectra ===\n");
    out.push_str(&format!("Source: {}\n", describe_source(config)));
    out.push_str(&format!("Target: {} (% by mass)\n", ingest.target_column));
    out.push_str(&format!(
        "Rows: {} read, {} used, {} rejected\n",
        ingest.rows_read,
        ingest.rows_used,
        ingest.row_errors.len()
    ));
    for e in ingest.row_errors.iter().take(MAX_ROW_ERRORS_SHOWN) {
        match &e.id {
            Some(id) => out.push_str(&format!("  (line {}, id={}) {}\n", e.line, id, e.message)),
            None => out.push_str(&format!("  (line {}) {}\n", e.line, e.message)),
        }
    }
    if ingest.row_errors.len() > MAX_ROW_ERRORS_SHOWN {
        out.push_str(&format!(
            "  ... and {} more\n",
            ingest.row_errors.len() - MAX_ROW_ERRORS_SHOWN
        ));
    }

    out.push_str(&format!(
        "Bands: n={} | wl=[{}, {}] nm | step={} nm\n",
        stats.n_bands,
        fmt_nm(stats.wl_min),
        fmt_nm(stats.wl_max),
        fmt_nm(stats.wl_step)
    ));
    out.push_str(&format!(
        "{}: [{:.2}, {:.2}] | mean={:.2} | sd={:.2}\n",
        ingest.target_column, stats.y_min, stats.y_max, stats.y_mean, stats.y_sd
    ));
    out.push_str(&format!("Preprocess: {}\n", config.preprocess.label()));

    let folds = if config.cv_shuffle {
        format!("{} folds, shuffled (seed {})", config.folds, config.seed)
    } else {
        format!("{} folds, contiguous", config.folds)
    };
    let cap_note = if outcome.capped {
        format!(" (capped from {})", config.max_components)
    } else {
        String::new()
    };
    out.push_str(&format!("CV: {folds} | candidates 1..={}{}\n", outcome.cap, cap_note));

    out.push_str("\nComponent search (RMSECV):\n");
    out.push_str(&format!("  {:<1} {:>3}  {:>8}  {:>7}\n", " ", "k", "RMSECV", "R2"));
    for s in &outcome.scores {
        let mark = if s.components == outcome.chosen.components { "*" } else { " " };
        out.push_str(&format!(
            "  {mark} {:>3}  {:>8.4}  {:>7.3}\n",
            s.components, s.rmse, s.r2
        ));
    }
    for s in &outcome.skipped {
        out.push_str(&format!("  (skipped k={}: {})\n", s.components, s.reason));
    }

    let tol_note = if config.parsimony_tol > 0.0 {
        format!(" | parsimony tol {:.1}%", config.parsimony_tol * 100.0)
    } else {
        String::new()
    };
    out.push_str(&format!(
        "\nChosen: {} components (RMSECV={:.4}){tol_note}\n",
        outcome.chosen.components, outcome.chosen.rmse
    ));
    out.push_str(&format!("Calibration      {}\n", fmt_quality(&artifact.calibration)));
    out.push_str(&format!("Cross-validation {}\n", fmt_quality(&artifact.cross_validation)));

    out
}

/// Format the worst-predicted table.
pub fn format_worst(worst: &[SampleResidual]) -> String {
    let mut out = String::new();
    out.push_str("Worst predicted (out-of-fold):\n");
    if worst.is_empty() {
        out.push_str("  (none)\n");
        return out;
    }

    out.push_str(
        format!(
            "{:<16} {:>8} {:>8} {:>8} {:>9}\n",
            "id", "y_obs", "y_cv", "y_fit", "residual"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!("{:-<16} {:-<8} {:-<8} {:-<8} {:-<9}\n", "", "", "", "", "").trim_end(),
    );
    out.push('\n');

    for r in worst {
        out.push_str(
            format!(
                "{:<16} {:>8.4} {:>8.4} {:>8.4} {:>+9.4}\n",
                truncate(&r.id, 16),
                r.y_obs,
                r.y_cv,
                r.y_fit,
                r.residual
            )
            .trim_end(),
        );
        out.push('\n');
    }

    out
}

/// Format the predict-mode summary.
pub fn format_predict_summary(
    artifact: &ModelFile,
    n_rows: usize,
    quality: Option<&FitQuality>,
) -> String {
    let mut out = String::new();
    out.push_str("=== soc - predict (saved model) ===\n");
    out.push_str(&format!(
        "Model: {} components | {} bands | wl=[{}, {}] nm | target {}\n",
        artifact.model.n_components,
        artifact.wavelength_nm.len(),
        fmt_nm(*artifact.wavelength_nm.first().unwrap_or(&0.0)),
        fmt_nm(*artifact.wavelength_nm.last().unwrap_or(&0.0)),
        artifact.target
    ));
    out.push_str(&format!("Preprocess: {}\n", artifact.preprocess.label()));
    out.push_str(&format!("Rows: {n_rows} predicted\n"));
    match quality {
        Some(q) => {
            out.push_str(&format!("Observed {}: {}\n", artifact.target, fmt_quality(q)));
        }
        None => {
            out.push_str(&format!(
                "Observed {} column not present; metrics skipped.\n",
                artifact.target
            ));
        }
    }
    out
}

fn describe_source(config: &FitConfig) -> String {
    if config.synthetic {
        return format!("synthetic (n={}, seed={})", config.sample_count, config.seed);
    }
    match &config.csv_path {
        Some(p) => p.display().to_string(),
        None => "-".to_string(),
    }
}

fn fmt_quality(q: &FitQuality) -> String {
    format!(
        "R2={:.3} | MSE={:.4} | RMSE={:.4} | RPD={:.2} | bias={:+.4} | n={}",
        q.r2, q.mse, q.rmse, q.rpd, q.bias, q.n
    )
}

/// Wavelengths are usually whole nanometers; drop the fraction when exact.
fn fmt_nm(v: f64) -> String {
    if (v - v.round()).abs() < 1e-9 {
        format!("{v:.0}")
    } else {
        format!("{v:.1}")
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}
