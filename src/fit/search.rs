//! Component-count search with cross-validated scoring.
//!
//! Every candidate count in `1..=cap` gets a full out-of-fold prediction
//! pass; candidates are independent, so they are evaluated in parallel. The
//! collected scores stay in candidate order, and selection breaks ties toward
//! fewer components, so the outcome is deterministic regardless of thread
//! scheduling.
//!
//! The cap keeps every training fold comfortably overdetermined: candidates
//! above `min_train − MIN_N_BUFFER` (or above the band count) are not
//! attempted, and the report surfaces the cap when it bites.

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

use crate::domain::{ComponentScore, SkippedCandidate};
use crate::error::AppError;
use crate::fit::cv::cross_val_predict;
use crate::math::stats;

/// Minimum number of extra training samples beyond the component count.
const MIN_N_BUFFER: usize = 5;

/// Output of the component search.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// One score per evaluated candidate, ascending component count.
    pub scores: Vec<ComponentScore>,
    /// Candidates that produced no usable fit, with reasons (diagnostics).
    pub skipped: Vec<SkippedCandidate>,
    pub chosen: ComponentScore,
    /// Out-of-fold predictions at the chosen count, in sample order.
    pub y_cv: DVector<f64>,
    /// Largest candidate actually evaluated.
    pub cap: usize,
    /// Whether the requested maximum was reduced by the cap.
    pub capped: bool,
}

/// Score candidate component counts by cross-validated RMSE and select one.
pub fn search_components(
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    max_components: usize,
    folds: &[Vec<usize>],
    parsimony_tol: f64,
) -> Result<SearchOutcome, AppError> {
    if max_components == 0 {
        return Err(AppError::new(2, "maximum component count must be at least 1"));
    }
    if !(parsimony_tol.is_finite() && parsimony_tol >= 0.0) {
        return Err(AppError::new(
            2,
            format!("parsimony tolerance must be non-negative (got {parsimony_tol})"),
        ));
    }

    let n = x.nrows();
    let largest_test = folds.iter().map(Vec::len).max().unwrap_or(0);
    let min_train = n.saturating_sub(largest_test);
    let cap = max_components
        .min(min_train.saturating_sub(MIN_N_BUFFER))
        .min(x.ncols());
    if cap == 0 {
        return Err(AppError::new(
            3,
            format!(
                "too few samples for a cross-validated search \
                 (smallest training fold {min_train} must exceed components by {MIN_N_BUFFER})"
            ),
        ));
    }
    let capped = cap < max_components;

    let candidates: Vec<usize> = (1..=cap).collect();
    let evaluated: Vec<(usize, Result<DVector<f64>, AppError>)> = candidates
        .par_iter()
        .map(|&k| (k, cross_val_predict(x, y, k, folds)))
        .collect();

    let mut scores = Vec::new();
    let mut skipped = Vec::new();
    let mut predictions = Vec::new();
    for (k, res) in evaluated {
        match res {
            Ok(y_cv) => {
                let rmse = stats::rmse(y.as_slice(), y_cv.as_slice());
                let r2 = stats::r2(y.as_slice(), y_cv.as_slice());
                if !rmse.is_finite() {
                    skipped.push(SkippedCandidate {
                        components: k,
                        reason: "non-finite cross-validation error".to_string(),
                    });
                    continue;
                }
                scores.push(ComponentScore {
                    components: k,
                    rmse,
                    r2,
                });
                predictions.push(y_cv);
            }
            Err(e) => skipped.push(SkippedCandidate {
                components: k,
                reason: e.to_string(),
            }),
        }
    }

    if scores.is_empty() {
        let first = skipped
            .first()
            .map(|s| s.reason.clone())
            .unwrap_or_else(|| "no candidates evaluated".to_string());
        return Err(AppError::new(
            3,
            format!("no component count produced a valid cross-validated fit ({first})"),
        ));
    }

    // scores and predictions are index-aligned.
    let chosen_idx = select_component(&scores, parsimony_tol)
        .ok_or_else(|| AppError::new(4, "component selection failed on a non-empty score set"))?;
    let chosen = scores[chosen_idx].clone();
    let y_cv = predictions.swap_remove(chosen_idx);

    Ok(SearchOutcome {
        scores,
        skipped,
        chosen,
        y_cv,
        cap,
        capped,
    })
}

/// Index of the selected score: the smallest component count whose RMSE is
/// within `(1 + tol)` of the best. `tol = 0` reduces to the first minimum,
/// so ties always resolve toward the simpler model.
pub fn select_component(scores: &[ComponentScore], tol: f64) -> Option<usize> {
    if scores.is_empty() {
        return None;
    }
    let mut best = 0;
    for (i, s) in scores.iter().enumerate().skip(1) {
        if s.rmse < scores[best].rmse {
            best = i;
        }
    }
    let limit = scores[best].rmse * (1.0 + tol.max(0.0));
    scores.iter().position(|s| s.rmse <= limit).or(Some(best))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::cv::k_fold;

    /// Noiseless data driven by three latent factors; the third carries real
    /// signal, so fewer than three components underfits.
    fn three_factor_data(n: usize, p: usize) -> (DMatrix<f64>, DVector<f64>) {
        let mut x = DMatrix::zeros(n, p);
        let mut y = DVector::zeros(n);
        for i in 0..n {
            let t1 = (i as f64 * 0.37).sin() * 3.0;
            let t2 = (i as f64 * 0.11).cos() * 2.0;
            let t3 = ((i * i) % 7) as f64 - 3.0;
            for j in 0..p {
                let a1 = 1.0 + 0.2 * j as f64;
                let a2 = ((j as f64) * 0.8).sin();
                let a3 = if j % 3 == 0 { 1.0 } else { -0.5 };
                x[(i, j)] = t1 * a1 + t2 * a2 + t3 * a3;
            }
            y[i] = 2.0 + 1.5 * t1 - 2.5 * t2 + 3.0 * t3;
        }
        (x, y)
    }

    #[test]
    fn search_settles_on_the_effective_rank() {
        let (x, y) = three_factor_data(30, 10);
        let folds = k_fold(30, 5, false, 0).unwrap();
        let outcome = search_components(&x, &y, 8, &folds, 0.0).unwrap();

        assert_eq!(outcome.chosen.components, 3);
        assert!(outcome.chosen.rmse < 1e-6, "rmse {}", outcome.chosen.rmse);
        assert!(outcome.chosen.r2 > 0.999999);
        assert!(!outcome.capped);
        // Underfitted candidates score visibly worse.
        assert!(outcome.scores[0].rmse > outcome.chosen.rmse + 0.1);
        assert!(outcome.scores[1].rmse > outcome.chosen.rmse + 0.1);
    }

    #[test]
    fn cap_keeps_training_folds_overdetermined() {
        let (x, y) = three_factor_data(12, 10);
        let folds = k_fold(12, 4, false, 0).unwrap();
        let outcome = search_components(&x, &y, 10, &folds, 0.0).unwrap();

        // Training folds hold 9 samples, so candidates stop at 9 - 5 = 4.
        assert_eq!(outcome.cap, 4);
        assert!(outcome.capped);
        assert!(outcome.scores.len() <= 4);
    }

    #[test]
    fn degenerate_target_fails_with_data_error() {
        let (x, _) = three_factor_data(20, 6);
        let y = DVector::from_element(20, 1.0);
        let folds = k_fold(20, 4, false, 0).unwrap();
        let err = search_components(&x, &y, 5, &folds, 0.0).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn parsimony_tolerance_prefers_smaller_counts() {
        let scores = vec![
            ComponentScore {
                components: 1,
                rmse: 1.0,
                r2: 0.2,
            },
            ComponentScore {
                components: 2,
                rmse: 0.52,
                r2: 0.8,
            },
            ComponentScore {
                components: 3,
                rmse: 0.50,
                r2: 0.82,
            },
            ComponentScore {
                components: 4,
                rmse: 0.505,
                r2: 0.81,
            },
        ];

        // Pure argmin picks 3; a 5% tolerance trades back to 2.
        assert_eq!(select_component(&scores, 0.0), Some(2));
        assert_eq!(select_component(&scores, 0.05), Some(1));
    }
}
