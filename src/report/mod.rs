//! Reporting utilities: residuals and rankings.

pub mod format;

pub use format::{format_predict_summary, format_run_summary, format_worst};

use nalgebra::DVector;

use crate::domain::{Dataset, SampleResidual};
use crate::error::AppError;

/// Pair every sample with its calibration and out-of-fold predictions.
///
/// `y_fit` comes from applying the final model to its own training rows,
/// `y_cv` from the cross-validation pass at the chosen component count. The
/// ranking residual is the out-of-fold one.
pub fn compute_residuals(
    dataset: &Dataset,
    y_fit: &DVector<f64>,
    y_cv: &DVector<f64>,
) -> Result<Vec<SampleResidual>, AppError> {
    let n = dataset.n_samples();
    if y_fit.len() != n || y_cv.len() != n {
        return Err(AppError::new(4, "Prediction length mismatch in residual computation."));
    }

    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        if !(y_fit[i].is_finite() && y_cv[i].is_finite()) {
            return Err(AppError::new(4, "Non-finite model prediction during residual computation."));
        }
        out.push(SampleResidual {
            index: i,
            id: dataset.ids[i].clone(),
            y_obs: dataset.y[i],
            y_fit: y_fit[i],
            y_cv: y_cv[i],
            residual: y_cv[i] - dataset.y[i],
        });
    }
    Ok(out)
}

/// Rank the worst-predicted samples by absolute out-of-fold residual.
/// Ties resolve toward the earlier sample so the output is stable.
pub fn rank_worst(residuals: &[SampleResidual], top_n: usize) -> Vec<SampleResidual> {
    let mut sorted = residuals.to_vec();
    sorted.sort_by(|a, b| {
        b.residual
            .abs()
            .partial_cmp(&a.residual.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.index.cmp(&b.index))
    });
    sorted.truncate(top_n);
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{DMatrix, DVector};
    use std::collections::BTreeMap;

    fn tiny_dataset(y: Vec<f64>) -> Dataset {
        let n = y.len();
        Dataset {
            ids: (0..n).map(|i| format!("S-{:03}", i + 1)).collect(),
            meta: vec![BTreeMap::new(); n],
            meta_columns: Vec::new(),
            wavelengths: vec![400.0, 402.0],
            x: DMatrix::zeros(n, 2),
            y: DVector::from_vec(y),
        }
    }

    #[test]
    fn residuals_use_the_out_of_fold_prediction() {
        let data = tiny_dataset(vec![1.0, 2.0]);
        let y_fit = DVector::from_vec(vec![1.1, 1.9]);
        let y_cv = DVector::from_vec(vec![1.5, 2.5]);

        let residuals = compute_residuals(&data, &y_fit, &y_cv).unwrap();
        assert_eq!(residuals.len(), 2);
        assert_eq!(residuals[0].id, "S-001");
        assert!((residuals[0].residual - 0.5).abs() < 1e-12);
        assert!((residuals[1].y_fit - 1.9).abs() < 1e-12);
    }

    #[test]
    fn non_finite_predictions_are_internal_errors() {
        let data = tiny_dataset(vec![1.0]);
        let y_fit = DVector::from_vec(vec![f64::NAN]);
        let y_cv = DVector::from_vec(vec![1.0]);
        let err = compute_residuals(&data, &y_fit, &y_cv).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn length_mismatch_is_an_internal_error() {
        let data = tiny_dataset(vec![1.0, 2.0]);
        let short = DVector::from_vec(vec![1.0]);
        let err = compute_residuals(&data, &short, &short).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn rank_worst_orders_by_absolute_residual() {
        let data = tiny_dataset(vec![1.0, 2.0, 3.0]);
        let y_fit = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        let y_cv = DVector::from_vec(vec![1.1, 4.0, 2.5]);
        let residuals = compute_residuals(&data, &y_fit, &y_cv).unwrap();

        let worst = rank_worst(&residuals, 2);
        assert_eq!(worst.len(), 2);
        assert_eq!(worst[0].id, "S-002");
        assert_eq!(worst[1].id, "S-003");
    }

    #[test]
    fn rank_worst_breaks_ties_by_sample_order() {
        let data = tiny_dataset(vec![1.0, 2.0]);
        let y_fit = DVector::from_vec(vec![1.0, 2.0]);
        let y_cv = DVector::from_vec(vec![1.5, 2.5]);
        let residuals = compute_residuals(&data, &y_fit, &y_cv).unwrap();

        let worst = rank_worst(&residuals, 2);
        assert_eq!(worst[0].id, "S-001");
        assert_eq!(worst[1].id, "S-002");
    }
}
