//! Deterministic k-fold cross-validation.
//!
//! Folds are contiguous index ranges by default, so two runs over the same
//! CSV always agree; pass a seed with shuffling enabled to randomize the
//! assignment reproducibly. When the sample count does not divide evenly,
//! the remainder is spread over the leading folds.
//!
//! `cross_val_predict` produces out-of-fold predictions: each sample is
//! predicted by a model that never saw it. Mean-centering happens inside
//! each training fold (it is part of the PLS fit), so no information leaks
//! from the held-out rows. Spectral preprocessing is applied before the
//! split because it is strictly sample-local.

use nalgebra::{DMatrix, DVector};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::error::AppError;
use crate::models::pls;

/// Assign `n_samples` indices to `folds` test sets.
pub fn k_fold(
    n_samples: usize,
    folds: usize,
    shuffle: bool,
    seed: u64,
) -> Result<Vec<Vec<usize>>, AppError> {
    if folds < 2 {
        return Err(AppError::new(
            2,
            format!("cross-validation needs at least 2 folds (got {folds})"),
        ));
    }
    if n_samples < folds {
        return Err(AppError::new(
            3,
            format!("{n_samples} samples is too few for {folds}-fold cross-validation"),
        ));
    }

    let mut indices: Vec<usize> = (0..n_samples).collect();
    if shuffle {
        let mut rng = StdRng::seed_from_u64(seed);
        indices.shuffle(&mut rng);
    }

    let base = n_samples / folds;
    let remainder = n_samples % folds;
    let mut out = Vec::with_capacity(folds);
    let mut start = 0;
    for i in 0..folds {
        let size = if i < remainder { base + 1 } else { base };
        out.push(indices[start..start + size].to_vec());
        start += size;
    }
    Ok(out)
}

/// Out-of-fold predictions for a PLS model with `n_components`, aligned with
/// the original sample order.
pub fn cross_val_predict(
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    n_components: usize,
    folds: &[Vec<usize>],
) -> Result<DVector<f64>, AppError> {
    let n = x.nrows();
    let p = x.ncols();
    let mut out = DVector::zeros(n);
    let mut in_test = vec![false; n];

    for test in folds {
        for &i in test {
            in_test[i] = true;
        }
        let train: Vec<usize> = (0..n).filter(|i| !in_test[*i]).collect();

        let mut x_train = DMatrix::zeros(train.len(), p);
        let mut y_train = DVector::zeros(train.len());
        for (r, &i) in train.iter().enumerate() {
            for c in 0..p {
                x_train[(r, c)] = x[(i, c)];
            }
            y_train[r] = y[i];
        }

        let fit = pls::fit(&x_train, &y_train, n_components)?;
        let mut row = vec![0.0; p];
        for &i in test {
            for c in 0..p {
                row[c] = x[(i, c)];
            }
            out[i] = pls::predict_row(&fit.model, &row);
        }

        for &i in test {
            in_test[i] = false;
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contiguous_folds_cover_every_index_once() {
        let folds = k_fold(10, 3, false, 0).unwrap();
        assert_eq!(folds.len(), 3);
        // Remainder goes to the leading fold.
        assert_eq!(folds[0], vec![0, 1, 2, 3]);
        assert_eq!(folds[1], vec![4, 5, 6]);
        assert_eq!(folds[2], vec![7, 8, 9]);

        let mut seen: Vec<usize> = folds.into_iter().flatten().collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn shuffled_folds_are_seed_deterministic() {
        let a = k_fold(23, 4, true, 99).unwrap();
        let b = k_fold(23, 4, true, 99).unwrap();
        assert_eq!(a, b);

        let c = k_fold(23, 4, true, 100).unwrap();
        assert_ne!(a, c);

        let mut seen: Vec<usize> = a.into_iter().flatten().collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..23).collect::<Vec<_>>());
    }

    #[test]
    fn too_few_samples_or_folds_is_an_error() {
        assert_eq!(k_fold(10, 1, false, 0).unwrap_err().exit_code(), 2);
        assert_eq!(k_fold(3, 4, false, 0).unwrap_err().exit_code(), 3);
    }

    #[test]
    fn out_of_fold_predictions_recover_linear_data() {
        // y is an exact linear function of a rank-2 spectrum, so every
        // held-out sample is predicted almost exactly.
        let n = 15;
        let p = 6;
        let mut x = DMatrix::zeros(n, p);
        let mut y = DVector::zeros(n);
        for i in 0..n {
            let t1 = (i as f64 * 0.6).sin();
            let t2 = i as f64 * 0.25 - 2.0;
            for j in 0..p {
                x[(i, j)] = t1 * (j as f64 + 1.0) + t2 * ((j as f64) * 0.5).cos();
            }
            y[i] = 1.0 + 3.0 * t1 - 2.0 * t2;
        }

        let folds = k_fold(n, 5, false, 0).unwrap();
        let y_cv = cross_val_predict(&x, &y, 2, &folds).unwrap();
        for i in 0..n {
            assert!(
                (y_cv[i] - y[i]).abs() < 1e-6,
                "sample {i}: {} vs {}",
                y_cv[i],
                y[i]
            );
        }
    }
}
