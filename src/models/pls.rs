//! PLS1 fitting via NIPALS.
//!
//! For a single response, NIPALS extracts components sequentially. With `X`
//! and `y` mean-centered, component `a` is:
//!
//! ```text
//! w_a = Xᵀy / ‖Xᵀy‖          (weights)
//! t_a = X w_a                 (scores)
//! p_a = Xᵀt_a / (t_aᵀt_a)    (X loadings)
//! q_a = yᵀt_a / (t_aᵀt_a)    (y loading)
//! X ← X − t_a p_aᵀ,  y ← y − q_a t_a
//! ```
//!
//! The regression vector in the original (centered) space is
//! `b = W (PᵀW)⁻¹ q`; centering is folded into the intercept
//! `y̅ − x̅ᵀb` so prediction needs no stored means.
//!
//! Extraction stops early when the remaining covariance or score norm falls
//! to machine noise; the effective component count is reported rather than
//! padded. Requesting more components than the spectra's effective rank is
//! therefore safe.

use nalgebra::{DMatrix, DVector};

use crate::domain::PlsModel;
use crate::error::AppError;
use crate::math::ols::solve_least_squares;

/// Norm threshold below which remaining structure is treated as exhausted.
const TINY: f64 = f64::EPSILON;

/// A fitted PLS1 regression plus fit diagnostics.
#[derive(Debug, Clone)]
pub struct PlsFit {
    pub model: PlsModel,
    /// Component count asked for (the model records what was extracted).
    pub requested: usize,
    /// Fraction of centered-target variance captured by each component.
    pub explained_y: Vec<f64>,
}

/// Fit a PLS1 model with up to `n_components` latent components.
///
/// `x` holds one (preprocessed) spectrum per row; `y` the matching reference
/// values.
pub fn fit(x: &DMatrix<f64>, y: &DVector<f64>, n_components: usize) -> Result<PlsFit, AppError> {
    let n = x.nrows();
    let p = x.ncols();
    if n != y.len() {
        return Err(AppError::new(
            4,
            format!("spectra/target row mismatch ({n} vs {})", y.len()),
        ));
    }
    if n_components == 0 {
        return Err(AppError::new(2, "component count must be at least 1"));
    }
    if n < 2 {
        return Err(AppError::new(
            3,
            format!("need at least 2 samples to fit (got {n})"),
        ));
    }

    let x_mean = column_means(x);
    let y_mean = y.iter().sum::<f64>() / n as f64;

    let mut xw = x.clone();
    for r in 0..n {
        for c in 0..p {
            xw[(r, c)] -= x_mean[c];
        }
    }
    let mut yw = y.map(|v| v - y_mean);

    let ss_y: f64 = yw.iter().map(|v| v * v).sum();
    if ss_y <= TINY {
        return Err(AppError::new(3, "target has zero variance"));
    }

    let mut w_mat = DMatrix::zeros(p, n_components);
    let mut p_mat = DMatrix::zeros(p, n_components);
    let mut q_vec = DVector::zeros(n_components);
    let mut explained_y = Vec::with_capacity(n_components);
    let mut effective = 0;

    for a in 0..n_components {
        let mut w = xw.transpose() * &yw;
        let w_norm = w.norm();
        if w_norm <= TINY {
            break;
        }
        w /= w_norm;

        let t = &xw * &w;
        let t_dot = t.dot(&t);
        if t_dot <= TINY {
            break;
        }

        let p_load = (xw.transpose() * &t) / t_dot;
        let q_load = yw.dot(&t) / t_dot;

        xw -= &t * p_load.transpose();
        yw -= &t * q_load;

        w_mat.set_column(a, &w);
        p_mat.set_column(a, &p_load);
        q_vec[a] = q_load;
        explained_y.push(q_load * q_load * t_dot / ss_y);
        effective = a + 1;
    }

    if effective == 0 {
        return Err(AppError::new(
            3,
            "spectra carry no covariance with the target",
        ));
    }

    let w_eff = w_mat.columns(0, effective).into_owned();
    let p_eff = p_mat.columns(0, effective).into_owned();
    let q_eff = q_vec.rows(0, effective).into_owned();

    // b = W (PᵀW)⁻¹ q, solved rather than inverted.
    let ptw = p_eff.transpose() * &w_eff;
    let z = solve_least_squares(&ptw, &q_eff)
        .ok_or_else(|| AppError::new(4, "PLS loading system is unsolvable"))?;
    let b = &w_eff * z;

    let intercept = y_mean - x_mean.dot(&b);
    if !intercept.is_finite() || b.iter().any(|v| !v.is_finite()) {
        return Err(AppError::new(4, "PLS produced non-finite coefficients"));
    }

    Ok(PlsFit {
        model: PlsModel {
            n_components: effective,
            coefficients: b.iter().copied().collect(),
            intercept,
        },
        requested: n_components,
        explained_y,
    })
}

/// Predict one preprocessed spectrum. The caller guarantees the band count
/// matches the model.
pub fn predict_row(model: &PlsModel, row: &[f64]) -> f64 {
    debug_assert_eq!(row.len(), model.coefficients.len());
    let mut acc = model.intercept;
    for (xj, bj) in row.iter().zip(model.coefficients.iter()) {
        acc += xj * bj;
    }
    acc
}

/// Predict every row of a preprocessed spectra matrix.
pub fn predict(model: &PlsModel, x: &DMatrix<f64>) -> DVector<f64> {
    debug_assert_eq!(x.ncols(), model.coefficients.len());
    let mut out = DVector::zeros(x.nrows());
    for r in 0..x.nrows() {
        let mut acc = model.intercept;
        for (c, bj) in model.coefficients.iter().enumerate() {
            acc += x[(r, c)] * bj;
        }
        out[r] = acc;
    }
    out
}

fn column_means(x: &DMatrix<f64>) -> DVector<f64> {
    let n = x.nrows().max(1);
    let mut means = DVector::zeros(x.ncols());
    for c in 0..x.ncols() {
        let mut s = 0.0;
        for r in 0..x.nrows() {
            s += x[(r, c)];
        }
        means[c] = s / n as f64;
    }
    means
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Rank-2 data: X built from two latent factors, y a combination of the
    /// same factors (plus an offset).
    fn two_factor_data() -> (DMatrix<f64>, DVector<f64>) {
        let n = 12;
        let p = 8;
        let a1: Vec<f64> = (0..p).map(|j| 1.0 + 0.3 * j as f64).collect();
        let a2: Vec<f64> = (0..p).map(|j| (j as f64 * 0.9).sin()).collect();
        let mut x = DMatrix::zeros(n, p);
        let mut y = DVector::zeros(n);
        for i in 0..n {
            let t1 = (i as f64 * 0.7).cos() * 2.0;
            let t2 = 0.5 * i as f64 - 3.0;
            for j in 0..p {
                x[(i, j)] = t1 * a1[j] + t2 * a2[j];
            }
            y[i] = 5.0 + 2.0 * t1 - 1.5 * t2;
        }
        (x, y)
    }

    #[test]
    fn recovers_noiseless_linear_relation() {
        let (x, y) = two_factor_data();
        let fit = fit(&x, &y, 2).unwrap();
        let pred = predict(&fit.model, &x);
        for i in 0..y.len() {
            assert!(
                (pred[i] - y[i]).abs() < 1e-8,
                "sample {i}: {} vs {}",
                pred[i],
                y[i]
            );
        }
    }

    #[test]
    fn stops_at_effective_rank() {
        let (x, y) = two_factor_data();
        let fit = fit(&x, &y, 6).unwrap();
        assert_eq!(fit.requested, 6);
        assert_eq!(fit.model.n_components, 2);
        let pred = predict(&fit.model, &x);
        for i in 0..y.len() {
            assert!((pred[i] - y[i]).abs() < 1e-6);
        }
    }

    #[test]
    fn rank_one_data_needs_one_component() {
        let n = 9;
        let p = 5;
        let mut x = DMatrix::zeros(n, p);
        let mut y = DVector::zeros(n);
        for i in 0..n {
            let t = i as f64 - 4.0;
            for j in 0..p {
                x[(i, j)] = t * (1.0 + j as f64);
            }
            y[i] = 3.0 * t + 1.0;
        }
        let fit = fit(&x, &y, 1).unwrap();
        let pred = predict(&fit.model, &x);
        for i in 0..n {
            assert!((pred[i] - y[i]).abs() < 1e-9);
        }
        assert!((fit.explained_y[0] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn constant_shift_moves_intercept_only() {
        let (x, y) = two_factor_data();
        let base = fit(&x, &y, 2).unwrap();
        let shifted_y = y.map(|v| v + 10.0);
        let shifted = fit(&x, &shifted_y, 2).unwrap();
        for (a, b) in base
            .model
            .coefficients
            .iter()
            .zip(shifted.model.coefficients.iter())
        {
            assert!((a - b).abs() < 1e-9);
        }
        assert!((shifted.model.intercept - base.model.intercept - 10.0).abs() < 1e-9);
    }

    #[test]
    fn degenerate_inputs_are_rejected() {
        let (x, y) = two_factor_data();

        let flat_y = DVector::from_element(x.nrows(), 2.5);
        assert_eq!(fit(&x, &flat_y, 2).unwrap_err().exit_code(), 3);

        let flat_x = DMatrix::from_element(x.nrows(), 4, 0.7);
        assert_eq!(fit(&flat_x, &y, 2).unwrap_err().exit_code(), 3);

        assert_eq!(fit(&x, &y, 0).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn explained_variance_sums_below_one() {
        let (x, y) = two_factor_data();
        let fit = fit(&x, &y, 2).unwrap();
        let total: f64 = fit.explained_y.iter().sum();
        assert!(total > 0.99 && total <= 1.0 + 1e-9, "total {total}");
    }
}
