//! Savitzky–Golay filtering for uniformly sampled spectra.
//!
//! The filter slides a window of `window` bands across a spectrum, fits a
//! polynomial of degree `polyorder` to the window by least squares, and
//! evaluates its `derivative`-th derivative at the window center. Because the
//! grid is uniform, the fit collapses to a fixed convolution: the weights
//! depend only on the window geometry, not on the data, so they are derived
//! once and reused for every row.
//!
//! Weight derivation: with offsets `s = -h..=h` and the design matrix
//! `J[s][c] = s^c`, the weight vector for a given evaluation functional `f`
//! (derivative order and evaluation offset) is the minimum-norm solution of
//! `Jᵀ w = f`, which the SVD solver returns directly.
//!
//! Edge handling: the first and last `h` bands cannot center a window, so they
//! reuse the first/last window's polynomial evaluated at the off-center
//! offsets. Output length therefore always equals input length, and a
//! polynomial of degree ≤ `polyorder` is reproduced exactly everywhere,
//! edges included.
//!
//! Derivatives are returned per physical wavelength unit: weights are scaled
//! by `1 / step^derivative`.

use nalgebra::{DMatrix, DVector};

use crate::domain::PreprocessSpec;
use crate::error::AppError;
use crate::math::ols::solve_least_squares;

/// Precomputed Savitzky–Golay convolution weights for one grid geometry.
#[derive(Debug, Clone)]
pub struct SavgolFilter {
    window: usize,
    half: usize,
    /// `weights[k]` evaluates the window polynomial at offset `k - half` from
    /// the window center; index `half` is the sliding interior stencil, the
    /// others serve the edges.
    weights: Vec<Vec<f64>>,
}

impl SavgolFilter {
    /// Derive weights for `spec` on a uniform grid of `n_bands` points spaced
    /// `step` apart (nm).
    pub fn new(spec: &PreprocessSpec, step: f64, n_bands: usize) -> Result<Self, AppError> {
        spec.validate(n_bands)
            .map_err(|msg| AppError::new(2, msg))?;
        if spec.derivative > 0 && !(step.is_finite() && step > 0.0) {
            return Err(AppError::new(
                2,
                format!("wavelength step must be positive for derivatives (got {step})"),
            ));
        }

        let window = spec.window;
        let half = window / 2;
        let n_coef = spec.polyorder + 1;

        // Adjoint of the window design matrix: j_t[c][r] = s_r^c, s_r = r - h.
        let mut j_t = DMatrix::zeros(n_coef, window);
        for r in 0..window {
            let s = r as f64 - half as f64;
            for c in 0..n_coef {
                j_t[(c, r)] = int_pow(s, c);
            }
        }

        let scale = if spec.derivative > 0 {
            step.powi(spec.derivative as i32)
        } else {
            1.0
        };

        let mut weights = Vec::with_capacity(window);
        for k in 0..window {
            let t = k as f64 - half as f64;
            let mut f = DVector::zeros(n_coef);
            for c in spec.derivative..n_coef {
                f[c] = falling_factorial(c, spec.derivative) * int_pow(t, c - spec.derivative);
            }
            let w = solve_least_squares(&j_t, &f).ok_or_else(|| {
                AppError::new(
                    4,
                    format!(
                        "failed to derive Savitzky–Golay weights for {}",
                        spec.label()
                    ),
                )
            })?;
            weights.push(w.iter().map(|v| v / scale).collect());
        }

        Ok(Self {
            window,
            half,
            weights,
        })
    }

    /// Filter one spectrum. The caller guarantees `row.len() >= window`
    /// (enforced at construction against the dataset's band count).
    pub fn apply(&self, row: &[f64]) -> Vec<f64> {
        let n = row.len();
        let m = self.window;
        let h = self.half;
        let mut out = vec![0.0; n];

        for i in 0..n {
            let (start, k) = if i < h {
                // Leading edge: first window's polynomial at offset i - h.
                (0, i)
            } else if i + h >= n {
                // Trailing edge: last window's polynomial at offset past center.
                (n - m, i + h + 1 - n + h)
            } else {
                (i - h, h)
            };
            let w = &self.weights[k];
            let mut acc = 0.0;
            for (j, wj) in w.iter().enumerate() {
                acc += wj * row[start + j];
            }
            out[i] = acc;
        }

        out
    }

    /// Filter every row of a spectra matrix.
    pub fn apply_matrix(&self, x: &DMatrix<f64>) -> DMatrix<f64> {
        let mut out = DMatrix::zeros(x.nrows(), x.ncols());
        let mut buf = vec![0.0; x.ncols()];
        for r in 0..x.nrows() {
            for c in 0..x.ncols() {
                buf[c] = x[(r, c)];
            }
            let filtered = self.apply(&buf);
            for c in 0..x.ncols() {
                out[(r, c)] = filtered[c];
            }
        }
        out
    }
}

/// `x^e` with the convention `x^0 = 1` (including `x = 0`).
fn int_pow(x: f64, e: usize) -> f64 {
    if e == 0 { 1.0 } else { x.powi(e as i32) }
}

/// `c! / (c - d)!` as a float (product of the `d` leading factors; 1 when `d = 0`).
fn falling_factorial(c: usize, d: usize) -> f64 {
    ((c - d + 1)..=c).product::<usize>() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(window: usize, polyorder: usize, derivative: usize) -> PreprocessSpec {
        PreprocessSpec {
            window,
            polyorder,
            derivative,
        }
    }

    fn quadratic(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| {
                let s = i as f64;
                3.0 + 0.5 * s + 0.25 * s * s
            })
            .collect()
    }

    #[test]
    fn smoothing_reproduces_quadratic_exactly() {
        let y = quadratic(25);
        let filter = SavgolFilter::new(&spec(7, 2, 0), 2.0, 25).unwrap();
        let out = filter.apply(&y);
        for (i, (a, b)) in y.iter().zip(out.iter()).enumerate() {
            assert!((a - b).abs() < 1e-9, "band {i}: {a} vs {b}");
        }
    }

    #[test]
    fn second_derivative_of_quadratic_is_constant() {
        // y(i) = 3 + 0.5 i + 0.25 i^2 on a grid with step 2.0 nm has
        // d²y/dλ² = 2 * 0.25 / 2² = 0.125 everywhere, edges included.
        let y = quadratic(31);
        let filter = SavgolFilter::new(&spec(9, 2, 2), 2.0, 31).unwrap();
        let out = filter.apply(&y);
        for (i, v) in out.iter().enumerate() {
            assert!((v - 0.125).abs() < 1e-9, "band {i}: {v}");
        }
    }

    #[test]
    fn first_derivative_of_quadratic_matches_analytic() {
        let y = quadratic(31);
        let filter = SavgolFilter::new(&spec(9, 2, 1), 2.0, 31).unwrap();
        let out = filter.apply(&y);
        for (i, v) in out.iter().enumerate() {
            let expected = (0.5 + 0.5 * i as f64) / 2.0;
            assert!((v - expected).abs() < 1e-9, "band {i}: {v} vs {expected}");
        }
    }

    #[test]
    fn smoothing_preserves_constants_and_derivative_annihilates_them() {
        let y = vec![4.2; 40];
        let smooth = SavgolFilter::new(&spec(11, 3, 0), 2.0, 40).unwrap();
        for v in smooth.apply(&y) {
            assert!((v - 4.2).abs() < 1e-9);
        }
        let deriv = SavgolFilter::new(&spec(11, 3, 1), 2.0, 40).unwrap();
        for v in deriv.apply(&y) {
            assert!(v.abs() < 1e-9);
        }
    }

    #[test]
    fn unit_window_is_identity() {
        let y = vec![0.3, 0.9, -1.2, 7.7];
        let filter = SavgolFilter::new(&spec(1, 0, 0), 2.0, 4).unwrap();
        assert_eq!(filter.apply(&y), y);
    }

    #[test]
    fn invalid_specs_are_usage_errors() {
        for bad in [
            spec(8, 2, 2),  // even window
            spec(3, 3, 0),  // window <= polyorder
            spec(7, 2, 3),  // derivative > polyorder
            spec(51, 2, 2), // window > band count
        ] {
            let err = SavgolFilter::new(&bad, 2.0, 40).unwrap_err();
            assert_eq!(err.exit_code(), 2, "{bad:?} should be rejected");
        }
    }
}
