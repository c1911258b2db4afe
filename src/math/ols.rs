//! Least squares solver.
//!
//! In this project we repeatedly solve small linear systems:
//!
//! - deriving Savitzky–Golay convolution weights from a local polynomial
//!   design matrix (one tiny system per window offset)
//! - recovering the PLS regression vector from the `PᵀW` system after
//!   component extraction
//!
//! Implementation choices:
//! - We use SVD so the solve stays robust for tall, wide, and near-singular
//!   systems alike. For a wide system the SVD solution is the minimum-norm
//!   one, which is exactly what the Savitzky–Golay weight derivation needs.
//!   (Nalgebra's `QR::solve` is intended for square systems and will panic for
//!   non-square matrices.)
//! - The systems involved are tiny (a handful of rows/columns), so SVD
//!   performance is a non-issue.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    // SVD solve with a relaxed tolerance to handle near-singular matrices.
    // High polynomial orders over short windows, or PLS runs pushed past the
    // effective rank of the spectra, can produce nearly collinear columns,
    // so we use a tolerance that balances numerical stability with solution
    // acceptance.
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn wide_system_returns_minimum_norm_solution() {
        // One equation, two unknowns: w0 + w1 = 2. The minimum-norm solution
        // is w = [1, 1].
        let x = DMatrix::from_row_slice(1, 2, &[1.0, 1.0]);
        let y = DVector::from_row_slice(&[2.0]);

        let w = solve_least_squares(&x, &y).unwrap();
        assert!((w[0] - 1.0).abs() < 1e-10);
        assert!((w[1] - 1.0).abs() < 1e-10);
    }
}
