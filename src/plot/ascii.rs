//! ASCII/Unicode plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - data points: `o`
//! - lines (CV curve, identity, spectra): `-` and friends
//! - worst-predicted highlights: `*`
//! - histogram bars: `#`

use std::collections::HashSet;

use nalgebra::DMatrix;

use crate::domain::{ComponentScore, SampleResidual};
use crate::math::histogram;

/// Characters cycled through when several spectra share one plot.
const SERIES_CHARS: [char; 6] = ['-', '=', '~', '^', '+', '"'];

/// Render the target distribution as a bar chart.
pub fn render_target_histogram(values: &[f64], label: &str, width: usize, height: usize) -> String {
    let width = width.max(10);
    let height = height.max(4);

    let bins = (width / 3).max(4);
    let hist = histogram(values, bins);
    let max_count = hist.counts.iter().copied().max().unwrap_or(0).max(1);

    let cols_per_bin = (width / bins).max(1);
    let mut grid = vec![vec![' '; width]; height];

    for (b, &count) in hist.counts.iter().enumerate() {
        if count == 0 {
            continue;
        }
        let bar = ((count as f64 / max_count as f64) * height as f64)
            .round()
            .max(1.0) as usize;
        let bar = bar.min(height);
        let start = b * cols_per_bin;
        // Leave the last column of each bin blank as a separator.
        let fill = cols_per_bin.saturating_sub(1).max(1);
        for row in (height - bar)..height {
            for col in start..(start + fill).min(width) {
                grid[row][col] = '#';
            }
        }
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Histogram: {label}=[{:.2}, {:.2}] | n={}\n",
        hist.lo,
        hist.hi,
        values.len()
    ));
    push_grid(&mut out, grid);
    out
}

/// Overlay the first `max_rows` spectra as polylines, one character per series.
pub fn render_spectra_plot(
    x: &DMatrix<f64>,
    wavelengths: &[f64],
    max_rows: usize,
    width: usize,
    height: usize,
) -> String {
    let width = width.max(10);
    let height = height.max(5);
    let shown = x.nrows().min(max_rows.max(1));
    let n_bands = x.ncols();

    let (y_min, y_max) = matrix_range(x, shown).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];
    for row in 0..shown {
        if n_bands == 0 {
            break;
        }
        let ch = SERIES_CHARS[row % SERIES_CHARS.len()];
        let mut prev: Option<(usize, usize)> = None;
        for col in 0..width {
            let u = col as f64 / (width - 1) as f64;
            let band = (u * (n_bands - 1) as f64).round() as usize;
            let yy = map_y(x[(row, band)], y_min, y_max, height);
            if let Some((x0, y0)) = prev {
                draw_line(&mut grid, x0, y0, col, yy, ch);
            } else {
                grid[yy][col] = ch;
            }
            prev = Some((col, yy));
        }
    }

    let (wl_lo, wl_hi) = (
        wavelengths.first().copied().unwrap_or(0.0),
        wavelengths.last().copied().unwrap_or(0.0),
    );
    let mut out = String::new();
    out.push_str(&format!(
        "Spectra (first {shown}): wl=[{wl_lo:.0}, {wl_hi:.0}] nm | y=[{y_min:.4}, {y_max:.4}]\n"
    ));
    push_grid(&mut out, grid);
    out
}

/// RMSECV against candidate component count, chosen count starred.
pub fn render_cv_curve(scores: &[ComponentScore], chosen: usize, width: usize, height: usize) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let (k_min, k_max) = scores
        .iter()
        .fold((usize::MAX, 0), |(lo, hi), s| (lo.min(s.components), hi.max(s.components)));

    let rmse_range = scores
        .iter()
        .fold(None, |acc: Option<(f64, f64)>, s| match acc {
            Some((lo, hi)) => Some((lo.min(s.rmse), hi.max(s.rmse))),
            None => Some((s.rmse, s.rmse)),
        });
    let (y_min, y_max) = rmse_range.unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];
    let map_k = |k: usize| -> usize {
        if k_max == k_min {
            return 0;
        }
        let u = (k - k_min) as f64 / (k_max - k_min) as f64;
        (u * (width as f64 - 1.0)).round() as usize
    };

    // Connect scores with a line first, then overlay the markers.
    let mut prev: Option<(usize, usize)> = None;
    for s in scores {
        let x = map_k(s.components);
        let y = map_y(s.rmse, y_min, y_max, height);
        if let Some((x0, y0)) = prev {
            draw_line(&mut grid, x0, y0, x, y, '-');
        }
        prev = Some((x, y));
    }
    for s in scores {
        let x = map_k(s.components);
        let y = map_y(s.rmse, y_min, y_max, height);
        grid[y][x] = if s.components == chosen { '*' } else { 'o' };
    }

    let mut out = String::new();
    if scores.is_empty() {
        out.push_str("RMSECV vs components: (no scores)\n");
    } else {
        out.push_str(&format!(
            "RMSECV vs components: k=[{k_min}, {k_max}] | rmse=[{y_min:.4}, {y_max:.4}] | chosen k={chosen}\n"
        ));
    }
    push_grid(&mut out, grid);
    out
}

/// Out-of-fold predictions against observations, identity line dashed,
/// worst-predicted samples starred.
pub fn render_scatter_plot(
    residuals: &[SampleResidual],
    worst: &[SampleResidual],
    label: &str,
    width: usize,
    height: usize,
) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let range = residuals.iter().fold(None, |acc: Option<(f64, f64)>, r| {
        let lo = r.y_obs.min(r.y_cv);
        let hi = r.y_obs.max(r.y_cv);
        match acc {
            Some((a, b)) => Some((a.min(lo), b.max(hi))),
            None => Some((lo, hi)),
        }
    });
    let (v_min, v_max) = range.unwrap_or((0.0, 1.0));
    let (v_min, v_max) = pad_range(v_min, v_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    // Identity line corner to corner (shared axes make this exact).
    draw_line(&mut grid, 0, height - 1, width - 1, 0, '-');

    let worst_idx: HashSet<usize> = worst.iter().map(|r| r.index).collect();
    for r in residuals {
        let x = map_x(r.y_obs, v_min, v_max, width);
        let y = map_y(r.y_cv, v_min, v_max, height);
        grid[y][x] = if worst_idx.contains(&r.index) { '*' } else { 'o' };
    }

    let mut out = String::new();
    out.push_str(&format!(
        "CV predicted vs observed {label}: [{v_min:.2}, {v_max:.2}]\n"
    ));
    push_grid(&mut out, grid);
    out
}

/// Regression coefficient against wavelength, from a saved model.
pub fn render_coefficient_plot(
    coefficients: &[f64],
    wavelengths: &[f64],
    width: usize,
    height: usize,
) -> String {
    let width = width.max(10);
    let height = height.max(5);
    let n = coefficients.len();

    let range = coefficients.iter().fold(None, |acc: Option<(f64, f64)>, &b| match acc {
        Some((lo, hi)) => Some((lo.min(b), hi.max(b))),
        None => Some((b, b)),
    });
    let (y_min, y_max) = range.unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];
    if n > 0 {
        let mut prev: Option<(usize, usize)> = None;
        for col in 0..width {
            let u = col as f64 / (width - 1) as f64;
            let band = (u * (n - 1) as f64).round() as usize;
            let yy = map_y(coefficients[band], y_min, y_max, height);
            if let Some((x0, y0)) = prev {
                draw_line(&mut grid, x0, y0, col, yy, '-');
            } else {
                grid[yy][col] = '-';
            }
            prev = Some((col, yy));
        }
    }

    let (wl_lo, wl_hi) = (
        wavelengths.first().copied().unwrap_or(0.0),
        wavelengths.last().copied().unwrap_or(0.0),
    );
    let mut out = String::new();
    out.push_str(&format!(
        "Coefficients: wl=[{wl_lo:.0}, {wl_hi:.0}] nm | b=[{y_min:.3e}, {y_max:.3e}]\n"
    ));
    push_grid(&mut out, grid);
    out
}

fn push_grid(out: &mut String, grid: Vec<Vec<char>>) {
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }
}

fn matrix_range(x: &DMatrix<f64>, rows: usize) -> Option<(f64, f64)> {
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for row in 0..rows.min(x.nrows()) {
        for col in 0..x.ncols() {
            min_y = min_y.min(x[(row, col)]);
            max_y = max_y.max(x[(row, col)]);
        }
    }
    if min_y.is_finite() && max_y.is_finite() && max_y > min_y {
        Some((min_y, max_y))
    } else {
        None
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(v: f64, v_min: f64, v_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((v - v_min) / (v_max - v_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

/// Integer line drawing (Bresenham-ish). Writes only into blank cells so
/// points drawn later stay visible.
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn residual(index: usize, y_obs: f64, y_cv: f64) -> SampleResidual {
        SampleResidual {
            index,
            id: format!("S-{:03}", index + 1),
            y_obs,
            y_fit: y_cv,
            y_cv,
            residual: y_cv - y_obs,
        }
    }

    #[test]
    fn cv_curve_golden_snapshot_small() {
        let scores = vec![
            ComponentScore { components: 1, rmse: 1.0, r2: 0.0 },
            ComponentScore { components: 2, rmse: 0.5, r2: 0.5 },
            ComponentScore { components: 3, rmse: 0.25, r2: 0.8 },
        ];
        let txt = render_cv_curve(&scores, 2, 11, 5);
        let expected = concat!(
            "RMSECV vs components: k=[1, 3] | rmse=[0.2125, 1.0375] | chosen k=2\n",
            "o          \n",
            " --        \n",
            "   --      \n",
            "     *--   \n",
            "        --o\n",
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn scatter_golden_snapshot_small() {
        let residuals = vec![residual(0, 1.0, 1.0), residual(1, 3.0, 3.0)];
        let txt = render_scatter_plot(&residuals, &[], "soc", 5, 5);
        let expected = concat!(
            "CV predicted vs observed soc: [0.90, 3.10]\n",
            "    o\n",
            "   - \n",
            "  -  \n",
            " -   \n",
            "o    \n",
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn scatter_stars_the_worst_samples() {
        let residuals = vec![residual(0, 1.0, 1.0), residual(1, 3.0, 1.0)];
        let worst = vec![residuals[1].clone()];
        let txt = render_scatter_plot(&residuals, &worst, "soc", 5, 5);
        assert!(txt.contains('*'));
    }

    #[test]
    fn histogram_golden_snapshot_small() {
        let values = [0.0, 1.0, 1.0, 2.0];
        let txt = render_target_histogram(&values, "soc", 12, 4);
        let expected = concat!(
            "Histogram: soc=[0.00, 2.00] | n=4\n",
            "      ##    \n",
            "      ##    \n",
            "##    ## ## \n",
            "##    ## ## \n",
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn spectra_plot_has_fixed_dimensions() {
        let x = DMatrix::from_row_slice(2, 4, &[0.1, 0.2, 0.3, 0.4, 0.4, 0.3, 0.2, 0.1]);
        let wl = [400.0, 402.0, 404.0, 406.0];
        let txt = render_spectra_plot(&x, &wl, 6, 20, 6);
        let lines: Vec<&str> = txt.lines().collect();
        assert_eq!(lines.len(), 7);
        assert!(lines[0].starts_with("Spectra (first 2): wl=[400, 406] nm"));
        for line in &lines[1..] {
            assert_eq!(line.chars().count(), 20);
        }
        // Both series leave their mark.
        assert!(txt.contains('-') && txt.contains('='));
    }

    #[test]
    fn coefficient_plot_spans_the_grid() {
        let coefs = [0.0, 1.0, 0.0, -1.0, 0.0];
        let wl = [400.0, 402.0, 404.0, 406.0, 408.0];
        let txt = render_coefficient_plot(&coefs, &wl, 15, 5);
        let lines: Vec<&str> = txt.lines().collect();
        assert_eq!(lines.len(), 6);
        assert!(lines[0].starts_with("Coefficients: wl=[400, 408] nm"));
    }
}
