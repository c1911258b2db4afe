//! Descriptive statistics and regression metrics.
//!
//! All metrics take observed and predicted slices of equal length. R² is the
//! coefficient of determination against the mean of the observations; RPD
//! (residual prediction deviation) is sd(observed) / RMSE, the conventional
//! chemometrics screen for calibration usefulness.

use crate::domain::FitQuality;

pub fn mean(v: &[f64]) -> f64 {
    if v.is_empty() {
        return 0.0;
    }
    v.iter().sum::<f64>() / v.len() as f64
}

/// Sample standard deviation (n − 1 denominator); 0.0 for fewer than 2 values.
pub fn sample_std(v: &[f64]) -> f64 {
    if v.len() < 2 {
        return 0.0;
    }
    let m = mean(v);
    let ss: f64 = v.iter().map(|x| (x - m) * (x - m)).sum();
    (ss / (v.len() - 1) as f64).sqrt()
}

pub fn mse(observed: &[f64], predicted: &[f64]) -> f64 {
    debug_assert_eq!(observed.len(), predicted.len());
    if observed.is_empty() {
        return 0.0;
    }
    let ss: f64 = observed
        .iter()
        .zip(predicted.iter())
        .map(|(o, p)| (o - p) * (o - p))
        .sum();
    ss / observed.len() as f64
}

pub fn rmse(observed: &[f64], predicted: &[f64]) -> f64 {
    mse(observed, predicted).sqrt()
}

/// Coefficient of determination. Returns 0.0 when the observations carry no
/// variance (the ratio is undefined; callers reject such targets upstream).
pub fn r2(observed: &[f64], predicted: &[f64]) -> f64 {
    debug_assert_eq!(observed.len(), predicted.len());
    let m = mean(observed);
    let ss_res: f64 = observed
        .iter()
        .zip(predicted.iter())
        .map(|(o, p)| (o - p) * (o - p))
        .sum();
    let ss_tot: f64 = observed.iter().map(|o| (o - m) * (o - m)).sum();
    if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else {
        0.0
    }
}

/// Mean of (predicted − observed).
pub fn bias(observed: &[f64], predicted: &[f64]) -> f64 {
    debug_assert_eq!(observed.len(), predicted.len());
    if observed.is_empty() {
        return 0.0;
    }
    let s: f64 = observed
        .iter()
        .zip(predicted.iter())
        .map(|(o, p)| p - o)
        .sum();
    s / observed.len() as f64
}

/// Residual prediction deviation: sd(observed) / RMSE. Infinite for a perfect
/// fit on varying observations.
pub fn rpd(observed: &[f64], predicted: &[f64]) -> f64 {
    let sd = sample_std(observed);
    let e = rmse(observed, predicted);
    if e > 0.0 { sd / e } else { f64::INFINITY }
}

/// Bundle the full metric set for a prediction vector.
pub fn quality(observed: &[f64], predicted: &[f64]) -> FitQuality {
    FitQuality {
        r2: r2(observed, predicted),
        mse: mse(observed, predicted),
        rmse: rmse(observed, predicted),
        rpd: rpd(observed, predicted),
        bias: bias(observed, predicted),
        n: observed.len(),
    }
}

/// A fixed-width histogram over `[lo, hi]`.
#[derive(Debug, Clone)]
pub struct Histogram {
    pub lo: f64,
    pub hi: f64,
    pub counts: Vec<usize>,
}

/// Bin `values` into `bins` equal-width buckets spanning the observed range.
/// A degenerate range is widened so every value lands in a bucket.
pub fn histogram(values: &[f64], bins: usize) -> Histogram {
    let bins = bins.max(1);
    let (mut lo, mut hi) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if values.is_empty() {
        lo = 0.0;
        hi = 1.0;
    }
    if hi <= lo {
        hi = lo + 1.0;
    }
    let width = (hi - lo) / bins as f64;
    let mut counts = vec![0usize; bins];
    for &v in values {
        let idx = (((v - lo) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }
    Histogram { lo, hi, counts }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_and_std_of_known_values() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((mean(&v) - 5.0).abs() < 1e-12);
        // Sample variance of these values is 32/7.
        assert!((sample_std(&v) - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn perfect_prediction_metrics() {
        let obs = [1.0, 2.0, 3.0, 4.0];
        let q = quality(&obs, &obs);
        assert!((q.r2 - 1.0).abs() < 1e-12);
        assert_eq!(q.mse, 0.0);
        assert_eq!(q.rmse, 0.0);
        assert!(q.rpd.is_infinite());
        assert_eq!(q.bias, 0.0);
        assert_eq!(q.n, 4);
    }

    #[test]
    fn mean_prediction_gives_zero_r2() {
        let obs = [1.0, 2.0, 3.0, 4.0];
        let pred = [2.5; 4];
        assert!(r2(&obs, &pred).abs() < 1e-12);
        // RMSE equals the population sd here, so RPD is sqrt(n/(n-1)).
        let expected = (4.0f64 / 3.0).sqrt();
        assert!((rpd(&obs, &pred) - expected).abs() < 1e-12);
    }

    #[test]
    fn bias_is_signed() {
        let obs = [1.0, 2.0, 3.0];
        let pred = [1.5, 2.5, 3.5];
        assert!((bias(&obs, &pred) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn histogram_counts_cover_all_values() {
        let v = [0.0, 0.1, 0.5, 0.9, 1.0];
        let h = histogram(&v, 4);
        assert_eq!(h.counts.iter().sum::<usize>(), v.len());
        // The maximum lands in the last bucket, not past it.
        assert_eq!(*h.counts.last().unwrap(), 2);
    }

    #[test]
    fn histogram_degenerate_range_widens() {
        let v = [3.0, 3.0, 3.0];
        let h = histogram(&v, 5);
        assert_eq!(h.counts.iter().sum::<usize>(), 3);
        assert!(h.hi > h.lo);
    }
}
