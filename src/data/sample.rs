//! Synthetic VNIR soil spectra with a known SOC signal.
//!
//! Each generated sample is a reflectance curve on the standard 400-2498 nm
//! grid built from a smooth soil continuum plus Gaussian absorption features:
//!
//! - organic bands (1420 / 1730 / 2200 / 2330 nm) whose depth scales with SOC
//! - water bands (1410 / 1930 nm) scaled by a per-sample moisture nuisance
//! - a broad visible iron band around 650 nm
//! - multiplicative and additive scatter, then white instrument noise
//!
//! SOC itself is drawn log-normal, so the target distribution is right-skewed
//! the way field datasets are. The same seed always reproduces the same
//! dataset, and the first `k` samples of a larger draw match a smaller one.

use std::collections::BTreeMap;

use nalgebra::{DMatrix, DVector};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{Dataset, FitConfig};
use crate::error::AppError;

/// First wavelength of the synthetic grid (nm).
const WL_START: f64 = 400.0;

/// Band spacing of the synthetic grid (nm).
const WL_STEP: f64 = 2.0;

/// Number of bands: 400, 402, ..., 2498 nm.
const N_BANDS: usize = 1050;

/// Log-normal parameters for SOC (% by mass). The median is
/// exp(0.3) ~ 1.35%, typical for temperate topsoil surveys.
const SOC_LN_MEAN: f64 = 0.3;
const SOC_LN_SD: f64 = 0.55;

/// SOC values are clamped to this range after the log-normal draw.
const SOC_MIN: f64 = 0.05;
const SOC_MAX: f64 = 8.0;

/// Exponential albedo decay per % SOC. Organic matter darkens the whole
/// curve, not just the absorption bands.
const ALBEDO_DECAY: f64 = 0.05;

/// Organic absorption features as (center nm, width nm, depth per % SOC).
/// Centers follow the usual O-H / C-H / N-H overtone assignments.
const ORGANIC_BANDS: [(f64, f64, f64); 4] = [
    (1420.0, 60.0, 0.012),
    (1730.0, 45.0, 0.006),
    (2200.0, 55.0, 0.014),
    (2330.0, 40.0, 0.008),
];

/// Water absorption features as (center nm, width nm, depth at moisture 1.0).
const WATER_BANDS: [(f64, f64, f64); 2] = [(1410.0, 55.0, 0.06), (1930.0, 75.0, 0.14)];

/// Broad iron-oxide feature in the visible range (center nm, width nm, depth).
const IRON_BAND: (f64, f64, f64) = (650.0, 130.0, 0.05);

/// Standard deviation of per-band instrument noise.
const NOISE_SD: f64 = 0.0015;

/// Reflectance is clamped to this physical range.
const REFLECTANCE_MIN: f64 = 0.02;
const REFLECTANCE_MAX: f64 = 0.95;

/// Generates a seeded synthetic dataset with `config.sample_count` spectra.
pub fn generate_sample(config: &FitConfig) -> Result<Dataset, AppError> {
    if config.sample_count == 0 {
        return Err(AppError::new(2, "Sample count must be > 0."));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))?;

    let wavelengths = wavelength_grid();
    let n = config.sample_count;

    let mut ids = Vec::with_capacity(n);
    let mut meta = Vec::with_capacity(n);
    let mut soc_values = Vec::with_capacity(n);
    let mut reflectance = Vec::with_capacity(n * N_BANDS);

    for i in 0..n {
        let soc = (SOC_LN_MEAN + SOC_LN_SD * normal.sample(&mut rng))
            .exp()
            .clamp(SOC_MIN, SOC_MAX);
        let moisture = (0.15 + 0.05 * normal.sample(&mut rng)).clamp(0.0, 0.4);
        let iron = rng.gen_range(0.5..=1.5);

        // Per-sample scatter: a gain on the continuum, a spectral tilt and a
        // flat offset. These mimic particle-size and sensor-geometry effects
        // that the Savitzky-Golay derivative is supposed to remove.
        let gain = 1.0 + 0.04 * normal.sample(&mut rng);
        let tilt = 0.02 * normal.sample(&mut rng);
        let offset = 0.01 * normal.sample(&mut rng);

        let albedo = (-ALBEDO_DECAY * soc).exp();

        for (b, &wl) in wavelengths.iter().enumerate() {
            let u = b as f64 / (N_BANDS - 1) as f64;
            let base = continuum(u) * albedo * gain + tilt * (u - 0.5) + offset;
            let dips = organic_absorption(wl, soc)
                + water_absorption(wl, moisture)
                + iron * iron_absorption(wl);
            let noise = NOISE_SD * normal.sample(&mut rng);
            reflectance.push((base - dips + noise).clamp(REFLECTANCE_MIN, REFLECTANCE_MAX));
        }

        ids.push(format!("S-{:03}", i + 1));
        meta.push(sample_meta(i));
        soc_values.push(soc);
    }

    Ok(Dataset {
        ids,
        meta,
        meta_columns: vec!["site".to_string(), "depth_cm".to_string()],
        wavelengths,
        x: DMatrix::from_row_slice(n, N_BANDS, &reflectance),
        y: DVector::from_vec(soc_values),
    })
}

/// The fixed 400-2498 nm grid at 2 nm spacing.
pub fn wavelength_grid() -> Vec<f64> {
    (0..N_BANDS).map(|b| WL_START + WL_STEP * b as f64).collect()
}

/// Smooth bare-soil continuum over normalized position `u` in [0, 1].
/// Rises through the visible range and flattens in the SWIR.
fn continuum(u: f64) -> f64 {
    0.28 + 0.30 * u - 0.12 * u * u
}

/// Unit-depth Gaussian dip centered at `center` with the given width (nm).
fn gaussian_dip(wl: f64, center: f64, width: f64) -> f64 {
    let z = (wl - center) / width;
    (-0.5 * z * z).exp()
}

/// Total organic absorption at `wl` for a sample with `soc` percent carbon.
fn organic_absorption(wl: f64, soc: f64) -> f64 {
    ORGANIC_BANDS
        .iter()
        .map(|&(center, width, depth)| depth * soc * gaussian_dip(wl, center, width))
        .sum()
}

/// Total water absorption at `wl` for the given moisture fraction.
fn water_absorption(wl: f64, moisture: f64) -> f64 {
    WATER_BANDS
        .iter()
        .map(|&(center, width, depth)| depth * moisture * gaussian_dip(wl, center, width))
        .sum()
}

/// Unit-scale iron-oxide absorption at `wl`.
fn iron_absorption(wl: f64) -> f64 {
    let (center, width, depth) = IRON_BAND;
    depth * gaussian_dip(wl, center, width)
}

/// Rotating site / depth metadata so exports and reports have realistic
/// non-spectral columns to carry.
fn sample_meta(i: usize) -> BTreeMap<String, String> {
    let site = ["A", "B", "C"][i % 3];
    let depth = ["0-10", "10-30"][(i / 3) % 2];
    BTreeMap::from([
        ("site".to_string(), site.to_string()),
        ("depth_cm".to_string(), depth.to_string()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FitConfig;

    fn config(count: usize, seed: u64) -> FitConfig {
        FitConfig {
            sample_count: count,
            seed,
            ..FitConfig::default()
        }
    }

    #[test]
    fn generation_is_deterministic() {
        let a = generate_sample(&config(12, 7)).unwrap();
        let b = generate_sample(&config(12, 7)).unwrap();
        assert_eq!(a.y, b.y);
        assert_eq!(a.x, b.x);
        assert_eq!(a.ids, b.ids);
    }

    #[test]
    fn seed_changes_the_draw() {
        let a = generate_sample(&config(12, 7)).unwrap();
        let b = generate_sample(&config(12, 8)).unwrap();
        assert_ne!(a.y, b.y);
    }

    #[test]
    fn grid_is_uniform_vnir() {
        let grid = wavelength_grid();
        assert_eq!(grid.len(), 1050);
        assert_eq!(grid[0], 400.0);
        assert_eq!(grid[1049], 2498.0);
        assert_eq!(grid[1] - grid[0], 2.0);
    }

    #[test]
    fn soc_values_stay_in_range() {
        let data = generate_sample(&config(200, 42)).unwrap();
        for &soc in data.y.iter() {
            assert!((SOC_MIN..=SOC_MAX).contains(&soc), "soc {soc} out of range");
        }
        // Log-normal with these parameters should put the bulk of the mass
        // between a few tenths and a few percent.
        let stats = data.stats();
        assert!(stats.y_mean > 0.8 && stats.y_mean < 2.8, "mean {}", stats.y_mean);
        assert!(stats.y_sd > 0.2, "sd {}", stats.y_sd);
    }

    #[test]
    fn reflectance_stays_physical() {
        let data = generate_sample(&config(50, 1)).unwrap();
        for &r in data.x.iter() {
            assert!(r.is_finite());
            assert!((REFLECTANCE_MIN..=REFLECTANCE_MAX).contains(&r), "r {r}");
        }
    }

    #[test]
    fn organic_bands_deepen_with_soc() {
        assert!(organic_absorption(2200.0, 4.0) > organic_absorption(2200.0, 0.5));
        // Away from every band center the organic signal vanishes.
        assert!(organic_absorption(900.0, 4.0) < 1e-4);
    }

    #[test]
    fn water_band_tracks_moisture() {
        assert!(water_absorption(1930.0, 0.3) > water_absorption(1930.0, 0.05));
        assert!(water_absorption(1930.0, 0.0) == 0.0);
    }

    #[test]
    fn darker_spectra_at_high_soc() {
        // With scatter and noise silenced by averaging many bands far from
        // absorption features, higher SOC must lower mean reflectance.
        let data = generate_sample(&config(200, 3)).unwrap();
        let mut low = (0.0, 0);
        let mut high = (0.0, 0);
        for i in 0..data.n_samples() {
            // 900-1300 nm window: bands 250..450, clear of every dip.
            let mean: f64 = (250..450).map(|b| data.x[(i, b)]).sum::<f64>() / 200.0;
            if data.y[i] < 0.8 {
                low = (low.0 + mean, low.1 + 1);
            } else if data.y[i] > 2.5 {
                high = (high.0 + mean, high.1 + 1);
            }
        }
        assert!(low.1 > 0 && high.1 > 0, "seed produced no extreme samples");
        assert!(low.0 / low.1 as f64 > high.0 / high.1 as f64);
    }

    #[test]
    fn metadata_cycles_site_and_depth() {
        let data = generate_sample(&config(4, 9)).unwrap();
        assert_eq!(data.meta_columns, vec!["site", "depth_cm"]);
        assert_eq!(data.meta[0]["site"], "A");
        assert_eq!(data.meta[1]["site"], "B");
        assert_eq!(data.meta[3]["site"], "A");
        assert_eq!(data.meta[0]["depth_cm"], "0-10");
        assert_eq!(data.meta[3]["depth_cm"], "10-30");
        assert_eq!(data.ids[0], "S-001");
    }

    #[test]
    fn zero_count_is_rejected() {
        let err = generate_sample(&config(0, 1)).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
