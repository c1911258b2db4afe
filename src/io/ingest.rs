//! CSV ingest and normalization.
//!
//! This module turns a wide spectral CSV (one row per soil sample, one column
//! per wavelength) into a clean `Dataset` that is safe to preprocess and fit.
//!
//! Design goals:
//! - **Strict schema** for required columns (clear errors + exit code 2)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Deterministic behavior** (no hidden randomness)
//! - **Separation of concerns**: no preprocessing or fitting logic here
//!
//! Column classification: the identifier and target columns are named (the
//! target can be auto-probed), every header that parses as a wavelength
//! (plain number, or `x`/`wl`-prefixed, within a plausible nm range) becomes
//! a spectral column, and everything else is carried as string metadata.
//! Spectral columns are sorted by wavelength and must form a uniform grid,
//! which is what the Savitzky–Golay filter assumes.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use nalgebra::{DMatrix, DVector};

use crate::domain::{Dataset, FitConfig};
use crate::error::AppError;

/// Target column names probed, in order, when `--target auto` is in effect.
const TARGET_CANDIDATES: [&str; 4] = ["soc", "soc_percent", "oc", "toc"];

/// Headers outside this range (nm) are never treated as wavelengths, so
/// numeric-looking metadata columns (years, depths) stay metadata.
const WL_PLAUSIBLE_MIN: f64 = 100.0;
const WL_PLAUSIBLE_MAX: f64 = 25_000.0;

/// Relative tolerance for the uniform-grid check.
const GRID_TOL: f64 = 1e-6;

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub id: Option<String>,
    pub message: String,
}

/// Ingest output: the aligned dataset + row errors + resolved target name.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub dataset: Dataset,
    /// Target column actually used (after `auto` resolution).
    pub target_column: String,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
}

impl IngestedData {
    /// Wrap an in-memory dataset (synthetic runs) in the shape the rest of
    /// the pipeline expects.
    pub fn from_dataset(dataset: Dataset, target_column: &str) -> Self {
        let n = dataset.n_samples();
        Self {
            dataset,
            target_column: target_column.to_string(),
            row_errors: Vec::new(),
            rows_read: n,
            rows_used: n,
        }
    }
}

/// Load and validate a spectral CSV.
pub fn load_spectra(path: &Path, config: &FitConfig) -> Result<IngestedData, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;
    ingest_from_reader(file, config)
}

/// Predict-mode load: the target column (named exactly, no probing) may be
/// absent. The returned flag says whether it was present; when it is not,
/// `y` is all zeros and metrics must be skipped.
pub fn load_spectra_for_predict(
    path: &Path,
    config: &FitConfig,
) -> Result<(IngestedData, bool), AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;
    ingest_inner(file, config, false)
}

/// Ingest from any reader (tests feed strings through this).
pub fn ingest_from_reader<R: Read>(reader: R, config: &FitConfig) -> Result<IngestedData, AppError> {
    Ok(ingest_inner(reader, config, true)?.0)
}

fn ingest_inner<R: Read>(
    reader: R,
    config: &FitConfig,
    require_target: bool,
) -> Result<(IngestedData, bool), AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();

    let plan = plan_columns(&headers, config, require_target)?;

    let mut ids = Vec::new();
    let mut meta = Vec::new();
    let mut y_vals = Vec::new();
    let mut x_flat = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // +2 because:
        // - records() starts at line 1 after headers
        // - CSV is 1-based line numbers
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    id: None,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match parse_row(&record, &plan) {
            Ok(parsed) => {
                ids.push(parsed.id);
                meta.push(parsed.meta);
                y_vals.push(parsed.y);
                x_flat.extend(parsed.reflectance);
            }
            Err((id, message)) => row_errors.push(RowError { line, id, message }),
        }
    }

    let rows_used = ids.len();
    if rows_used == 0 {
        return Err(AppError::new(
            3,
            "No valid rows remain after validation.",
        ));
    }

    let n_bands = plan.spectral.len();
    let dataset = Dataset {
        ids,
        meta,
        meta_columns: plan.meta.iter().map(|(_, name)| name.clone()).collect(),
        wavelengths: plan.spectral.iter().map(|(_, wl)| *wl).collect(),
        x: DMatrix::from_row_slice(rows_used, n_bands, &x_flat),
        y: DVector::from_vec(y_vals),
    };

    let has_target = plan.target_idx.is_some();
    Ok((
        IngestedData {
            dataset,
            target_column: plan.target_name,
            row_errors,
            rows_read,
            rows_used,
        },
        has_target,
    ))
}

/// How each CSV column will be consumed.
#[derive(Debug, Clone)]
struct ColumnPlan {
    id_idx: usize,
    /// `None` only in predict mode when the target column is absent.
    target_idx: Option<usize>,
    target_name: String,
    /// (column index, wavelength nm), ascending by wavelength, cropped.
    spectral: Vec<(usize, f64)>,
    /// (column index, normalized name), input order.
    meta: Vec<(usize, String)>,
}

struct ParsedRow {
    id: String,
    y: f64,
    reflectance: Vec<f64>,
    meta: BTreeMap<String, String>,
}

fn plan_columns(
    headers: &StringRecord,
    config: &FitConfig,
    require_target: bool,
) -> Result<ColumnPlan, AppError> {
    let header_map = build_header_map(headers);

    let id_name = normalize_header_name(&config.id_column);
    let id_idx = *header_map
        .get(&id_name)
        .ok_or_else(|| AppError::new(2, format!("Missing required column: `{id_name}`")))?;

    let (target_name, target_idx) = if require_target {
        let (name, idx) = resolve_target(&config.target, &header_map)?;
        (name, Some(idx))
    } else {
        // Predict mode: the artifact names the column exactly; absence is fine.
        let name = normalize_header_name(&config.target);
        let idx = header_map.get(&name).copied();
        (name, idx)
    };
    if target_idx == Some(id_idx) {
        return Err(AppError::new(
            2,
            format!("Target column `{target_name}` must differ from the id column."),
        ));
    }

    let mut spectral = Vec::new();
    let mut meta = Vec::new();
    for (idx, raw) in headers.iter().enumerate() {
        if idx == id_idx || Some(idx) == target_idx {
            continue;
        }
        let name = normalize_header_name(raw);
        match parse_wavelength_header(&name) {
            Some(wl) => spectral.push((idx, wl)),
            None => meta.push((idx, name)),
        }
    }

    spectral.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    for pair in spectral.windows(2) {
        if (pair[1].1 - pair[0].1).abs() < 1e-9 {
            return Err(AppError::new(
                2,
                format!("Duplicate wavelength column: {} nm", pair[0].1),
            ));
        }
    }

    if let Some(lo) = config.wl_min {
        spectral.retain(|(_, wl)| *wl >= lo);
    }
    if let Some(hi) = config.wl_max {
        spectral.retain(|(_, wl)| *wl <= hi);
    }

    if spectral.len() < 2 {
        let filtered = config.wl_min.is_some() || config.wl_max.is_some();
        let hint = if filtered {
            " inside the requested wavelength window"
        } else {
            ""
        };
        return Err(AppError::new(
            3,
            format!(
                "Found {} spectral column(s){hint}; need at least 2 (numeric headers such as `400`, `x1350`).",
                spectral.len()
            ),
        ));
    }

    check_uniform_grid(&spectral)?;

    Ok(ColumnPlan {
        id_idx,
        target_idx,
        target_name,
        spectral,
        meta,
    })
}

fn check_uniform_grid(spectral: &[(usize, f64)]) -> Result<(), AppError> {
    let first = spectral[0].1;
    let last = spectral[spectral.len() - 1].1;
    let step = (last - first) / (spectral.len() - 1) as f64;
    for pair in spectral.windows(2) {
        let d = pair[1].1 - pair[0].1;
        if (d - step).abs() > GRID_TOL * step.max(1e-9) {
            return Err(AppError::new(
                2,
                format!(
                    "Non-uniform wavelength grid: mean step is {step:.4} nm but {:.4}→{:.4} nm steps {d:.4} nm. \
                     Savitzky–Golay filtering requires evenly spaced bands.",
                    pair[0].1, pair[1].1
                ),
            ));
        }
    }
    Ok(())
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Excel and other tools sometimes emit UTF-8 CSVs with a BOM prefix on the
    // first header (e.g. "﻿id"). If we don't strip it, schema validation will
    // incorrectly report missing columns.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn resolve_target(
    requested: &str,
    header_map: &HashMap<String, usize>,
) -> Result<(String, usize), AppError> {
    let requested = normalize_header_name(requested);
    if requested != "auto" {
        let idx = *header_map.get(&requested).ok_or_else(|| {
            AppError::new(2, format!("Missing target column: `{requested}`"))
        })?;
        return Ok((requested, idx));
    }

    for name in TARGET_CANDIDATES {
        if let Some(&idx) = header_map.get(name) {
            return Ok((name.to_string(), idx));
        }
    }

    Err(AppError::new(
        2,
        format!(
            "Could not resolve `--target auto`: none of {} were found.",
            TARGET_CANDIDATES
                .map(|n| format!("`{n}`"))
                .join(", ")
        ),
    ))
}

/// Parse a normalized header as a wavelength. Accepts plain numbers and the
/// `x`/`wl`/`wl_` prefixes common in exports from R and pandas.
fn parse_wavelength_header(name: &str) -> Option<f64> {
    let body = name
        .strip_prefix("wl_")
        .or_else(|| name.strip_prefix("wl"))
        .or_else(|| name.strip_prefix('x'))
        .unwrap_or(name);
    let v = body.parse::<f64>().ok()?;
    if v.is_finite() && (WL_PLAUSIBLE_MIN..=WL_PLAUSIBLE_MAX).contains(&v) {
        Some(v)
    } else {
        None
    }
}

fn parse_row(record: &StringRecord, plan: &ColumnPlan) -> Result<ParsedRow, (Option<String>, String)> {
    let id = record
        .get(plan.id_idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or((None, "Missing `id` value.".to_string()))?
        .to_string();

    let y = match plan.target_idx {
        Some(target_idx) => parse_f64_field(record, target_idx).map_err(|detail| {
            (
                Some(id.clone()),
                format!("Bad `{}` value: {detail}", plan.target_name),
            )
        })?,
        None => 0.0,
    };

    let mut reflectance = Vec::with_capacity(plan.spectral.len());
    for &(idx, wl) in &plan.spectral {
        let v = parse_f64_field(record, idx).map_err(|detail| {
            (
                Some(id.clone()),
                format!("Bad reflectance at {wl} nm: {detail}"),
            )
        })?;
        reflectance.push(v);
    }

    let mut meta = BTreeMap::new();
    for (idx, name) in &plan.meta {
        let value = record.get(*idx).map(str::trim).unwrap_or("");
        meta.insert(name.clone(), value.to_string());
    }

    Ok(ParsedRow {
        id,
        y,
        reflectance,
        meta,
    })
}

fn parse_f64_field(record: &StringRecord, idx: usize) -> Result<f64, String> {
    let raw = record
        .get(idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| "missing".to_string())?;
    let v = raw
        .parse::<f64>()
        .map_err(|_| format!("'{raw}' is not a number"))?;
    if v.is_finite() {
        Ok(v)
    } else {
        Err(format!("'{raw}' is not finite"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PreprocessSpec;

    fn test_config() -> FitConfig {
        FitConfig {
            csv_path: None,
            synthetic: false,
            sample_count: 0,
            seed: 0,
            id_column: "id".to_string(),
            target: "auto".to_string(),
            wl_min: None,
            wl_max: None,
            preprocess: PreprocessSpec::default(),
            max_components: 10,
            folds: 5,
            cv_shuffle: false,
            parsimony_tol: 0.0,
            top_n: 10,
            plot: false,
            plot_width: 72,
            plot_height: 20,
            export_predictions: None,
            export_model: None,
            debug_bundle: false,
        }
    }

    #[test]
    fn wavelength_headers_parse_with_common_prefixes() {
        assert_eq!(parse_wavelength_header("400"), Some(400.0));
        assert_eq!(parse_wavelength_header("1500.5"), Some(1500.5));
        assert_eq!(parse_wavelength_header("x2498"), Some(2498.0));
        assert_eq!(parse_wavelength_header("wl_700"), Some(700.0));
        assert_eq!(parse_wavelength_header("wl700"), Some(700.0));

        assert_eq!(parse_wavelength_header("soc"), None);
        assert_eq!(parse_wavelength_header("depth_cm"), None);
        // Outside the plausible nm range: stays metadata.
        assert_eq!(parse_wavelength_header("42"), None);
        assert_eq!(parse_wavelength_header("30000"), None);
    }

    #[test]
    fn ingest_sorts_columns_and_collects_row_errors() {
        // Wavelength columns deliberately out of order; row S3 has a bad
        // reflectance and row S4 lacks a target.
        let csv = "\
id,site,soc,402,400,404
S1,north,1.20,0.52,0.50,0.54
S2,south,2.45,0.42,0.40,0.44
S3,north,0.80,oops,0.61,0.63
S4,east,,0.33,0.31,0.35
";
        let out = ingest_from_reader(csv.as_bytes(), &test_config()).unwrap();

        assert_eq!(out.rows_read, 4);
        assert_eq!(out.rows_used, 2);
        assert_eq!(out.row_errors.len(), 2);
        assert_eq!(out.row_errors[0].line, 4);
        assert_eq!(out.row_errors[0].id.as_deref(), Some("S3"));
        assert!(out.row_errors[0].message.contains("402 nm"));
        assert_eq!(out.row_errors[1].line, 5);

        assert_eq!(out.target_column, "soc");
        let ds = &out.dataset;
        assert_eq!(ds.wavelengths, vec![400.0, 402.0, 404.0]);
        // Columns were reordered to match the sorted wavelengths.
        assert_eq!(ds.x[(0, 0)], 0.50);
        assert_eq!(ds.x[(0, 1)], 0.52);
        assert_eq!(ds.x[(1, 2)], 0.44);
        assert_eq!(ds.y[1], 2.45);
        assert_eq!(ds.meta_columns, vec!["site".to_string()]);
        assert_eq!(ds.meta[1].get("site").map(String::as_str), Some("south"));
    }

    #[test]
    fn auto_target_probes_fallback_names() {
        let csv = "\
id,oc,400,402
S1,1.0,0.5,0.5
";
        let out = ingest_from_reader(csv.as_bytes(), &test_config()).unwrap();
        assert_eq!(out.target_column, "oc");
    }

    #[test]
    fn missing_target_is_a_usage_error() {
        let csv = "\
id,carbon,400,402
S1,1.0,0.5,0.5
";
        let err = ingest_from_reader(csv.as_bytes(), &test_config()).unwrap_err();
        assert_eq!(err.exit_code(), 2);

        let mut config = test_config();
        config.target = "carbon".to_string();
        let out = ingest_from_reader(csv.as_bytes(), &config).unwrap();
        assert_eq!(out.target_column, "carbon");
    }

    #[test]
    fn non_uniform_grid_is_rejected() {
        let csv = "\
id,soc,400,402,405
S1,1.0,0.5,0.5,0.5
";
        let err = ingest_from_reader(csv.as_bytes(), &test_config()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("Non-uniform"));
    }

    #[test]
    fn wavelength_window_crops_bands() {
        let csv = "\
id,soc,400,402,404,406
S1,1.0,0.1,0.2,0.3,0.4
";
        let mut config = test_config();
        config.wl_min = Some(402.0);
        config.wl_max = Some(404.0);
        let out = ingest_from_reader(csv.as_bytes(), &config).unwrap();
        assert_eq!(out.dataset.wavelengths, vec![402.0, 404.0]);
        assert_eq!(out.dataset.x[(0, 0)], 0.2);

        config.wl_min = Some(500.0);
        let err = ingest_from_reader(csv.as_bytes(), &config).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn bom_on_first_header_is_stripped() {
        let csv = "\u{feff}id,soc,400,402\nS1,1.0,0.5,0.5\n";
        let out = ingest_from_reader(csv.as_bytes(), &test_config()).unwrap();
        assert_eq!(out.rows_used, 1);
    }

    #[test]
    fn predict_mode_tolerates_a_missing_target() {
        let mut config = test_config();
        config.target = "soc".to_string();

        let without = "id,400,402\nS1,0.5,0.6\n";
        let (out, has_target) = ingest_inner(without.as_bytes(), &config, false).unwrap();
        assert!(!has_target);
        assert_eq!(out.rows_used, 1);
        assert_eq!(out.dataset.y[0], 0.0);

        let with = "id,soc,400,402\nS1,1.25,0.5,0.6\n";
        let (out, has_target) = ingest_inner(with.as_bytes(), &config, false).unwrap();
        assert!(has_target);
        assert_eq!(out.dataset.y[0], 1.25);
    }
}
