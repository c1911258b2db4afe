//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - loads a spectral CSV or generates synthetic data
//! - runs preprocessing + component search + the final fit
//! - prints reports/plots
//! - writes optional exports

use clap::Parser;

use crate::cli::{Command, FitArgs, PlotArgs, PredictArgs, SampleArgs};
use crate::domain::{FitConfig, PreprocessSpec};
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `soc` binary.
pub fn run() -> Result<(), AppError> {
    // We want `soc` and `soc --csv soil.csv` to behave like `soc tui ...`.
    //
    // Clap requires a subcommand name, so we do a small, explicit rewrite of the
    // argv list before parsing. This preserves a clean clap structure while
    // retaining the requested UX.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Predict(args) => handle_predict(args),
        Command::Plot(args) => handle_plot(args),
        Command::Sample(args) => handle_sample(args),
        Command::Tui(args) => handle_tui(args),
    }
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let mut config = fit_config_from_args(&args);
    if !config.synthetic && config.csv_path.is_none() {
        config.csv_path = Some(crate::cli::picker::prompt_for_csv_path()?);
    }

    let run = pipeline::run_fit(&config)?;

    println!(
        "{}",
        crate::report::format_run_summary(&run.ingest, &run.artifact, &run.outcome, &config)
    );
    println!("{}", crate::report::format_worst(&run.worst));

    if config.plot {
        let w = config.plot_width;
        let h = config.plot_height;
        let target = &run.ingest.target_column;
        println!(
            "{}",
            crate::plot::render_target_histogram(run.ingest.dataset.y.as_slice(), target, w, h)
        );
        println!(
            "{}",
            crate::plot::render_spectra_plot(&run.x_pre, &run.ingest.dataset.wavelengths, 6, w, h)
        );
        println!(
            "{}",
            crate::plot::render_cv_curve(&run.outcome.scores, run.outcome.chosen.components, w, h)
        );
        println!(
            "{}",
            crate::plot::render_scatter_plot(&run.residuals, &run.worst, target, w, h)
        );
    }

    // Optional exports.
    if let Some(path) = &config.export_predictions {
        crate::io::export::write_predictions_csv(
            path,
            &run.residuals,
            &run.ingest.dataset,
            &run.ingest.target_column,
        )?;
    }
    if let Some(path) = &config.export_model {
        crate::io::model::write_model_json(path, &run.artifact)?;
    }
    if config.debug_bundle {
        let path = crate::debug::write_debug_bundle(&run, &config)?;
        println!("Wrote debug bundle: {}", path.display());
    }

    Ok(())
}

fn handle_predict(args: PredictArgs) -> Result<(), AppError> {
    let artifact = crate::io::model::read_model_json(&args.model)?;

    let config = FitConfig {
        csv_path: Some(args.csv.clone()),
        id_column: args.id_column.clone(),
        target: artifact.target.clone(),
        ..FitConfig::default()
    };
    let (ingest, has_target) = crate::io::ingest::load_spectra_for_predict(&args.csv, &config)?;

    crate::io::model::check_grid_match(&artifact.wavelength_nm, &ingest.dataset.wavelengths)?;

    let filter = crate::math::SavgolFilter::new(
        &artifact.preprocess,
        ingest.dataset.wavelength_step(),
        ingest.dataset.n_bands(),
    )?;
    let x_pre = filter.apply_matrix(&ingest.dataset.x);
    let y_pred = crate::models::predict(&artifact.model, &x_pre);

    let quality = if has_target {
        Some(crate::math::quality(
            ingest.dataset.y.as_slice(),
            y_pred.as_slice(),
        ))
    } else {
        None
    };

    println!(
        "{}",
        crate::report::format_predict_summary(&artifact, ingest.rows_used, quality.as_ref())
    );
    if !ingest.row_errors.is_empty() {
        println!("({} row(s) rejected during ingest)", ingest.row_errors.len());
    }

    if has_target && args.plot && !args.no_plot {
        let residuals = crate::report::compute_residuals(&ingest.dataset, &y_pred, &y_pred)?;
        println!(
            "{}",
            crate::plot::render_scatter_plot(&residuals, &[], &artifact.target, args.width, args.height)
        );
    }

    if let Some(path) = &args.export {
        let predictions: Vec<f64> = y_pred.iter().copied().collect();
        crate::io::export::write_predict_csv(
            path,
            &ingest.dataset,
            &artifact.target,
            &predictions,
            has_target,
        )?;
    }

    Ok(())
}

fn handle_plot(args: PlotArgs) -> Result<(), AppError> {
    let artifact = crate::io::model::read_model_json(&args.model)?;

    println!(
        "{}",
        crate::plot::render_cv_curve(
            &artifact.cv_curve,
            artifact.model.n_components,
            args.width,
            args.height
        )
    );
    println!(
        "{}",
        crate::plot::render_coefficient_plot(
            &artifact.model.coefficients,
            &artifact.wavelength_nm,
            args.width,
            args.height
        )
    );
    Ok(())
}

fn handle_sample(args: SampleArgs) -> Result<(), AppError> {
    let config = FitConfig {
        synthetic: true,
        sample_count: args.sample_count,
        seed: args.seed,
        ..FitConfig::default()
    };
    let dataset = crate::data::generate_sample(&config)?;
    crate::io::export::write_sample_csv(&args.out, &dataset, "soc")?;
    println!(
        "Wrote {} synthetic samples to {}",
        dataset.n_samples(),
        args.out.display()
    );
    Ok(())
}

fn handle_tui(args: FitArgs) -> Result<(), AppError> {
    crate::tui::run(args)
}

pub fn fit_config_from_args(args: &FitArgs) -> FitConfig {
    FitConfig {
        csv_path: args.csv.clone(),
        synthetic: args.synthetic,
        sample_count: args.sample_count,
        seed: args.seed,
        id_column: args.id_column.clone(),
        target: args.target.clone(),
        wl_min: args.wl_min,
        wl_max: args.wl_max,
        preprocess: PreprocessSpec {
            window: args.window,
            polyorder: args.polyorder,
            derivative: args.derivative,
        },
        max_components: args.max_components,
        folds: args.folds,
        cv_shuffle: args.cv_shuffle,
        parsimony_tol: args.parsimony_tol,
        top_n: args.top,
        plot: args.plot && !args.no_plot,
        plot_width: args.width,
        plot_height: args.height,
        export_predictions: args.export.clone(),
        export_model: args.export_model.clone(),
        debug_bundle: args.debug_bundle,
    }
}

/// Rewrite argv so `soc` defaults to `soc tui`.
///
/// Rules:
/// - `soc`                     -> `soc tui`
/// - `soc --csv soil.csv ...`  -> `soc tui --csv soil.csv ...`
/// - `soc --help/--version/-h` -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("tui".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(
        arg1.as_str(),
        "fit" | "predict" | "plot" | "sample" | "tui"
    );
    if is_subcommand {
        return argv;
    }

    // If the first token is a flag, treat it as "tui flags".
    if arg1.starts_with('-') {
        argv.insert(1, "tui".to_string());
        return argv;
    }

    // Otherwise, leave as-is.
    argv
}
