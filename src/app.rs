//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - initializes logging
//! - parses CLI arguments
//! - runs the fit pipeline
//! - prints reports and writes optional exports

use clap::Parser;
use log::warn;

use crate::cli::{Cli, Command, DeltaScanArgs, FitArgs, RawArgs, SimulateArgs};
use crate::collection::SortOutcome;
use crate::data::SyntheticSpectrum;
use crate::error::AppError;
use crate::io::{write_ascii, write_curve_json, write_raw_file, write_results_file};
use crate::report::{format_batch_summary, format_delta_scan, format_failures, format_results, format_run_summary};

pub mod pipeline;

/// Entry point for the `spectemp` binary.
pub fn run() -> Result<(), AppError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Raw(args) => handle_raw(args),
        Command::DeltaScan(args) => handle_delta_scan(args),
        Command::Simulate(args) => handle_simulate(args),
    }
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = args.window.fit_config();
    let detector = pipeline::resolve_detector(args.window.saturation_ceiling)?;
    let run = pipeline::run_fit(&args.inputs, &config, &detector)?;

    if let SortOutcome::InsertionOrder { undated } = &run.sort {
        warn!("Results are in input order; undated: {}", undated.join(", "));
    }

    print!(
        "{}",
        format_run_summary(&config, &detector, run.collection.len(), run.records.len())
    );
    print!("{}", format_results(&run.records));
    print!("{}", format_failures(&run.failures));
    print!("{}", format_batch_summary(&run.batch, &run.batch_failures));

    if let Some(path) = &args.export {
        let leaves = run.collection.flatten();
        write_results_file(path, leaves.into_iter().map(|(_, m)| m), args.delimiter)?;
        println!("\nWrote {}", path.display());
    }

    Ok(())
}

fn handle_raw(args: RawArgs) -> Result<(), AppError> {
    let config = args.window.fit_config();
    let detector = pipeline::resolve_detector(args.window.saturation_ceiling)?;
    let mut m = pipeline::load_single(&args.input, args.measurement.as_deref(), &detector)?;

    m.evaluate_all(&config)?;
    write_raw_file(&args.output, &m)?;
    println!("Wrote {}", args.output.display());

    if let Some(path) = &args.export_curve {
        write_curve_json(path, &m)?;
        println!("Wrote {}", path.display());
    }
    Ok(())
}

fn handle_delta_scan(args: DeltaScanArgs) -> Result<(), AppError> {
    let config = args.window.fit_config();
    let detector = pipeline::resolve_detector(args.window.saturation_ceiling)?;
    let mut m = pipeline::load_single(&args.input, args.measurement.as_deref(), &detector)?;

    // The scan only needs the applied window; without a committed fit it uses the raw transform.
    if let Err(e) = m.evaluate_all(&config) {
        warn!("{}: {e}", m.name());
    }
    let scan = m.delta_scan(args.max_delta)?;
    print!("{}", format_delta_scan(m.name(), &scan));
    Ok(())
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let spectrum = SyntheticSpectrum {
        temperature: args.temperature,
        multiplier: args.multiplier,
        background: args.background,
        noise: args.noise,
        seed: args.seed,
        start: args.start,
        end: args.end,
        step: args.step,
        acquisition_time: None,
    }
    .generate()?;
    write_ascii(&args.output, &spectrum)?;
    println!(
        "Wrote {} samples at {} K to {}",
        spectrum.wavelengths.len(),
        args.temperature,
        args.output.display()
    );
    Ok(())
}
