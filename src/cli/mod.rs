//! Command-line parsing for the spectral temperature fitter.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! fitting code; `app` turns these structs into domain configuration.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{Delimiter, FitConfig};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "spectemp", version, about = "Temperature from thermal emission spectra")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit every spectrum, print results and batch trend, optionally export the table.
    Fit(FitArgs),
    /// Write the per-sample raw-data table of one measurement.
    Raw(RawArgs),
    /// Spread of the two-colour temperature for a range of pixel offsets.
    DeltaScan(DeltaScanArgs),
    /// Write a synthetic blackbody spectrum as ASCII.
    Simulate(SimulateArgs),
}

/// Fit window and estimator options shared by the fitting commands.
#[derive(Debug, Args, Clone)]
pub struct WindowArgs {
    /// Lower edge of the fit window (nm).
    #[arg(long, default_value_t = 550.0)]
    pub lower: f64,

    /// Upper edge of the fit window (nm).
    #[arg(long, default_value_t = 900.0)]
    pub upper: f64,

    /// Pixel offset of the two-colour estimator.
    #[arg(long, default_value_t = 100)]
    pub delta: usize,

    /// Fit an additive background term.
    #[arg(long)]
    pub background: bool,

    /// Raw detector reading counted as saturated (overrides SPECTEMP_SATURATION_CEILING).
    #[arg(long)]
    pub saturation_ceiling: Option<f64>,
}

impl WindowArgs {
    pub fn fit_config(&self) -> FitConfig {
        FitConfig {
            lower_bound: self.lower,
            upper_bound: self.upper,
            delta: self.delta,
            use_background: self.background,
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    /// Spectrum files (ASCII two-column or JSON).
    #[arg(required = true, value_name = "INPUT")]
    pub inputs: Vec<PathBuf>,

    #[command(flatten)]
    pub window: WindowArgs,

    /// Write the results table to this file.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Field separator of the results table.
    #[arg(long, value_enum, default_value_t = Delimiter::Tab)]
    pub delimiter: Delimiter,
}

#[derive(Debug, Args, Clone)]
pub struct RawArgs {
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Leaf name of the measurement (defaults to the only one in the file).
    #[arg(long)]
    pub measurement: Option<String>,

    #[command(flatten)]
    pub window: WindowArgs,

    /// Destination of the tab-separated raw-data table.
    #[arg(short, long)]
    pub output: PathBuf,

    /// Also write the fitted curves as JSON.
    #[arg(long = "export-curve")]
    pub export_curve: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct DeltaScanArgs {
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    #[arg(long)]
    pub measurement: Option<String>,

    #[command(flatten)]
    pub window: WindowArgs,

    /// Largest offset to try.
    #[arg(long, default_value_t = 300)]
    pub max_delta: usize,
}

#[derive(Debug, Args, Clone)]
pub struct SimulateArgs {
    /// Blackbody temperature (K).
    #[arg(long)]
    pub temperature: f64,

    /// Emissivity-like scale factor.
    #[arg(long, default_value_t = 1e-6)]
    pub multiplier: f64,

    /// Additive background.
    #[arg(long, default_value_t = 0.0)]
    pub background: f64,

    /// Standard deviation of Gaussian noise (intensity units).
    #[arg(long, default_value_t = 0.0)]
    pub noise: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// First wavelength (nm).
    #[arg(long, default_value_t = 500.0)]
    pub start: f64,

    /// Last wavelength (nm).
    #[arg(long, default_value_t = 900.0)]
    pub end: f64,

    /// Wavelength step (nm).
    #[arg(long, default_value_t = 1.0)]
    pub step: f64,

    #[arg(short, long)]
    pub output: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_flags_map_to_configuration() {
        let cli = Cli::parse_from([
            "spectemp", "fit", "a.txt", "b.json", "--lower", "600", "--delta", "50", "--background",
        ]);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.inputs.len(), 2);
        assert_eq!(
            args.window.fit_config(),
            FitConfig {
                lower_bound: 600.0,
                upper_bound: 900.0,
                delta: 50,
                use_background: true,
            }
        );
        assert_eq!(args.delimiter, Delimiter::Tab);
    }

    #[test]
    fn delimiter_and_subcommand_names() {
        let cli = Cli::parse_from(["spectemp", "fit", "a.txt", "--delimiter", "comma"]);
        assert!(matches!(cli.command, Command::Fit(FitArgs { delimiter: Delimiter::Comma, .. })));

        let cli = Cli::parse_from(["spectemp", "delta-scan", "a.txt"]);
        assert!(matches!(cli.command, Command::DeltaScan(DeltaScanArgs { max_delta: 300, .. })));
    }
}
