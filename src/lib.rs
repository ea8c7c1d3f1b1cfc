//! `spectemp` library crate.
//!
//! Temperature estimation from thermal emission spectra: a nonlinear Planck
//! fit, a linearized Wien fit and a sliding two-colour ratio estimator, with
//! per-measurement caching of fit results.
//!
//! The binary (`spectemp`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the measurement/collection types are reusable by other front-ends

pub mod app;
pub mod batch;
pub mod cli;
pub mod collection;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod measurement;
pub mod models;
pub mod report;
