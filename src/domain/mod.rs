//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the fit configuration that decides when a measurement must be re-fitted
//! - detector settings (saturation ceiling)
//! - raw loader payloads (`RawSpectrum`, `RawPayload`)

pub mod types;

pub use types::*;
