//! Input/output helpers.
//!
//! - ASCII / JSON spectrum ingest (`ingest`)
//! - results and raw-data tables (`export`)
//! - fitted-curve JSON (`curve`)

pub mod curve;
pub mod export;
pub mod ingest;

pub use curve::*;
pub use export::*;
pub use ingest::*;
