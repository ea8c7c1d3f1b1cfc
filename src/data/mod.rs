//! Input data that does not come from an instrument.

pub mod synthetic;

pub use synthetic::*;
