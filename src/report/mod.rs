//! Reporting: terminal tables for fit results, batch trends and delta scans.

pub mod format;

pub use format::*;
