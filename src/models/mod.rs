//! Radiometric model functions.
//!
//! Models are implemented as small, pure functions so that fitting code can
//! stay generic.

pub mod radiometric;

pub use radiometric::*;
