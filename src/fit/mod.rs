//! Temperature estimators.
//!
//! Responsibilities:
//!
//! - linearized (Wien) fit by ordinary least squares
//! - bounded nonlinear (Planck) fit
//! - sliding two-colour ratio estimator
//! - the stage order that ties them together

pub mod linear;
pub mod nonlinear;
pub mod ratio;
pub mod stage;

pub use linear::*;
pub use nonlinear::*;
pub use ratio::*;
pub use stage::*;
