//! Staged fit pipeline.
//!
//! The three estimators depend on each other:
//!
//! 1. a first linear fit bootstraps the nonlinear initial guess,
//! 2. the nonlinear fit may estimate a background, which changes the
//!    linearized transform,
//! 3. a second linear fit (background only) reports the corrected estimate,
//! 4. the ratio estimator runs last, on the corrected transform.
//!
//! `FitStage` encodes that order so it lives in one place.

/// Next piece of work for a measurement being (re)fitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitStage {
    NeedsLinearBootstrap,
    NeedsNonlinear,
    NeedsLinearRefine,
    NeedsRatio,
    Done,
}

impl FitStage {
    pub const START: FitStage = FitStage::NeedsLinearBootstrap;

    /// Stage following `self`. The refine pass only exists with a background term.
    pub fn next(self, use_background: bool) -> FitStage {
        match self {
            FitStage::NeedsLinearBootstrap => FitStage::NeedsNonlinear,
            FitStage::NeedsNonlinear if use_background => FitStage::NeedsLinearRefine,
            FitStage::NeedsNonlinear => FitStage::NeedsRatio,
            FitStage::NeedsLinearRefine => FitStage::NeedsRatio,
            FitStage::NeedsRatio | FitStage::Done => FitStage::Done,
        }
    }

    /// All stages that run for a configuration, in order (excluding `Done`).
    pub fn plan(use_background: bool) -> Vec<FitStage> {
        let mut out = Vec::with_capacity(4);
        let mut stage = Self::START;
        while stage != FitStage::Done {
            out.push(stage);
            stage = stage.next(use_background);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_without_background_skips_refine() {
        assert_eq!(
            FitStage::plan(false),
            vec![
                FitStage::NeedsLinearBootstrap,
                FitStage::NeedsNonlinear,
                FitStage::NeedsRatio
            ]
        );
    }

    #[test]
    fn plan_with_background_refines_linear_before_ratio() {
        assert_eq!(
            FitStage::plan(true),
            vec![
                FitStage::NeedsLinearBootstrap,
                FitStage::NeedsNonlinear,
                FitStage::NeedsLinearRefine,
                FitStage::NeedsRatio
            ]
        );
    }

    #[test]
    fn done_is_terminal() {
        assert_eq!(FitStage::Done.next(true), FitStage::Done);
    }
}
