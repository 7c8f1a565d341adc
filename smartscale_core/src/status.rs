//! Terminal result of a calibration session.

use crate::error::AbortReason;

#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationOutcome {
    /// Search converged; `factor` has been persisted and applied.
    Completed {
        factor: f32,
        iterations: u32,
        baseline: i64,
    },
    /// Session ended early; the factor active before the session is back in
    /// place and nothing was persisted.
    Aborted {
        reason: AbortReason,
        restored_factor: f32,
        iterations: u32,
    },
}

impl CalibrationOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, CalibrationOutcome::Completed { .. })
    }

    /// Factor the load cell is left with.
    pub fn factor(&self) -> f32 {
        match self {
            CalibrationOutcome::Completed { factor, .. } => *factor,
            CalibrationOutcome::Aborted {
                restored_factor, ..
            } => *restored_factor,
        }
    }

    pub fn iterations(&self) -> u32 {
        match self {
            CalibrationOutcome::Completed { iterations, .. }
            | CalibrationOutcome::Aborted { iterations, .. } => *iterations,
        }
    }
}
