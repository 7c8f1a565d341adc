//! Runtime configuration types for the calibration controller and input loop.
//!
//! These are separate from the TOML-deserialized config in `smartscale_config`;
//! see `conversions` for the bridge.

use std::time::Duration;

/// Calibration search parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationCfg {
    /// Pause after asking the operator to clear the platform.
    pub settle: Duration,
    /// Pause after asking the operator to place the reference weight.
    pub place_settle: Duration,
    /// How long the Completed/Aborted message stays on screen.
    pub dwell: Duration,
    /// Raw reads averaged for the baseline.
    pub baseline_reads: u8,
    /// Unit reads averaged per search iteration.
    pub sample_count: u8,
    /// Search stops once `|sample - reference| <= tolerance_g`.
    pub tolerance_g: f32,
    /// Absolute error at which the step saturates.
    pub error_ceiling: f32,
    /// Largest factor adjustment applied in one iteration.
    pub max_step: f32,
    /// Factor the search starts from.
    pub seed_factor: f32,
    /// Upper bound on search iterations; `None` searches until cancelled.
    pub max_iterations: Option<u32>,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(5),
            place_settle: Duration::from_secs(5),
            dwell: Duration::from_secs(2),
            baseline_reads: 20,
            sample_count: 5,
            tolerance_g: 0.2,
            error_ceiling: 1_000.0,
            max_step: 20.0,
            seed_factor: 1.0,
            max_iterations: None,
        }
    }
}

impl CalibrationCfg {
    /// Same search with every pause removed. Handy for simulations.
    pub fn without_pauses(mut self) -> Self {
        self.settle = Duration::ZERO;
        self.place_settle = Duration::ZERO;
        self.dwell = Duration::ZERO;
        self
    }
}

/// Input polling configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputCfg {
    /// Interval between `poll_all` ticks.
    pub poll_interval: Duration,
}

impl Default for InputCfg {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
        }
    }
}
