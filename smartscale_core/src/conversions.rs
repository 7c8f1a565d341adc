//! `From` implementations bridging `smartscale_config` types to `smartscale_core` types.

use std::time::Duration;

use crate::config::{CalibrationCfg, InputCfg};
use crate::encoder::EncoderDefinition;
use crate::input::ButtonDefinition;

// ── CalibrationCfg ───────────────────────────────────────────────────────────

impl From<&smartscale_config::CalibrationCfg> for CalibrationCfg {
    fn from(c: &smartscale_config::CalibrationCfg) -> Self {
        Self {
            settle: Duration::from_millis(c.settle_ms),
            place_settle: Duration::from_millis(c.place_settle_ms),
            dwell: Duration::from_millis(c.dwell_ms),
            baseline_reads: c.baseline_reads,
            sample_count: c.sample_count,
            tolerance_g: c.tolerance_g,
            error_ceiling: c.error_ceiling,
            max_step: c.max_step,
            seed_factor: c.seed_factor,
            max_iterations: (c.max_iterations > 0).then_some(c.max_iterations),
        }
    }
}

// ── InputCfg ─────────────────────────────────────────────────────────────────

impl From<&smartscale_config::InputCfg> for InputCfg {
    fn from(c: &smartscale_config::InputCfg) -> Self {
        Self {
            poll_interval: Duration::from_millis(c.poll_ms.max(1)),
        }
    }
}

// ── Input definitions (callbacks attached by the caller) ─────────────────────

impl From<&smartscale_config::ButtonCfg> for ButtonDefinition {
    fn from(c: &smartscale_config::ButtonCfg) -> Self {
        ButtonDefinition::new(c.key.clone(), c.pin, c.pull_up)
    }
}

impl From<&smartscale_config::EncoderCfg> for EncoderDefinition {
    fn from(c: &smartscale_config::EncoderCfg) -> Self {
        EncoderDefinition::new(
            c.key.clone(),
            c.clockwise_pin,
            c.anti_clockwise_pin,
            c.button_pin,
        )
        .with_button_pull_up(c.button_pull_up)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_iterations_means_unbounded() {
        let toml = smartscale_config::CalibrationCfg::default();
        let cfg = CalibrationCfg::from(&toml);
        assert_eq!(cfg.max_iterations, None);
        assert_eq!(cfg, CalibrationCfg::default());
    }

    #[test]
    fn iteration_cap_carries_over() {
        let toml = smartscale_config::CalibrationCfg {
            max_iterations: 250,
            settle_ms: 0,
            ..Default::default()
        };
        let cfg = CalibrationCfg::from(&toml);
        assert_eq!(cfg.max_iterations, Some(250));
        assert_eq!(cfg.settle, Duration::ZERO);
    }
}
