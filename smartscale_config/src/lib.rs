#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the smart scale device.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Defaults mirror the reference device: 5 s settle, 2 s dwell, 0.2 g
//!   tolerance, 20-unit maximum search step saturating at 1000 units of error.
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

/// Managed button slots on the device, including encoder children.
pub const MAX_BUTTONS: usize = 4;
/// Managed encoder slots on the device.
pub const MAX_ENCODERS: usize = 1;
/// Buttons synthesized per encoder (two rotation channels and the press button).
pub const BUTTONS_PER_ENCODER: usize = 3;

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct Pins {
    pub hx711_dout: u8,
    pub hx711_sck: u8,
    /// Falling edge on this pin cancels a running calibration.
    pub cancel: u8,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ButtonCfg {
    pub key: String,
    pub pin: u8,
    #[serde(default = "default_true")]
    pub pull_up: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EncoderCfg {
    pub key: String,
    pub clockwise_pin: u8,
    pub anti_clockwise_pin: u8,
    pub button_pin: u8,
    #[serde(default = "default_true")]
    pub button_pull_up: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CalibrationCfg {
    /// Pause after asking the operator to clear the platform
    pub settle_ms: u64,
    /// Pause after asking the operator to place the reference weight
    pub place_settle_ms: u64,
    /// How long the final message stays up
    pub dwell_ms: u64,
    /// Raw reads averaged for the baseline
    pub baseline_reads: u8,
    /// Unit reads averaged per search iteration
    pub sample_count: u8,
    pub tolerance_g: f32,
    /// Error (in units) at which the search step saturates
    pub error_ceiling: f32,
    pub max_step: f32,
    pub seed_factor: f32,
    /// 0 keeps the search unbounded
    pub max_iterations: u32,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            settle_ms: 5_000,
            place_settle_ms: 5_000,
            dwell_ms: 2_000,
            baseline_reads: 20,
            sample_count: 5,
            tolerance_g: 0.2,
            error_ceiling: 1_000.0,
            max_step: 20.0,
            seed_factor: 1.0,
            max_iterations: 0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct InputCfg {
    /// Main loop polling interval
    pub poll_ms: u64,
}

impl Default for InputCfg {
    fn default() -> Self {
        Self { poll_ms: 10 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageCfg {
    pub factor_path: String,
}

impl Default for StorageCfg {
    fn default() -> Self {
        Self {
            factor_path: "var/scale_factor.toml".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub pins: Pins,
    #[serde(default)]
    pub buttons: Vec<ButtonCfg>,
    #[serde(default)]
    pub encoder: Option<EncoderCfg>,
    #[serde(default)]
    pub calibration: CalibrationCfg,
    #[serde(default)]
    pub input: InputCfg,
    #[serde(default)]
    pub storage: StorageCfg,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse and validate a config file.
pub fn load_file(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {}: {}", path.display(), e))?;
    let cfg = load_toml(&text).map_err(|e| eyre::eyre!("invalid configuration: {e}"))?;
    cfg.validate()?;
    Ok(cfg)
}

impl Config {
    /// Number of button slots this config occupies once encoders are expanded.
    pub fn button_slots(&self) -> usize {
        self.buttons.len() + self.encoder.as_ref().map_or(0, |_| BUTTONS_PER_ENCODER)
    }

    pub fn validate(&self) -> eyre::Result<()> {
        // Calibration
        let c = &self.calibration;
        if !(c.tolerance_g.is_finite() && c.tolerance_g > 0.0) {
            eyre::bail!("calibration.tolerance_g must be > 0");
        }
        if !(c.error_ceiling.is_finite() && c.error_ceiling > 0.0) {
            eyre::bail!("calibration.error_ceiling must be > 0");
        }
        if !(c.max_step.is_finite() && c.max_step > 0.0) {
            eyre::bail!("calibration.max_step must be > 0");
        }
        if !c.seed_factor.is_finite() || c.seed_factor == 0.0 {
            eyre::bail!("calibration.seed_factor must be finite and non-zero");
        }
        if c.baseline_reads == 0 {
            eyre::bail!("calibration.baseline_reads must be >= 1");
        }
        if c.sample_count == 0 {
            eyre::bail!("calibration.sample_count must be >= 1");
        }
        if c.settle_ms > 5 * 60 * 1000 || c.place_settle_ms > 5 * 60 * 1000 {
            eyre::bail!("calibration settle delays are unreasonably large (>5min)");
        }

        // Input
        if self.input.poll_ms == 0 {
            eyre::bail!("input.poll_ms must be >= 1");
        }

        // Managed inputs
        let mut keys = HashSet::new();
        for b in &self.buttons {
            if b.key.trim().is_empty() {
                eyre::bail!("buttons.key must not be empty");
            }
            if !keys.insert(b.key.as_str()) {
                eyre::bail!("duplicate input key '{}'", b.key);
            }
        }
        if let Some(enc) = &self.encoder {
            if enc.key.trim().is_empty() {
                eyre::bail!("encoder.key must not be empty");
            }
            if !keys.insert(enc.key.as_str()) {
                eyre::bail!("duplicate input key '{}'", enc.key);
            }
        }
        if self.button_slots() > MAX_BUTTONS {
            eyre::bail!(
                "too many managed buttons: {} configured (encoder counts as {}), capacity is {}",
                self.button_slots(),
                BUTTONS_PER_ENCODER,
                MAX_BUTTONS
            );
        }

        // Logging
        if let Some(rotation) = self.logging.rotation.as_deref()
            && !matches!(rotation, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never, daily, hourly");
        }

        Ok(())
    }
}
