//! Device wiring: the input registry and the calibration controller over one
//! pin bank, assembled by `ScaleDeviceBuilder`.
//!
//! Every input is registered while the device is built, so capacity and
//! duplicate-key mistakes surface from `try_build()` at startup and never
//! from the polling loop.

use std::fmt;
use std::sync::Arc;

use smartscale_traits::clock::{Clock, MonotonicClock};
use smartscale_traits::{DigitalPins, Display, FactorStore, LoadCell};

use crate::calibration::Calibrator;
use crate::cancel::CancelSignal;
use crate::config::{CalibrationCfg, InputCfg};
use crate::encoder::{EncoderDefinition, EncoderId};
use crate::error::{BuildError, Result};
use crate::input::{ButtonDefinition, ButtonId, InputRegistry};
use crate::status::CalibrationOutcome;

pub struct ScaleDevice<P: DigitalPins> {
    inputs: InputRegistry<P>,
    calibrator: Calibrator,
    clock: Arc<dyn Clock + Send + Sync>,
    input_cfg: InputCfg,
    hx711_pins: (u8, u8),
}

impl<P: DigitalPins> fmt::Debug for ScaleDevice<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScaleDevice")
            .field("inputs", &self.inputs)
            .field("calibrator", &self.calibrator)
            .field("input_cfg", &self.input_cfg)
            .field("hx711_pins", &self.hx711_pins)
            .finish_non_exhaustive()
    }
}

impl<P: DigitalPins> ScaleDevice<P> {
    pub fn builder() -> ScaleDeviceBuilder<P> {
        ScaleDeviceBuilder::default()
    }

    /// Attach the load cell and apply the persisted factor (0.0 when unset).
    pub fn init(&mut self) -> Result<f32> {
        let (dout, sck) = self.hx711_pins;
        self.calibrator.attach_load_cell(dout, sck)
    }

    pub fn register_button(&mut self, def: ButtonDefinition) -> Result<ButtonId> {
        self.inputs.register_button(def)
    }

    pub fn register_encoder(&mut self, def: EncoderDefinition) -> Result<EncoderId> {
        self.inputs.register_encoder(def)
    }

    /// One control-loop tick.
    pub fn poll_inputs(&mut self) {
        self.inputs.poll_all();
    }

    /// Poll `ticks` times, sleeping the configured interval between ticks.
    pub fn poll_for(&mut self, ticks: u64) {
        self.poll_for_with(ticks, |_| {});
    }

    /// As `poll_for`, calling `before_tick` with the tick number ahead of each poll.
    pub fn poll_for_with(&mut self, ticks: u64, mut before_tick: impl FnMut(u64)) {
        for tick in 0..ticks {
            if tick > 0 {
                self.clock.sleep(self.input_cfg.poll_interval);
            }
            before_tick(tick);
            self.inputs.poll_all();
        }
    }

    /// Blocking calibration session against `reference_g` grams.
    pub fn calibrate(&mut self, reference_g: f32) -> Result<CalibrationOutcome> {
        self.calibrator
            .calibrate(self.inputs.pins_mut(), reference_g)
    }

    pub fn cancel_signal(&self) -> CancelSignal {
        self.calibrator.cancel_signal()
    }

    pub fn scale_factor(&self) -> f32 {
        self.calibrator.scale_factor()
    }

    pub fn inputs(&self) -> &InputRegistry<P> {
        &self.inputs
    }

    pub fn calibrator(&self) -> &Calibrator {
        &self.calibrator
    }

    pub fn input_cfg(&self) -> &InputCfg {
        &self.input_cfg
    }
}

/// Builder for `ScaleDevice`. Everything is validated in `try_build()`.
pub struct ScaleDeviceBuilder<P> {
    pins: Option<P>,
    load_cell: Option<Box<dyn LoadCell>>,
    display: Option<Box<dyn Display>>,
    store: Option<Box<dyn FactorStore>>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    hx711_pins: Option<(u8, u8)>,
    cancel_pin: Option<u8>,
    calibration: Option<CalibrationCfg>,
    input: Option<InputCfg>,
    buttons: Vec<ButtonDefinition>,
    encoders: Vec<EncoderDefinition>,
}

impl<P> Default for ScaleDeviceBuilder<P> {
    fn default() -> Self {
        Self {
            pins: None,
            load_cell: None,
            display: None,
            store: None,
            clock: None,
            hx711_pins: None,
            cancel_pin: None,
            calibration: None,
            input: None,
            buttons: Vec::new(),
            encoders: Vec::new(),
        }
    }
}

impl<P: DigitalPins> ScaleDeviceBuilder<P> {
    pub fn with_pins(mut self, pins: P) -> Self {
        self.pins = Some(pins);
        self
    }

    pub fn with_load_cell(mut self, load_cell: impl LoadCell + 'static) -> Self {
        self.load_cell = Some(Box::new(load_cell));
        self
    }

    pub fn with_display(mut self, display: impl Display + 'static) -> Self {
        self.display = Some(Box::new(display));
        self
    }

    pub fn with_store(mut self, store: impl FactorStore + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    /// Inject a custom clock (tests use `ManualClock`). Defaults to `MonotonicClock`.
    pub fn with_clock(mut self, clock: impl Clock + Send + Sync + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    pub fn with_hx711_pins(mut self, dout: u8, sck: u8) -> Self {
        self.hx711_pins = Some((dout, sck));
        self
    }

    pub fn with_cancel_pin(mut self, pin: u8) -> Self {
        self.cancel_pin = Some(pin);
        self
    }

    pub fn with_calibration(mut self, cfg: CalibrationCfg) -> Self {
        self.calibration = Some(cfg);
        self
    }

    pub fn with_input(mut self, cfg: InputCfg) -> Self {
        self.input = Some(cfg);
        self
    }

    pub fn with_button(mut self, def: ButtonDefinition) -> Self {
        self.buttons.push(def);
        self
    }

    pub fn with_encoder(mut self, def: EncoderDefinition) -> Self {
        self.encoders.push(def);
        self
    }

    /// Take pins, calibration and polling settings from a validated config
    /// file. Inputs are left to the caller, which owns the callbacks.
    pub fn with_config(self, cfg: &smartscale_config::Config) -> Self {
        self.with_hx711_pins(cfg.pins.hx711_dout, cfg.pins.hx711_sck)
            .with_cancel_pin(cfg.pins.cancel)
            .with_calibration(CalibrationCfg::from(&cfg.calibration))
            .with_input(InputCfg::from(&cfg.input))
    }

    /// Fallible build; returns a `BuildError` for missing pieces, bad
    /// calibration settings, or inputs that do not fit the registry.
    pub fn try_build(self) -> Result<ScaleDevice<P>> {
        let pins = self
            .pins
            .ok_or_else(|| eyre::Report::new(BuildError::MissingPins))?;
        let load_cell = self
            .load_cell
            .ok_or_else(|| eyre::Report::new(BuildError::MissingLoadCell))?;
        let display = self
            .display
            .ok_or_else(|| eyre::Report::new(BuildError::MissingDisplay))?;
        let store = self
            .store
            .ok_or_else(|| eyre::Report::new(BuildError::MissingStore))?;
        let hx711_pins = self
            .hx711_pins
            .ok_or_else(|| eyre::Report::new(BuildError::InvalidConfig("hx711 pins not set")))?;
        let cancel_pin = self
            .cancel_pin
            .ok_or_else(|| eyre::Report::new(BuildError::InvalidConfig("cancel pin not set")))?;

        let calibration = self.calibration.unwrap_or_default();
        validate_calibration(&calibration)?;
        let input_cfg = self.input.unwrap_or_default();
        if input_cfg.poll_interval.is_zero() {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "poll interval must be > 0",
            )));
        }

        let clock: Arc<dyn Clock + Send + Sync> = match self.clock {
            Some(c) => c,
            None => Arc::new(MonotonicClock::new()),
        };

        let mut inputs = InputRegistry::new(pins);
        for def in self.buttons {
            inputs.register_button(def)?;
        }
        for def in self.encoders {
            inputs.register_encoder(def)?;
        }

        let calibrator = Calibrator::new(
            load_cell,
            display,
            store,
            Arc::clone(&clock),
            cancel_pin,
            calibration,
        );
        Ok(ScaleDevice {
            inputs,
            calibrator,
            clock,
            input_cfg,
            hx711_pins,
        })
    }
}

fn validate_calibration(cfg: &CalibrationCfg) -> Result<()> {
    if !(cfg.tolerance_g.is_finite() && cfg.tolerance_g > 0.0) {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "tolerance_g must be > 0",
        )));
    }
    if !(cfg.error_ceiling.is_finite() && cfg.error_ceiling > 0.0) {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "error_ceiling must be > 0",
        )));
    }
    if !(cfg.max_step.is_finite() && cfg.max_step > 0.0) {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "max_step must be > 0",
        )));
    }
    if !cfg.seed_factor.is_finite() || cfg.seed_factor == 0.0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "seed_factor must be finite and non-zero",
        )));
    }
    if cfg.baseline_reads == 0 || cfg.sample_count == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "read counts must be >= 1",
        )));
    }
    if cfg.max_iterations == Some(0) {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "max_iterations must be >= 1 when set",
        )));
    }
    Ok(())
}
