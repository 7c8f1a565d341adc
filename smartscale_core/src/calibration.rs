//! Adaptive-step calibration controller.
//!
//! A session walks `Preparing -> Baselining -> Searching` and ends in
//! `Completed` (factor persisted) or `Aborted` (prior factor restored). The
//! search adjusts the scale factor by a step proportional to the current
//! error, saturating at `max_step` once the error reaches `error_ceiling`:
//!
//! ```text
//! step = max_step * min(|sample - reference| / error_ceiling, 1)
//! ```
//!
//! The factor moves up when the sample reads heavy and down when it reads
//! light, since reported weight falls as the factor grows.
//!
//! Cancellation is cooperative. The falling-edge handler only raises the
//! shared flag; the search checks it at the top of every iteration, so the
//! session aborts before any further read once the flag is up.

use std::fmt;
use std::sync::Arc;

use eyre::WrapErr;
use smartscale_traits::{Clock, DigitalPins, Display, FactorStore, LoadCell};
use tracing::{debug, info, warn};

use crate::cancel::{ArmedInterrupt, CancelSignal};
use crate::config::CalibrationCfg;
use crate::error::{AbortReason, Result, ScaleError};
use crate::hw_error;
use crate::status::CalibrationOutcome;
use crate::util::{LCD_COLS, fit_line};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CalibrationState {
    Preparing,
    Baselining,
    Searching,
    Completed,
    Aborted,
}

/// Working state of one calibration invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationSession {
    pub state: CalibrationState,
    pub reference_g: f32,
    pub scale_factor: f32,
    pub sample_g: f32,
    pub step: f32,
    pub sample_count: u8,
    pub baseline: i64,
    pub cancelled: bool,
    pub iterations: u32,
}

impl CalibrationSession {
    pub fn new(reference_g: f32, cfg: &CalibrationCfg) -> Self {
        Self {
            state: CalibrationState::Preparing,
            reference_g,
            scale_factor: cfg.seed_factor,
            sample_g: 0.0,
            step: 0.0,
            sample_count: cfg.sample_count,
            baseline: 0,
            cancelled: false,
            iterations: 0,
        }
    }
}

/// Factor adjustment for an absolute error of `abs_delta` units.
#[inline]
pub fn step_size(abs_delta: f32, cfg: &CalibrationCfg) -> f32 {
    cfg.max_step * (abs_delta / cfg.error_ceiling).min(1.0)
}

/// Stored factor, or 0.0 when the store has never been written.
pub fn load_persisted_factor(store: &mut dyn FactorStore) -> Result<f32> {
    let factor = store
        .load_factor()
        .map_err(hw_error::report)
        .wrap_err("loading scale factor")?;
    if factor.is_finite() {
        Ok(factor)
    } else {
        warn!(stored = factor, "no usable scale factor stored; defaulting to 0.0");
        Ok(0.0)
    }
}

/// Write `text` on `row`, padded to the full display width.
pub fn show(display: &mut dyn Display, row: u8, text: &str) -> Result<()> {
    display
        .set_cursor(0, row)
        .map_err(hw_error::report)
        .wrap_err("positioning display cursor")?;
    display
        .print(&fit_line(text, LCD_COLS))
        .map_err(hw_error::report)
        .wrap_err("writing to display")
}

/// Owns the load cell, display and factor store; runs calibration sessions
/// against a borrowed pin bank.
pub struct Calibrator {
    load_cell: Box<dyn LoadCell>,
    display: Box<dyn Display>,
    store: Box<dyn FactorStore>,
    clock: Arc<dyn Clock + Send + Sync>,
    cancel: CancelSignal,
    cancel_pin: u8,
    cfg: CalibrationCfg,
    last_session: Option<CalibrationSession>,
}

impl fmt::Debug for Calibrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Calibrator")
            .field("cancel_pin", &self.cancel_pin)
            .field("cfg", &self.cfg)
            .field("scale_factor", &self.load_cell.scale_factor())
            .field("last_session", &self.last_session)
            .finish_non_exhaustive()
    }
}

impl Calibrator {
    pub fn new(
        load_cell: Box<dyn LoadCell>,
        display: Box<dyn Display>,
        store: Box<dyn FactorStore>,
        clock: Arc<dyn Clock + Send + Sync>,
        cancel_pin: u8,
        cfg: CalibrationCfg,
    ) -> Self {
        Self {
            load_cell,
            display,
            store,
            clock,
            cancel: CancelSignal::new(),
            cancel_pin,
            cfg,
            last_session: None,
        }
    }

    pub fn cfg(&self) -> &CalibrationCfg {
        &self.cfg
    }

    /// Handle on the shared cancellation flag.
    pub fn cancel_signal(&self) -> CancelSignal {
        self.cancel.clone()
    }

    pub fn scale_factor(&self) -> f32 {
        self.load_cell.scale_factor()
    }

    /// State of the most recent session, kept after it ends.
    pub fn last_session(&self) -> Option<&CalibrationSession> {
        self.last_session.as_ref()
    }

    /// Bind the load cell to its pins and apply the persisted factor.
    pub fn attach_load_cell(&mut self, dout_pin: u8, clk_pin: u8) -> Result<f32> {
        self.load_cell
            .attach(dout_pin, clk_pin)
            .map_err(hw_error::report)
            .wrap_err_with(|| format!("attach load cell (dout {dout_pin}, sck {clk_pin})"))?;
        let factor = load_persisted_factor(self.store.as_mut())?;
        self.apply_factor(factor)?;
        info!(factor, "scale factor loaded");
        Ok(factor)
    }

    /// Run one blocking session against a reference weight of `reference_g`.
    ///
    /// Cancellation and the optional iteration cap end in
    /// `Ok(CalibrationOutcome::Aborted { .. })`. Collaborator failures are
    /// returned as errors after the prior factor has been put back (best
    /// effort) and the interrupt disarmed.
    pub fn calibrate<P: DigitalPins>(
        &mut self,
        pins: &mut P,
        reference_g: f32,
    ) -> Result<CalibrationOutcome> {
        if !(reference_g.is_finite() && reference_g > 0.0) {
            return Err(eyre::Report::new(ScaleError::Config(format!(
                "reference weight must be a positive number of grams, got {reference_g}"
            ))));
        }

        let prior_factor = self.load_cell.scale_factor();
        let mut session = CalibrationSession::new(reference_g, &self.cfg);
        self.cancel.clear();
        info!(reference_g, prior_factor, "calibration started");

        let result = self.run_session(pins, &mut session, prior_factor);
        if let Err(e) = &result {
            warn!(error = %e, state = ?session.state, "calibration failed");
            if let Err(restore) = self.load_cell.set_scale_factor(prior_factor) {
                warn!(error = %restore, prior_factor, "restoring prior factor failed");
            }
        }
        self.last_session = Some(session);
        result
    }

    fn run_session<P: DigitalPins>(
        &mut self,
        pins: &mut P,
        session: &mut CalibrationSession,
        prior_factor: f32,
    ) -> Result<CalibrationOutcome> {
        self.enter(session, CalibrationState::Preparing);
        self.screen("Calibrating", "Clear the scale")?;
        self.clock.sleep(self.cfg.settle);
        let armed = ArmedInterrupt::arm(pins, self.cancel_pin, &self.cancel)?;

        self.enter(session, CalibrationState::Baselining);
        self.apply_factor(1.0)?;
        self.load_cell
            .tare()
            .map_err(hw_error::report)
            .wrap_err("tare")?;
        session.baseline = self
            .load_cell
            .read_raw_average(self.cfg.baseline_reads)
            .map_err(hw_error::report)
            .wrap_err("reading baseline")?;
        debug!(baseline = session.baseline, "baseline taken");
        self.screen("Place weight", &format!("{reference_g:.1} g", reference_g = session.reference_g))?;
        self.clock.sleep(self.cfg.place_settle);

        self.enter(session, CalibrationState::Searching);
        session.scale_factor = self.cfg.seed_factor;
        self.apply_factor(session.scale_factor)?;
        let abort = self.search(session)?;

        let outcome = match abort {
            None => {
                self.enter(session, CalibrationState::Completed);
                self.store
                    .store_factor(session.scale_factor)
                    .map_err(hw_error::report)
                    .wrap_err("storing factor")?;
                info!(
                    factor = session.scale_factor,
                    iterations = session.iterations,
                    "calibration complete"
                );
                self.screen("Calibrated", &format!("factor {:.2}", session.scale_factor))?;
                CalibrationOutcome::Completed {
                    factor: session.scale_factor,
                    iterations: session.iterations,
                    baseline: session.baseline,
                }
            }
            Some(reason) => {
                self.enter(session, CalibrationState::Aborted);
                self.apply_factor(prior_factor)?;
                info!(%reason, prior_factor, iterations = session.iterations, "calibration aborted");
                let detail = match reason {
                    AbortReason::Cancelled => "cancelled",
                    AbortReason::IterationLimit => "not converged",
                };
                self.screen("Calibration", detail)?;
                CalibrationOutcome::Aborted {
                    reason,
                    restored_factor: prior_factor,
                    iterations: session.iterations,
                }
            }
        };
        self.clock.sleep(self.cfg.dwell);
        armed.disarm()?;
        Ok(outcome)
    }

    /// Searching loop; `Ok(None)` once the sample is within tolerance.
    fn search(&mut self, session: &mut CalibrationSession) -> Result<Option<AbortReason>> {
        loop {
            if self.cancel.is_raised() {
                session.cancelled = true;
                return Ok(Some(AbortReason::Cancelled));
            }
            if let Some(max) = self.cfg.max_iterations
                && session.iterations >= max
            {
                return Ok(Some(AbortReason::IterationLimit));
            }

            let sample = self.sample(session.sample_count)?;
            session.iterations += 1;
            session.sample_g = sample;
            let delta = sample - session.reference_g;
            if delta.abs() <= self.cfg.tolerance_g {
                return Ok(None);
            }

            session.step = step_size(delta.abs(), &self.cfg);
            if sample > session.reference_g {
                session.scale_factor += session.step;
            } else {
                session.scale_factor -= session.step;
            }
            debug!(
                iteration = session.iterations,
                sample_g = sample,
                delta_g = delta,
                step = session.step,
                factor = session.scale_factor,
                "search step"
            );
            self.apply_factor(session.scale_factor)?;
        }
    }

    /// Averaged unit sample with negative readings clamped to zero.
    fn sample(&mut self, count: u8) -> Result<f32> {
        let raw = self
            .load_cell
            .read_units(count)
            .map_err(hw_error::report)
            .wrap_err("reading units")?;
        if raw < 0.0 {
            debug!(sample_g = raw, "negative sample clamped");
        }
        Ok(raw.max(0.0))
    }

    fn apply_factor(&mut self, factor: f32) -> Result<()> {
        self.load_cell
            .set_scale_factor(factor)
            .map_err(hw_error::report)
            .wrap_err_with(|| format!("applying scale factor {factor}"))
    }

    fn enter(&self, session: &mut CalibrationSession, state: CalibrationState) {
        session.state = state;
        info!(?state, "calibration state");
    }

    fn screen(&mut self, top: &str, bottom: &str) -> Result<()> {
        self.display
            .clear()
            .map_err(hw_error::report)
            .wrap_err("clearing display")?;
        show(self.display.as_mut(), 0, top)?;
        show(self.display.as_mut(), 1, bottom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smartscale_hardware::MemoryFactorStore;

    #[test]
    fn step_is_proportional_then_saturates() {
        let cfg = CalibrationCfg::default();
        assert_eq!(step_size(0.0, &cfg), 0.0);
        assert!((step_size(500.0, &cfg) - 10.0).abs() < 1e-6);
        assert_eq!(step_size(1_000.0, &cfg), 20.0);
        assert_eq!(step_size(40_000.0, &cfg), 20.0);
    }

    #[test]
    fn unset_store_defaults_to_zero() {
        let mut store = MemoryFactorStore::new();
        assert_eq!(load_persisted_factor(&mut store).unwrap(), 0.0);
        let mut store = MemoryFactorStore::with_factor(417.5);
        assert_eq!(load_persisted_factor(&mut store).unwrap(), 417.5);
    }

    #[test]
    fn session_starts_preparing_at_seed() {
        let cfg = CalibrationCfg {
            seed_factor: 3.0,
            sample_count: 7,
            ..CalibrationCfg::default()
        };
        let session = CalibrationSession::new(100.0, &cfg);
        assert_eq!(session.state, CalibrationState::Preparing);
        assert_eq!(session.scale_factor, 3.0);
        assert_eq!(session.sample_count, 7);
        assert!(!session.cancelled);
    }
}
