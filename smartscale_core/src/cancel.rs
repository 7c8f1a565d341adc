//! Cancellation signal shared with the falling-edge interrupt.
//!
//! The flag is the only state crossing the interrupt boundary. The handler
//! stores `true` and nothing else; the calibration loop reacts on its next
//! check.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use eyre::WrapErr;
use smartscale_traits::{DigitalPins, EdgeHandler, PinMode};

use crate::error::Result;
use crate::hw_error;

#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    raised: Arc<AtomicBool>,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&self) {
        self.raised.store(false, Ordering::SeqCst);
    }

    pub fn trip(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }

    /// Edge handler that only raises this flag.
    pub fn handler(&self) -> EdgeHandler {
        let raised = Arc::clone(&self.raised);
        Box::new(move || raised.store(true, Ordering::SeqCst))
    }
}

/// Falling-edge interrupt armed on the cancellation pin for the length of a
/// session. Disarming detaches the handler and puts back the pin mode found
/// when arming; dropping an armed guard does the same, best effort.
pub struct ArmedInterrupt<'a, P: DigitalPins> {
    pins: &'a mut P,
    pin: u8,
    prior_mode: PinMode,
    armed: bool,
}

impl<'a, P: DigitalPins> ArmedInterrupt<'a, P> {
    pub fn arm(pins: &'a mut P, pin: u8, signal: &CancelSignal) -> Result<Self> {
        let prior_mode = pins.get_mode(pin);
        pins.set_mode(pin, PinMode::InputPullUp)
            .map_err(hw_error::report)
            .wrap_err_with(|| format!("configure cancel pin {pin}"))?;
        if let Err(e) = pins.attach_falling_edge(pin, signal.handler()) {
            if let Err(restore) = pins.set_mode(pin, prior_mode) {
                tracing::warn!(pin, error = %restore, "restoring cancel pin mode failed");
            }
            return Err(hw_error::report(e).wrap_err(format!("attach cancel interrupt on pin {pin}")));
        }
        tracing::debug!(pin, ?prior_mode, "cancel interrupt armed");
        Ok(Self {
            pins,
            pin,
            prior_mode,
            armed: true,
        })
    }

    pub fn pin(&self) -> u8 {
        self.pin
    }

    pub fn disarm(mut self) -> Result<()> {
        self.release()
    }

    fn release(&mut self) -> Result<()> {
        if !self.armed {
            return Ok(());
        }
        self.armed = false;
        let detached = self
            .pins
            .detach(self.pin)
            .map_err(hw_error::report)
            .wrap_err_with(|| format!("detach cancel interrupt on pin {}", self.pin));
        self.pins
            .set_mode(self.pin, self.prior_mode)
            .map_err(hw_error::report)
            .wrap_err_with(|| format!("restore mode of pin {}", self.pin))?;
        detached?;
        tracing::debug!(pin = self.pin, mode = ?self.prior_mode, "cancel interrupt disarmed");
        Ok(())
    }
}

impl<P: DigitalPins> Drop for ArmedInterrupt<'_, P> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::warn!(pin = self.pin, error = %e, "disarming cancel interrupt failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smartscale_hardware::SimulatedPins;
    use smartscale_traits::Level;

    #[test]
    fn handler_only_raises_the_flag() {
        let signal = CancelSignal::new();
        let handler = signal.handler();
        assert!(!signal.is_raised());
        handler();
        assert!(signal.is_raised());
        signal.clear();
        assert!(!signal.is_raised());
    }

    #[test]
    fn arming_routes_falling_edges_and_disarm_restores_mode() {
        let mut pins = SimulatedPins::new();
        let probe = pins.clone();
        let signal = CancelSignal::new();

        let armed = ArmedInterrupt::arm(&mut pins, 2, &signal).unwrap();
        assert_eq!(probe.get_mode(2), PinMode::InputPullUp);
        probe.set_level(2, Level::Low);
        assert!(signal.is_raised());
        armed.disarm().unwrap();

        assert!(!probe.has_edge_handler(2));
        assert_eq!(probe.get_mode(2), PinMode::Input);
    }

    #[test]
    fn dropping_the_guard_disarms() {
        let mut pins = SimulatedPins::new();
        let probe = pins.clone();
        let signal = CancelSignal::new();
        pins.set_mode(2, PinMode::Output).unwrap();
        {
            let _armed = ArmedInterrupt::arm(&mut pins, 2, &signal).unwrap();
            assert!(probe.has_edge_handler(2));
        }
        assert!(!probe.has_edge_handler(2));
        assert_eq!(probe.get_mode(2), PinMode::Output);
    }
}
