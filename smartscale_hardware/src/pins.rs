//! Digital pin banks: a shared simulated bank and (feature `hardware`) rppal GPIO.

use smartscale_traits::{BoxError, DigitalPins, EdgeHandler, Level, PinMode};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

type SharedHandler = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct SimPin {
    driven: Option<Level>,
    mode: PinMode,
    reads: u64,
    handler: Option<SharedHandler>,
}

impl SimPin {
    /// Level seen by a reader: the driven level, or the idle level of the mode.
    fn level(&self) -> Level {
        match self.driven {
            Some(level) => level,
            None if self.mode == PinMode::InputPullUp => Level::High,
            None => Level::Low,
        }
    }
}

/// Simulated GPIO bank. Clones share state, so a test (or another thread
/// playing the part of an interrupt source) can drive levels while the core
/// owns its own handle.
#[derive(Clone, Default)]
pub struct SimulatedPins {
    bank: Arc<Mutex<HashMap<u8, SimPin>>>,
}

impl SimulatedPins {
    pub fn new() -> Self {
        Self::default()
    }

    fn bank(&self) -> MutexGuard<'_, HashMap<u8, SimPin>> {
        // A poisoned bank only means a panicking test thread; the map is still usable.
        self.bank.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Drive `pin` to `level`. A HIGH to LOW change fires the attached
    /// falling-edge handler, outside the bank lock.
    pub fn set_level(&self, pin: u8, level: Level) {
        let fire = {
            let mut bank = self.bank();
            let slot = bank.entry(pin).or_default();
            let previous = slot.level();
            slot.driven = Some(level);
            if previous == Level::High && level == Level::Low {
                slot.handler.clone()
            } else {
                None
            }
        };
        if let Some(handler) = fire {
            tracing::trace!(pin, "simulated falling edge");
            handler();
        }
    }

    pub fn level(&self, pin: u8) -> Level {
        self.bank().get(&pin).map(SimPin::level).unwrap_or(Level::Low)
    }

    /// Number of `read` calls observed on `pin`.
    pub fn read_count(&self, pin: u8) -> u64 {
        self.bank().get(&pin).map(|p| p.reads).unwrap_or(0)
    }

    pub fn has_edge_handler(&self, pin: u8) -> bool {
        self.bank()
            .get(&pin)
            .is_some_and(|p| p.handler.is_some())
    }
}

impl DigitalPins for SimulatedPins {
    fn set_mode(&mut self, pin: u8, mode: PinMode) -> Result<(), BoxError> {
        self.bank().entry(pin).or_default().mode = mode;
        Ok(())
    }

    fn get_mode(&self, pin: u8) -> PinMode {
        self.bank().get(&pin).map(|p| p.mode).unwrap_or_default()
    }

    fn read(&self, pin: u8) -> Level {
        let mut bank = self.bank();
        let slot = bank.entry(pin).or_default();
        slot.reads += 1;
        slot.level()
    }

    fn attach_falling_edge(&mut self, pin: u8, handler: EdgeHandler) -> Result<(), BoxError> {
        self.bank().entry(pin).or_default().handler = Some(Arc::from(handler));
        Ok(())
    }

    fn detach(&mut self, pin: u8) -> Result<(), BoxError> {
        if let Some(slot) = self.bank().get_mut(&pin) {
            slot.handler = None;
        }
        Ok(())
    }
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub use rpi::RppalPins;

#[cfg(all(feature = "hardware", target_os = "linux"))]
mod rpi {
    use super::*;
    use crate::error::HwError;
    use rppal::gpio::{Gpio, InputPin, OutputPin, Trigger};

    enum Slot {
        Input { pin: InputPin, mode: PinMode },
        Output(OutputPin),
    }

    /// Raspberry Pi GPIO bank. Pins are claimed lazily by `set_mode`.
    pub struct RppalPins {
        gpio: Gpio,
        slots: HashMap<u8, Slot>,
    }

    impl RppalPins {
        pub fn new() -> Result<Self, HwError> {
            let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
            Ok(Self {
                gpio,
                slots: HashMap::new(),
            })
        }
    }

    fn to_level(level: rppal::gpio::Level) -> Level {
        match level {
            rppal::gpio::Level::High => Level::High,
            rppal::gpio::Level::Low => Level::Low,
        }
    }

    impl DigitalPins for RppalPins {
        fn set_mode(&mut self, pin: u8, mode: PinMode) -> Result<(), BoxError> {
            // Release any previous claim before re-acquiring in the new mode.
            self.slots.remove(&pin);
            let raw = self
                .gpio
                .get(pin)
                .map_err(|e| HwError::Gpio(format!("open pin {pin}: {e}")))?;
            let slot = match mode {
                PinMode::Input => Slot::Input {
                    pin: raw.into_input(),
                    mode,
                },
                PinMode::InputPullUp => Slot::Input {
                    pin: raw.into_input_pullup(),
                    mode,
                },
                PinMode::Output => Slot::Output(raw.into_output()),
            };
            self.slots.insert(pin, slot);
            tracing::debug!(pin, ?mode, "gpio mode set");
            Ok(())
        }

        fn get_mode(&self, pin: u8) -> PinMode {
            match self.slots.get(&pin) {
                Some(Slot::Input { mode, .. }) => *mode,
                Some(Slot::Output(_)) => PinMode::Output,
                None => PinMode::Input,
            }
        }

        fn read(&self, pin: u8) -> Level {
            match self.slots.get(&pin) {
                Some(Slot::Input { pin, .. }) => to_level(pin.read()),
                Some(Slot::Output(out)) => Level::from(out.is_set_high()),
                None => Level::Low,
            }
        }

        fn attach_falling_edge(
            &mut self,
            pin: u8,
            handler: EdgeHandler,
        ) -> Result<(), BoxError> {
            match self.slots.get_mut(&pin) {
                Some(Slot::Input { pin: input, .. }) => {
                    input
                        .set_async_interrupt(Trigger::FallingEdge, move |_| handler())
                        .map_err(|e| HwError::Gpio(format!("interrupt on pin {pin}: {e}")))?;
                    Ok(())
                }
                _ => Err(Box::new(HwError::Gpio(format!(
                    "pin {pin} is not configured as an input"
                )))),
            }
        }

        fn detach(&mut self, pin: u8) -> Result<(), BoxError> {
            if let Some(Slot::Input { pin: input, .. }) = self.slots.get_mut(&pin) {
                input
                    .clear_async_interrupt()
                    .map_err(|e| HwError::Gpio(format!("clear interrupt on pin {pin}: {e}")))?;
            }
            Ok(())
        }
    }
}
