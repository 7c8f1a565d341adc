//! Debounced input registry.
//!
//! Buttons and encoders are registered once at startup into fixed-capacity
//! storage and polled every control-loop tick. Edge detection is a plain
//! level comparison against the last reading; there is no debounce timer, so
//! callers must poll at a steady interval.
//!
//! Registration order is poll order: `poll_all` visits every top-level
//! button in registration order, then decodes every encoder in registration
//! order.

use std::fmt;
use std::sync::Arc;

use eyre::WrapErr;
use smartscale_traits::{DigitalPins, Level, PinMode};

use crate::encoder::{EncoderChildren, EncoderDefinition, EncoderId};
use crate::error::{BuildError, Result};
use crate::hw_error;

/// Button slots available in the reference device.
pub const DEFAULT_MAX_BUTTONS: usize = 4;
/// Encoder slots available in the reference device.
pub const DEFAULT_MAX_ENCODERS: usize = 1;

/// State reported to a button callback on a level change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonState {
    Pressed,
    Depressed,
}

impl fmt::Display for ButtonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ButtonState::Pressed => f.write_str("Pressed"),
            ButtonState::Depressed => f.write_str("Depressed"),
        }
    }
}

/// Called with the button key and the transition on every level change.
pub type ButtonCallback = Arc<dyn Fn(&str, ButtonState) + Send + Sync>;

/// Stable handle to a registered button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ButtonId(pub(crate) usize);

impl ButtonId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Clone)]
pub struct ButtonDefinition {
    key: String,
    pin: u8,
    pull_up: bool,
    callback: Option<ButtonCallback>,
    idle_level: Level,
    last_level: Level,
    encoder: Option<EncoderId>,
}

impl fmt::Debug for ButtonDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ButtonDefinition")
            .field("key", &self.key)
            .field("pin", &self.pin)
            .field("pull_up", &self.pull_up)
            .field("has_callback", &self.callback.is_some())
            .field("idle_level", &self.idle_level)
            .field("last_level", &self.last_level)
            .field("encoder", &self.encoder)
            .finish()
    }
}

impl ButtonDefinition {
    pub fn new(key: impl Into<String>, pin: u8, pull_up: bool) -> Self {
        let idle = Level::from(pull_up);
        Self {
            key: key.into(),
            pin,
            pull_up,
            callback: None,
            idle_level: idle,
            last_level: idle,
            encoder: None,
        }
    }

    pub fn with_callback(self, callback: impl Fn(&str, ButtonState) + Send + Sync + 'static) -> Self {
        self.with_shared_callback(Arc::new(callback))
    }

    pub fn with_shared_callback(mut self, callback: ButtonCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn pin(&self) -> u8 {
        self.pin
    }

    pub fn pull_up(&self) -> bool {
        self.pull_up
    }

    /// Level seen on the previous poll (or the seeded level after registration).
    pub fn last_level(&self) -> Level {
        self.last_level
    }

    /// Owning encoder for the two rotation channels; `None` for top-level buttons.
    pub fn encoder(&self) -> Option<EncoderId> {
        self.encoder
    }

    /// Level of a released button. HIGH with the pull-up; for plain inputs
    /// the level read at registration (LOW until then).
    pub fn idle_level(&self) -> Level {
        self.idle_level
    }

    /// Transition reported when the level being left is `left`.
    fn transition_from(&self, left: Level) -> ButtonState {
        if left == self.idle_level {
            ButtonState::Pressed
        } else {
            ButtonState::Depressed
        }
    }
}

/// Fixed-capacity registry of buttons and encoders over a pin bank.
pub struct InputRegistry<
    P,
    const BUTTONS: usize = DEFAULT_MAX_BUTTONS,
    const ENCODERS: usize = DEFAULT_MAX_ENCODERS,
> {
    pins: P,
    pub(crate) buttons: heapless::Vec<ButtonDefinition, BUTTONS>,
    pub(crate) encoders: heapless::Vec<EncoderDefinition, ENCODERS>,
}

impl<P, const BUTTONS: usize, const ENCODERS: usize> fmt::Debug
    for InputRegistry<P, BUTTONS, ENCODERS>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputRegistry")
            .field("buttons", &self.buttons)
            .field("encoders", &self.encoders)
            .finish_non_exhaustive()
    }
}

impl<P: DigitalPins, const BUTTONS: usize, const ENCODERS: usize>
    InputRegistry<P, BUTTONS, ENCODERS>
{
    pub fn new(pins: P) -> Self {
        Self {
            pins,
            buttons: heapless::Vec::new(),
            encoders: heapless::Vec::new(),
        }
    }

    pub fn pins(&self) -> &P {
        &self.pins
    }

    pub fn pins_mut(&mut self) -> &mut P {
        &mut self.pins
    }

    pub fn button(&self, id: ButtonId) -> Option<&ButtonDefinition> {
        self.buttons.get(id.0)
    }

    pub fn buttons(&self) -> impl Iterator<Item = &ButtonDefinition> {
        self.buttons.iter()
    }

    pub fn find_button(&self, key: &str) -> Option<ButtonId> {
        self.buttons.iter().position(|b| b.key == key).map(ButtonId)
    }

    pub fn button_count(&self) -> usize {
        self.buttons.len()
    }

    pub fn encoder_count(&self) -> usize {
        self.encoders.len()
    }

    fn key_taken(&self, key: &str) -> bool {
        self.buttons.iter().any(|b| b.key == key) || self.encoders.iter().any(|e| e.key() == key)
    }

    /// Configure the pin, seed the last level and append the button.
    ///
    /// Pull-up inputs seed HIGH; plain inputs are read once. The seed is also
    /// the button's idle level, so a plain input wired to an external pull-up
    /// reports `Pressed` when pulled LOW.
    pub fn register_button(&mut self, def: ButtonDefinition) -> Result<ButtonId> {
        if self.key_taken(&def.key) {
            return Err(eyre::Report::new(BuildError::DuplicateKey(def.key)));
        }
        if self.buttons.is_full() {
            return Err(eyre::Report::new(BuildError::CapacityExceeded {
                what: "buttons",
                capacity: BUTTONS,
            }));
        }
        self.insert_button(def)
    }

    pub(crate) fn insert_button(&mut self, mut def: ButtonDefinition) -> Result<ButtonId> {
        let pin = def.pin;
        self.pins
            .set_mode(pin, PinMode::for_button(def.pull_up))
            .map_err(hw_error::report)
            .wrap_err_with(|| format!("configure pin {pin} for '{}'", def.key))?;
        let seed = if def.pull_up {
            Level::High
        } else {
            self.pins.read(pin)
        };
        def.idle_level = seed;
        def.last_level = seed;
        tracing::debug!(key = %def.key, pin, pull_up = def.pull_up, seed = ?def.last_level, "button registered");

        let id = ButtonId(self.buttons.len());
        self.buttons.push(def).map_err(|_| {
            eyre::Report::new(BuildError::CapacityExceeded {
                what: "buttons",
                capacity: BUTTONS,
            })
        })?;
        Ok(id)
    }

    /// Synthesize and register the encoder's three child buttons, then append
    /// the encoder itself.
    ///
    /// Child slots, the encoder slot and keys are checked up front. A pin that
    /// fails to configure part way through rolls back the children already
    /// added and restores their pin modes, so a rejected encoder leaves the
    /// registry untouched.
    pub fn register_encoder(&mut self, mut def: EncoderDefinition) -> Result<EncoderId> {
        if self.encoders.is_full() {
            return Err(eyre::Report::new(BuildError::CapacityExceeded {
                what: "encoders",
                capacity: ENCODERS,
            }));
        }
        if BUTTONS - self.buttons.len() < EncoderDefinition::CHILDREN {
            return Err(eyre::Report::new(BuildError::CapacityExceeded {
                what: "buttons",
                capacity: BUTTONS,
            }));
        }
        let [cw, ac, press] = def.child_definitions();
        for key in [def.key(), cw.key(), ac.key(), press.key()] {
            if self.key_taken(key) {
                return Err(eyre::Report::new(BuildError::DuplicateKey(key.to_string())));
            }
        }

        let id = EncoderId(self.encoders.len());
        let base = self.buttons.len();
        let prior_modes = [cw.pin, ac.pin, press.pin].map(|pin| (pin, self.pins.get_mode(pin)));
        let inserted = self.insert_button(cw).and_then(|clockwise| {
            let anti_clockwise = self.insert_button(ac)?;
            let button = self.insert_button(press)?;
            Ok((clockwise, anti_clockwise, button))
        });
        let (clockwise, anti_clockwise, button) = match inserted {
            Ok(ids) => ids,
            Err(e) => {
                self.buttons.truncate(base);
                for (pin, mode) in prior_modes {
                    if let Err(restore) = self.pins.set_mode(pin, mode) {
                        tracing::warn!(pin, error = %restore, "restoring pin mode failed");
                    }
                }
                return Err(e.wrap_err(format!("registering encoder '{}'", def.key())));
            }
        };
        // Only the rotation channels are internal; the press button is polled
        // directly by poll_all.
        for child in [clockwise, anti_clockwise] {
            if let Some(b) = self.buttons.get_mut(child.0) {
                b.encoder = Some(id);
            }
        }
        def.last_clockwise = self
            .buttons
            .get(clockwise.0)
            .map_or(Level::Low, |b| b.last_level);
        def.children = Some(EncoderChildren {
            clockwise,
            anti_clockwise,
            button,
        });
        tracing::debug!(key = %def.key(), ?clockwise, ?anti_clockwise, ?button, "encoder registered");

        self.encoders.push(def).map_err(|_| {
            eyre::Report::new(BuildError::CapacityExceeded {
                what: "encoders",
                capacity: ENCODERS,
            })
        })?;
        Ok(id)
    }

    /// Read the button's pin and fire its callback if the level changed.
    ///
    /// The callback receives the transition implied by the level being left:
    /// leaving the idle level reports `Pressed`, leaving the active level
    /// reports `Depressed`. Returns the fresh level, or `None` for a handle
    /// this registry never issued.
    pub fn poll_button(&mut self, id: ButtonId) -> Option<Level> {
        let pin = self.buttons.get(id.0)?.pin;
        let level = self.pins.read(pin);
        let def = self.buttons.get_mut(id.0)?;
        if level != def.last_level {
            let state = def.transition_from(def.last_level);
            def.last_level = level;
            tracing::trace!(key = %def.key, pin, ?level, %state, "button edge");
            if let Some(cb) = def.callback.clone() {
                cb(&def.key, state);
            }
        }
        Some(level)
    }

    /// One control-loop tick: top-level buttons first, then encoders.
    pub fn poll_all(&mut self) {
        for i in 0..self.buttons.len() {
            if self.buttons[i].encoder.is_none() {
                self.poll_button(ButtonId(i));
            }
        }
        for e in 0..self.encoders.len() {
            self.decode(EncoderId(e));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smartscale_hardware::SimulatedPins;
    use smartscale_traits::{BoxError, EdgeHandler};
    use std::sync::Mutex;

    type Events = Arc<Mutex<Vec<(String, ButtonState)>>>;

    fn recorder() -> (Events, impl Fn(&str, ButtonState) + Send + Sync + 'static) {
        let events: Events = Arc::default();
        let sink = events.clone();
        (events, move |key: &str, state: ButtonState| {
            sink.lock().unwrap().push((key.to_string(), state));
        })
    }

    #[test]
    fn pull_up_button_seeds_high_without_reading() {
        let pins = SimulatedPins::new();
        let mut reg: InputRegistry<_> = InputRegistry::new(pins.clone());
        let id = reg
            .register_button(ButtonDefinition::new("Home", 2, true))
            .unwrap();
        assert_eq!(reg.button(id).unwrap().last_level(), Level::High);
        assert_eq!(pins.read_count(2), 0);
        assert_eq!(pins.get_mode(2), PinMode::InputPullUp);
    }

    #[test]
    fn plain_button_is_read_once_to_seed() {
        let pins = SimulatedPins::new();
        pins.set_level(7, Level::High);
        let mut reg: InputRegistry<_> = InputRegistry::new(pins.clone());
        let id = reg
            .register_button(ButtonDefinition::new("Tare", 7, false))
            .unwrap();
        assert_eq!(reg.button(id).unwrap().last_level(), Level::High);
        assert_eq!(pins.read_count(7), 1);
    }

    #[test]
    fn plain_button_idling_low_is_pressed_by_going_high() {
        let pins = SimulatedPins::new();
        let (events, cb) = recorder();
        let mut reg: InputRegistry<_> = InputRegistry::new(pins.clone());
        let id = reg
            .register_button(ButtonDefinition::new("Tare", 7, false).with_callback(cb))
            .unwrap();
        assert_eq!(reg.button(id).unwrap().idle_level(), Level::Low);

        pins.set_level(7, Level::High);
        reg.poll_all();
        pins.set_level(7, Level::Low);
        reg.poll_all();

        assert_eq!(
            *events.lock().unwrap(),
            vec![
                ("Tare".to_string(), ButtonState::Pressed),
                ("Tare".to_string(), ButtonState::Depressed)
            ]
        );
    }

    #[test]
    fn poll_button_returns_fresh_level() {
        let pins = SimulatedPins::new();
        let mut reg: InputRegistry<_> = InputRegistry::new(pins.clone());
        let id = reg
            .register_button(ButtonDefinition::new("Home", 2, true))
            .unwrap();
        pins.set_level(2, Level::Low);
        assert_eq!(reg.poll_button(id), Some(Level::Low));
        assert_eq!(reg.button(id).unwrap().last_level(), Level::Low);
        assert_eq!(reg.poll_button(ButtonId(9)), None);
    }

    #[test]
    fn button_capacity_is_enforced() {
        let mut reg: InputRegistry<_, 2, 1> = InputRegistry::new(SimulatedPins::new());
        reg.register_button(ButtonDefinition::new("A", 1, true)).unwrap();
        reg.register_button(ButtonDefinition::new("B", 2, true)).unwrap();
        let err = reg
            .register_button(ButtonDefinition::new("C", 3, true))
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<BuildError>(),
            Some(&BuildError::CapacityExceeded {
                what: "buttons",
                capacity: 2
            })
        );
        assert_eq!(reg.button_count(), 2);
    }

    #[test]
    fn duplicate_key_is_rejected() {
        let mut reg: InputRegistry<_> = InputRegistry::new(SimulatedPins::new());
        reg.register_button(ButtonDefinition::new("Home", 2, true)).unwrap();
        let err = reg
            .register_button(ButtonDefinition::new("Home", 3, true))
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<BuildError>(),
            Some(&BuildError::DuplicateKey("Home".into()))
        );
    }

    #[test]
    fn plain_button_idling_high_is_pressed_by_going_low() {
        let pins = SimulatedPins::new();
        pins.set_level(7, Level::High);
        let (events, cb) = recorder();
        let mut reg: InputRegistry<_> = InputRegistry::new(pins.clone());
        let id = reg
            .register_button(ButtonDefinition::new("Tare", 7, false).with_callback(cb))
            .unwrap();
        assert_eq!(reg.button(id).unwrap().idle_level(), Level::High);

        pins.set_level(7, Level::Low);
        reg.poll_all();
        pins.set_level(7, Level::High);
        reg.poll_all();

        assert_eq!(
            *events.lock().unwrap(),
            vec![
                ("Tare".to_string(), ButtonState::Pressed),
                ("Tare".to_string(), ButtonState::Depressed)
            ]
        );
    }

    /// Pin bank that refuses to configure one pin.
    struct FaultyPins {
        inner: SimulatedPins,
        fail_pin: Option<u8>,
    }

    impl DigitalPins for FaultyPins {
        fn set_mode(&mut self, pin: u8, mode: PinMode) -> std::result::Result<(), BoxError> {
            if self.fail_pin == Some(pin) {
                return Err(Box::new(std::io::Error::other(format!("pin {pin} busy"))));
            }
            self.inner.set_mode(pin, mode)
        }
        fn get_mode(&self, pin: u8) -> PinMode {
            self.inner.get_mode(pin)
        }
        fn read(&self, pin: u8) -> Level {
            self.inner.read(pin)
        }
        fn attach_falling_edge(
            &mut self,
            pin: u8,
            handler: EdgeHandler,
        ) -> std::result::Result<(), BoxError> {
            self.inner.attach_falling_edge(pin, handler)
        }
        fn detach(&mut self, pin: u8) -> std::result::Result<(), BoxError> {
            self.inner.detach(pin)
        }
    }

    #[test]
    fn encoder_rejected_mid_registration_leaves_nothing_behind() {
        let sim = SimulatedPins::new();
        let mut reg: InputRegistry<_> = InputRegistry::new(FaultyPins {
            inner: sim.clone(),
            fail_pin: Some(4),
        });

        let err = reg
            .register_encoder(EncoderDefinition::new("Vol", 3, 4, 5))
            .unwrap_err();
        assert!(format!("{err:#}").contains("pin 4"), "{err:#}");
        assert_eq!(reg.button_count(), 0);
        assert_eq!(reg.encoder_count(), 0);
        assert_eq!(sim.get_mode(3), PinMode::Input);

        let reads = sim.read_count(3);
        reg.poll_all();
        assert_eq!(sim.read_count(3), reads);

        reg.pins_mut().fail_pin = None;
        reg.register_encoder(EncoderDefinition::new("Vol", 3, 4, 5))
            .unwrap();
        assert_eq!(reg.button_count(), 3);
        assert_eq!(reg.encoder_count(), 1);
    }

    #[test]
    fn find_button_by_key() {
        let mut reg: InputRegistry<_> = InputRegistry::new(SimulatedPins::new());
        reg.register_button(ButtonDefinition::new("Home", 2, true)).unwrap();
        let id = reg
            .register_button(ButtonDefinition::new("Back", 3, true))
            .unwrap();
        assert_eq!(reg.find_button("Back"), Some(id));
        assert_eq!(reg.find_button("Menu"), None);
    }
}
