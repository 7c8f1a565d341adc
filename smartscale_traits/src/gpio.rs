//! Digital pin vocabulary shared by the input registry and the cancellation interrupt.

use crate::BoxError;

/// Logic level read from a digital pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Low,
    High,
}

impl Level {
    #[inline]
    pub fn is_high(self) -> bool {
        matches!(self, Level::High)
    }

    #[inline]
    pub fn is_low(self) -> bool {
        matches!(self, Level::Low)
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high { Level::High } else { Level::Low }
    }
}

/// Electrical configuration of a pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PinMode {
    #[default]
    Input,
    InputPullUp,
    Output,
}

impl PinMode {
    /// Mode used for a button wired with or without the internal pull-up.
    #[inline]
    pub fn for_button(pull_up: bool) -> Self {
        if pull_up {
            PinMode::InputPullUp
        } else {
            PinMode::Input
        }
    }
}

/// Handler invoked from interrupt context on a falling edge.
///
/// Implementations may call it from another thread; it must only touch
/// state that is safe to share across that boundary.
pub type EdgeHandler = Box<dyn Fn() + Send + Sync>;

/// GPIO bank abstraction.
pub trait DigitalPins {
    fn set_mode(&mut self, pin: u8, mode: PinMode) -> Result<(), BoxError>;
    fn get_mode(&self, pin: u8) -> PinMode;
    fn read(&self, pin: u8) -> Level;
    fn attach_falling_edge(&mut self, pin: u8, handler: EdgeHandler) -> Result<(), BoxError>;
    fn detach(&mut self, pin: u8) -> Result<(), BoxError>;
}
