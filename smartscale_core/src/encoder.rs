//! Quadrature encoder decoding on top of the input registry.
//!
//! An encoder is three buttons: two rotation channels wired as plain inputs
//! and a press button. A rising edge on the clockwise channel triggers one
//! read of the anti-clockwise channel: HIGH means `Clockwise`, LOW means
//! `AntiClockwise`. That mapping matches the channel ordering of the
//! reference encoder and must not be "fixed".

use std::fmt;
use std::sync::Arc;

use smartscale_traits::{DigitalPins, Level};

use crate::input::{ButtonCallback, ButtonDefinition, ButtonId, ButtonState, InputRegistry};

/// Direction reported to a rotation callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rotation {
    Clockwise,
    AntiClockwise,
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rotation::Clockwise => f.write_str("Clockwise"),
            Rotation::AntiClockwise => f.write_str("AntiClockwise"),
        }
    }
}

pub type EncoderCallback = Arc<dyn Fn(&str, Rotation) + Send + Sync>;

/// Stable handle to a registered encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EncoderId(pub(crate) usize);

impl EncoderId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Registry handles of the buttons synthesized for an encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderChildren {
    pub clockwise: ButtonId,
    pub anti_clockwise: ButtonId,
    pub button: ButtonId,
}

#[derive(Clone)]
pub struct EncoderDefinition {
    key: String,
    clockwise_pin: u8,
    anti_clockwise_pin: u8,
    button_pin: u8,
    button_pull_up: bool,
    on_rotate: Option<EncoderCallback>,
    on_press: Option<ButtonCallback>,
    pub(crate) children: Option<EncoderChildren>,
    pub(crate) last_clockwise: Level,
}

impl fmt::Debug for EncoderDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncoderDefinition")
            .field("key", &self.key)
            .field("clockwise_pin", &self.clockwise_pin)
            .field("anti_clockwise_pin", &self.anti_clockwise_pin)
            .field("button_pin", &self.button_pin)
            .field("children", &self.children)
            .field("last_clockwise", &self.last_clockwise)
            .finish_non_exhaustive()
    }
}

impl EncoderDefinition {
    pub(crate) const CHILDREN: usize = 3;

    pub fn new(key: impl Into<String>, clockwise_pin: u8, anti_clockwise_pin: u8, button_pin: u8) -> Self {
        Self {
            key: key.into(),
            clockwise_pin,
            anti_clockwise_pin,
            button_pin,
            button_pull_up: true,
            on_rotate: None,
            on_press: None,
            children: None,
            last_clockwise: Level::Low,
        }
    }

    pub fn with_button_pull_up(mut self, pull_up: bool) -> Self {
        self.button_pull_up = pull_up;
        self
    }

    pub fn on_rotate(mut self, callback: impl Fn(&str, Rotation) + Send + Sync + 'static) -> Self {
        self.on_rotate = Some(Arc::new(callback));
        self
    }

    pub fn on_press(mut self, callback: impl Fn(&str, ButtonState) + Send + Sync + 'static) -> Self {
        self.on_press = Some(Arc::new(callback));
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Child handles; `None` until the encoder has been registered.
    pub fn children(&self) -> Option<EncoderChildren> {
        self.children
    }

    /// Clockwise-channel level seen by the last decode.
    pub fn last_clockwise(&self) -> Level {
        self.last_clockwise
    }

    /// `<key>.CW`, `<key>.AC` and `<key>.Button`, in registration order.
    pub(crate) fn child_definitions(&self) -> [ButtonDefinition; 3] {
        let cw = ButtonDefinition::new(format!("{}.CW", self.key), self.clockwise_pin, false);
        let ac = ButtonDefinition::new(format!("{}.AC", self.key), self.anti_clockwise_pin, false);
        let mut press = ButtonDefinition::new(
            format!("{}.Button", self.key),
            self.button_pin,
            self.button_pull_up,
        );
        if let Some(cb) = &self.on_press {
            press = press.with_shared_callback(cb.clone());
        }
        [cw, ac, press]
    }
}

impl<P: DigitalPins, const BUTTONS: usize, const ENCODERS: usize>
    InputRegistry<P, BUTTONS, ENCODERS>
{
    pub fn encoder(&self, id: EncoderId) -> Option<&EncoderDefinition> {
        self.encoders.get(id.0)
    }

    /// Poll the clockwise channel and, on its rising edge, sample the
    /// anti-clockwise channel once to pick a direction.
    ///
    /// The stored clockwise level is refreshed on every call. Returns the
    /// rotation that fired, if any.
    pub fn decode(&mut self, id: EncoderId) -> Option<Rotation> {
        let (children, previous) = {
            let enc = self.encoders.get(id.0)?;
            (enc.children?, enc.last_clockwise)
        };
        let now = self.poll_button(children.clockwise)?;

        let rotation = if previous.is_low() && now.is_high() {
            let anti_clockwise = self.poll_button(children.anti_clockwise)?;
            Some(if anti_clockwise.is_high() {
                Rotation::Clockwise
            } else {
                Rotation::AntiClockwise
            })
        } else {
            None
        };

        let enc = self.encoders.get_mut(id.0)?;
        enc.last_clockwise = now;
        if let Some(direction) = rotation {
            tracing::trace!(key = %enc.key, %direction, "encoder step");
            if let Some(cb) = enc.on_rotate.clone() {
                cb(&enc.key, direction);
            }
        }
        rotation
    }
}
