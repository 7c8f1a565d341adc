#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Input and calibration core of the smart scale (hardware-agnostic).
//!
//! All hardware goes through the collaborator traits in `smartscale_traits`:
//! `DigitalPins` for buttons and the cancellation interrupt, `LoadCell`,
//! `Display` and `FactorStore` for calibration.
//!
//! ## Architecture
//!
//! - **Inputs**: fixed-capacity registry of buttons polled by level comparison (`input`)
//! - **Encoders**: quadrature decode over two registry buttons plus a press button (`encoder`)
//! - **Cancellation**: atomic flag raised by a falling-edge handler (`cancel`)
//! - **Calibration**: adaptive-step search for the scale factor (`calibration`)
//! - **Wiring**: `ScaleDevice` and its builder (`device`)
//!
//! ## Concurrency
//!
//! Everything runs on the caller's thread. The cancellation flag is the only
//! state an interrupt handler may touch.

pub mod calibration;
pub mod cancel;
pub mod config;
pub mod conversions;
pub mod device;
pub mod encoder;
pub mod error;
pub mod hw_error;
pub mod input;
pub mod status;
pub mod util;

pub use calibration::{
    CalibrationSession, CalibrationState, Calibrator, load_persisted_factor, show, step_size,
};
pub use cancel::{ArmedInterrupt, CancelSignal};
pub use config::{CalibrationCfg, InputCfg};
pub use device::{ScaleDevice, ScaleDeviceBuilder};
pub use encoder::{EncoderCallback, EncoderChildren, EncoderDefinition, EncoderId, Rotation};
pub use error::{AbortReason, BuildError, Report, Result, ScaleError};
pub use input::{
    ButtonCallback, ButtonDefinition, ButtonId, ButtonState, DEFAULT_MAX_BUTTONS,
    DEFAULT_MAX_ENCODERS, InputRegistry,
};
pub use status::CalibrationOutcome;
