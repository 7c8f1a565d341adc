pub mod clock;
pub mod gpio;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use gpio::{DigitalPins, EdgeHandler, Level, PinMode};

/// Error type crossing every collaborator boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Strain-gauge amplifier front end (HX711 style).
pub trait LoadCell {
    /// Bind the amplifier to its data-out and clock pins.
    fn attach(&mut self, dout_pin: u8, clk_pin: u8) -> Result<(), BoxError>;
    fn set_scale_factor(&mut self, factor: f32) -> Result<(), BoxError>;
    fn scale_factor(&self) -> f32;
    /// Latch the current raw average as the zero offset.
    fn tare(&mut self) -> Result<(), BoxError>;
    fn read_raw_average(&mut self, count: u8) -> Result<i64, BoxError>;
    /// Offset-corrected reading divided by the scale factor, averaged over `count` reads.
    fn read_units(&mut self, count: u8) -> Result<f32, BoxError>;
}

/// Character display (16x2 LCD style).
pub trait Display {
    fn clear(&mut self) -> Result<(), BoxError>;
    fn print(&mut self, text: &str) -> Result<(), BoxError>;
    fn set_cursor(&mut self, col: u8, row: u8) -> Result<(), BoxError>;
    fn backlight_on(&mut self) -> Result<(), BoxError>;
    fn backlight_off(&mut self) -> Result<(), BoxError>;
}

/// Single-slot persistence for the calibration factor.
pub trait FactorStore {
    /// Returns NaN when nothing has been stored yet.
    fn load_factor(&mut self) -> Result<f32, BoxError>;
    fn store_factor(&mut self, factor: f32) -> Result<(), BoxError>;
}
