use std::time::Duration;
use tracing::trace;

use rppal::gpio::{Gpio, InputPin, OutputPin};
use smartscale_traits::{BoxError, Level, LoadCell};

use crate::error::{HwError, Result};
use crate::util::{sign_extend_24, wait_for_level};

/// Channel A, gain 128.
pub const GAIN_PULSES_A128: u8 = 1;

struct Wiring {
    dout: InputPin,
    sck: OutputPin,
}

/// Bit-banged HX711 amplifier on Raspberry Pi GPIO.
pub struct Hx711LoadCell {
    gpio: Gpio,
    wiring: Option<Wiring>,
    gain_pulses: u8,
    data_ready_timeout: Duration,
    offset: i64,
    scale_factor: f32,
}

impl Hx711LoadCell {
    pub fn new(gain_pulses: u8, data_ready_timeout: Duration) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        Ok(Self {
            gpio,
            wiring: None,
            gain_pulses,
            data_ready_timeout,
            offset: 0,
            scale_factor: 1.0,
        })
    }

    fn read_raw(&mut self) -> Result<i32> {
        let timeout = self.data_ready_timeout;
        let gain_pulses = self.gain_pulses;
        let wiring = self
            .wiring
            .as_mut()
            .ok_or_else(|| HwError::Gpio("hx711 not attached".into()))?;

        // Data is ready once DOUT goes low
        wait_for_level(
            || Level::from(wiring.dout.is_high()),
            Level::Low,
            timeout,
            Duration::from_micros(200),
        )?;

        let mut value: u32 = 0;
        for _ in 0..24 {
            wiring.sck.set_high();
            spin_delay_100ns();
            value = (value << 1) | u32::from(wiring.dout.is_high());
            wiring.sck.set_low();
            spin_delay_100ns();
        }

        // Gain/channel selection for the next conversion
        for _ in 0..gain_pulses {
            wiring.sck.set_high();
            spin_delay_100ns();
            wiring.sck.set_low();
            spin_delay_100ns();
        }

        let raw = sign_extend_24(value);
        trace!(raw, "hx711 raw read");
        Ok(raw)
    }
}

impl LoadCell for Hx711LoadCell {
    fn attach(&mut self, dout_pin: u8, clk_pin: u8) -> std::result::Result<(), BoxError> {
        let dout = self
            .gpio
            .get(dout_pin)
            .map_err(|e| HwError::Gpio(format!("open hx711 dout {dout_pin}: {e}")))?
            .into_input();
        let mut sck = self
            .gpio
            .get(clk_pin)
            .map_err(|e| HwError::Gpio(format!("open hx711 sck {clk_pin}: {e}")))?
            .into_output();
        sck.set_low(); // clock idle low
        self.wiring = Some(Wiring { dout, sck });
        Ok(())
    }

    fn set_scale_factor(&mut self, factor: f32) -> std::result::Result<(), BoxError> {
        self.scale_factor = factor;
        Ok(())
    }

    fn scale_factor(&self) -> f32 {
        self.scale_factor
    }

    fn tare(&mut self) -> std::result::Result<(), BoxError> {
        self.offset = self.read_raw_average(10)?;
        tracing::debug!(offset = self.offset, "hx711 tare");
        Ok(())
    }

    fn read_raw_average(&mut self, count: u8) -> std::result::Result<i64, BoxError> {
        let n = count.max(1);
        let mut total: i64 = 0;
        for _ in 0..n {
            total += i64::from(self.read_raw()?);
        }
        Ok(total / i64::from(n))
    }

    fn read_units(&mut self, count: u8) -> std::result::Result<f32, BoxError> {
        let avg = self.read_raw_average(count)?;
        Ok((avg - self.offset) as f32 / self.scale_factor)
    }
}

#[inline(always)]
fn spin_delay_100ns() {
    std::hint::spin_loop();
}
