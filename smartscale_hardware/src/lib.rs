//! Collaborator implementations for the smart scale core.
//!
//! Simulated collaborators are always available and back the CLI's default
//! backend and the integration tests. Real GPIO and HX711 drivers live behind
//! the `hardware` feature (Linux, via rppal).

pub mod display;
pub mod error;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod hx711;
pub mod pins;
pub mod store;
pub mod util;

pub use display::SimulatedDisplay;
pub use pins::SimulatedPins;
pub use store::{FileFactorStore, MemoryFactorStore};

use smartscale_traits::{BoxError, LoadCell};
use std::sync::{Arc, Mutex};

/// Cloneable handle to the weight resting on a simulated platform.
#[derive(Debug, Clone, Default)]
pub struct PlatformHandle {
    grams: Arc<Mutex<f32>>,
}

impl PlatformHandle {
    pub fn set_grams(&self, grams: f32) {
        if let Ok(mut g) = self.grams.lock() {
            *g = grams;
        }
    }

    pub fn grams(&self) -> f32 {
        self.grams.lock().map(|g| *g).unwrap_or(0.0)
    }
}

type ReadHook = Box<dyn FnMut(u64) + Send>;

/// Simulated load cell with a linear sensor model:
/// raw = zero_counts + grams * counts_per_gram
pub struct SimulatedLoadCell {
    platform: PlatformHandle,
    zero_counts: i64,
    counts_per_gram: f32,
    offset: i64,
    scale_factor: f32,
    wiring: Option<(u8, u8)>,
    pending_weight: Option<f32>,
    unit_reads: u64,
    read_hook: Option<ReadHook>,
}

impl SimulatedLoadCell {
    pub fn new(counts_per_gram: f32) -> Self {
        SimulatedLoadCell {
            platform: PlatformHandle::default(),
            zero_counts: 84_213,
            counts_per_gram,
            offset: 0,
            scale_factor: 1.0,
            wiring: None,
            pending_weight: None,
            unit_reads: 0,
            read_hook: None,
        }
    }

    /// Raw counts reported with an empty platform.
    pub fn with_zero_counts(mut self, zero_counts: i64) -> Self {
        self.zero_counts = zero_counts;
        self
    }

    /// Place `grams` on the platform just before the first unit read, the way
    /// an operator loads the reference weight once the scale has been zeroed
    /// and the baseline taken.
    pub fn with_weight_placed(mut self, grams: f32) -> Self {
        self.pending_weight = Some(grams);
        self
    }

    /// Invoke `hook` with the running count after every unit read.
    pub fn with_read_hook(mut self, hook: impl FnMut(u64) + Send + 'static) -> Self {
        self.read_hook = Some(Box::new(hook));
        self
    }

    pub fn platform(&self) -> PlatformHandle {
        self.platform.clone()
    }

    pub fn wiring(&self) -> Option<(u8, u8)> {
        self.wiring
    }

    pub fn unit_reads(&self) -> u64 {
        self.unit_reads
    }

    fn raw(&self) -> i64 {
        let load = (self.platform.grams() * self.counts_per_gram).round() as i64;
        self.zero_counts + load
    }
}

impl LoadCell for SimulatedLoadCell {
    fn attach(&mut self, dout_pin: u8, clk_pin: u8) -> Result<(), BoxError> {
        tracing::debug!(dout_pin, clk_pin, "simulated load cell attached");
        self.wiring = Some((dout_pin, clk_pin));
        Ok(())
    }

    fn set_scale_factor(&mut self, factor: f32) -> Result<(), BoxError> {
        self.scale_factor = factor;
        Ok(())
    }

    fn scale_factor(&self) -> f32 {
        self.scale_factor
    }

    fn tare(&mut self) -> Result<(), BoxError> {
        self.offset = self.raw();
        tracing::debug!(offset = self.offset, "simulated tare");
        Ok(())
    }

    fn read_raw_average(&mut self, count: u8) -> Result<i64, BoxError> {
        let n = i64::from(count.max(1));
        let total: i64 = (0..n).map(|_| self.raw()).sum();
        Ok(total / n)
    }

    fn read_units(&mut self, count: u8) -> Result<f32, BoxError> {
        if let Some(grams) = self.pending_weight.take() {
            self.platform.set_grams(grams);
        }
        let avg = self.read_raw_average(count)?;
        let units = (avg - self.offset) as f32 / self.scale_factor;
        self.unit_reads += 1;
        let reads = self.unit_reads;
        if let Some(hook) = self.read_hook.as_mut() {
            hook(reads);
        }
        Ok(units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_units_follow_factor() {
        let mut cell = SimulatedLoadCell::new(50.0).with_weight_placed(100.0);
        cell.tare().unwrap();
        assert_eq!(cell.read_raw_average(4).unwrap(), 84_213);
        cell.set_scale_factor(50.0).unwrap();
        let units = cell.read_units(3).unwrap();
        assert!((units - 100.0).abs() < 1e-3, "units={units}");
        cell.set_scale_factor(25.0).unwrap();
        assert!((cell.read_units(1).unwrap() - 200.0).abs() < 1e-3);
    }

    #[test]
    fn test_tare_zeroes_existing_load() {
        let mut cell = SimulatedLoadCell::new(10.0);
        cell.platform().set_grams(12.0);
        cell.tare().unwrap();
        assert_eq!(cell.read_units(1).unwrap(), 0.0);
    }

    #[test]
    fn test_read_hook_counts_unit_reads() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut cell = SimulatedLoadCell::new(10.0).with_read_hook(move |n| {
            sink.lock().unwrap().push(n);
        });
        cell.read_units(1).unwrap();
        cell.read_units(1).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
        assert_eq!(cell.unit_reads(), 2);
    }

    #[test]
    fn test_raw_average_includes_zero_counts() {
        let mut cell = SimulatedLoadCell::new(2.0).with_zero_counts(1_000);
        cell.platform().set_grams(5.0);
        assert_eq!(cell.read_raw_average(20).unwrap(), 1_010);
    }
}
