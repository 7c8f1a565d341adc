//! Collaborator selection: the simulated bank (default) or Raspberry Pi GPIO
//! with an HX711 (feature `hardware`).
//!
//! The simulated backend reads a few environment variables so integration
//! tests can steer it without touching the config file:
//!
//! - `SMARTSCALE_SIM_COUNTS_PER_GRAM`: sensor slope (default 50)
//! - `SMARTSCALE_SIM_WEIGHT_G`: weight put on the platform once the scale is zeroed
//!   (defaults to the reference weight during `calibrate`)
//! - `SMARTSCALE_SIM_CANCEL_AFTER`: pull the cancel pin low after N unit reads
//! - `SMARTSCALE_SIM_INPUTS`: `tick:pin=level` events, comma separated, applied by `monitor`

use std::str::FromStr;

use eyre::{Result, WrapErr, eyre};
use smartscale_config::Config;
use smartscale_core::{ScaleDevice, ScaleDeviceBuilder};
use smartscale_hardware::{FileFactorStore, SimulatedDisplay, SimulatedLoadCell, SimulatedPins};
use smartscale_traits::{DigitalPins, Level, ManualClock};

pub const ENV_COUNTS_PER_GRAM: &str = "SMARTSCALE_SIM_COUNTS_PER_GRAM";
pub const ENV_WEIGHT_G: &str = "SMARTSCALE_SIM_WEIGHT_G";
pub const ENV_CANCEL_AFTER: &str = "SMARTSCALE_SIM_CANCEL_AFTER";
pub const ENV_INPUTS: &str = "SMARTSCALE_SIM_INPUTS";

const DEFAULT_COUNTS_PER_GRAM: f32 = 50.0;

type Stimulus = Box<dyn FnMut(u64)>;

/// A device builder with every collaborator in place, plus an optional hook
/// run ahead of each `monitor` tick.
pub struct Backend<P: DigitalPins> {
    pub builder: ScaleDeviceBuilder<P>,
    stimulus: Option<Stimulus>,
}

impl<P: DigitalPins> Backend<P> {
    pub fn into_parts(self) -> (ScaleDeviceBuilder<P>, Stimulus) {
        let stimulus = self.stimulus.unwrap_or_else(|| Box::new(|_| {}));
        (self.builder, stimulus)
    }
}

/// One scripted level change for the simulated pin bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimEvent {
    pub tick: u64,
    pub pin: u8,
    pub level: Level,
}

impl FromStr for SimEvent {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        let (tick, rest) = s
            .split_once(':')
            .ok_or_else(|| eyre!("expected tick:pin=level, got '{s}'"))?;
        let (pin, level) = rest
            .split_once('=')
            .ok_or_else(|| eyre!("expected tick:pin=level, got '{s}'"))?;
        let level = match level.trim().to_ascii_lowercase().as_str() {
            "high" | "1" => Level::High,
            "low" | "0" => Level::Low,
            other => return Err(eyre!("unknown level '{other}' in '{s}'")),
        };
        Ok(SimEvent {
            tick: tick
                .trim()
                .parse()
                .wrap_err_with(|| format!("bad tick in '{s}'"))?,
            pin: pin
                .trim()
                .parse()
                .wrap_err_with(|| format!("bad pin in '{s}'"))?,
            level,
        })
    }
}

pub fn parse_events(list: &str) -> Result<Vec<SimEvent>> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(SimEvent::from_str)
        .collect()
}

fn env_value<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .wrap_err_with(|| format!("invalid {name}='{raw}'")),
        Err(_) => Ok(None),
    }
}

/// Simulated collaborators. `reference_g` is the weight put on the platform
/// when `SMARTSCALE_SIM_WEIGHT_G` is unset.
pub fn simulated(cfg: &Config, reference_g: Option<f32>) -> Result<Backend<SimulatedPins>> {
    let pins = SimulatedPins::new();
    let counts_per_gram =
        env_value::<f32>(ENV_COUNTS_PER_GRAM)?.unwrap_or(DEFAULT_COUNTS_PER_GRAM);
    let mut cell = SimulatedLoadCell::new(counts_per_gram);
    if let Some(grams) = env_value::<f32>(ENV_WEIGHT_G)?.or(reference_g) {
        cell = cell.with_weight_placed(grams);
    }
    if let Some(after) = env_value::<u64>(ENV_CANCEL_AFTER)? {
        let probe = pins.clone();
        let cancel_pin = cfg.pins.cancel;
        cell = cell.with_read_hook(move |reads| {
            if reads == after {
                probe.set_level(cancel_pin, Level::Low);
            }
        });
    }

    let events = match std::env::var(ENV_INPUTS) {
        Ok(list) => parse_events(&list).wrap_err_with(|| format!("invalid {ENV_INPUTS}"))?,
        Err(_) => Vec::new(),
    };
    let driver = pins.clone();
    let stimulus: Stimulus = Box::new(move |tick| {
        for ev in events.iter().filter(|ev| ev.tick == tick) {
            driver.set_level(ev.pin, ev.level);
        }
    });

    tracing::debug!(counts_per_gram, "using simulated backend");
    let builder = ScaleDevice::builder()
        .with_pins(pins)
        .with_load_cell(cell)
        .with_display(SimulatedDisplay::new())
        .with_store(FileFactorStore::new(&cfg.storage.factor_path))
        .with_clock(ManualClock::new())
        .with_config(cfg);
    Ok(Backend {
        builder,
        stimulus: Some(stimulus),
    })
}

/// Raspberry Pi GPIO and a bit-banged HX711. The 16x2 panel is mirrored to
/// the log through the simulated display.
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub fn hardware(cfg: &Config) -> Result<Backend<smartscale_hardware::pins::RppalPins>> {
    use smartscale_hardware::hx711::{GAIN_PULSES_A128, Hx711LoadCell};
    use std::time::Duration;

    let pins = smartscale_hardware::pins::RppalPins::new().wrap_err("open gpio")?;
    let cell = Hx711LoadCell::new(GAIN_PULSES_A128, Duration::from_millis(500))
        .wrap_err("open hx711")?;
    let builder = ScaleDevice::builder()
        .with_pins(pins)
        .with_load_cell(cell)
        .with_display(SimulatedDisplay::new())
        .with_store(FileFactorStore::new(&cfg.storage.factor_path))
        .with_config(cfg);
    Ok(Backend {
        builder,
        stimulus: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_event_lists() {
        let events = parse_events("0:2=low, 3:2=HIGH,5:7=1").unwrap();
        assert_eq!(
            events,
            vec![
                SimEvent { tick: 0, pin: 2, level: Level::Low },
                SimEvent { tick: 3, pin: 2, level: Level::High },
                SimEvent { tick: 5, pin: 7, level: Level::High },
            ]
        );
    }

    #[test]
    fn empty_list_is_fine() {
        assert!(parse_events("").unwrap().is_empty());
    }

    #[test]
    fn rejects_malformed_events() {
        assert!(parse_events("2=low").is_err());
        assert!(parse_events("1:2").is_err());
        assert!(parse_events("1:2=maybe").is_err());
        assert!(parse_events("x:2=low").is_err());
    }
}
