#![no_main]
use libfuzzer_sys::fuzz_target;

// Parsing and validation may reject anything but must never panic.
fuzz_target!(|data: &str| {
    if let Ok(cfg) = smartscale_config::load_toml(data)
        && cfg.validate().is_ok()
    {
        assert!(cfg.button_slots() <= smartscale_config::MAX_BUTTONS);
    }
});
