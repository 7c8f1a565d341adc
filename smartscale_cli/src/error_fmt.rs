//! Human-readable error descriptions and structured JSON error formatting.

use smartscale_core::{BuildError, ScaleError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingLoadCell | BuildError::MissingDisplay | BuildError::MissingStore | BuildError::MissingPins => format!(
                "What happened: The device could not be assembled ({be}).\nLikely causes: A backend failed to initialize and nothing was wired in its place.\nHow to fix: Re-run with --log-level=debug to see which collaborator failed."
            ),
            BuildError::CapacityExceeded { what, capacity } => format!(
                "What happened: The config declares more {what} than the device can manage (capacity {capacity}).\nLikely causes: Every encoder takes three button slots (clockwise, anti-clockwise, press).\nHow to fix: Remove [[buttons]] entries or the [encoder] section until everything fits."
            ),
            BuildError::DuplicateKey(key) => format!(
                "What happened: Input key '{key}' is used twice.\nLikely causes: A button shares a key with another button or with an encoder (or one of its '.CW', '.AC', '.Button' children).\nHow to fix: Give every input a unique key."
            ),
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See etc/smartscale.toml for a sample."
            ),
        };
    }

    if let Some(se) = err.downcast_ref::<ScaleError>() {
        return match se {
            ScaleError::Timeout => "What happened: The load cell did not produce data in time.\nLikely causes: HX711 DOUT/SCK miswired, or no power to the amplifier.\nHow to fix: Check [pins] hx711_dout/hx711_sck and the 5V/GND wiring.".to_string(),
            ScaleError::Config(msg) => format!(
                "What happened: Calibration refused to start ({msg}).\nLikely causes: The reference weight is zero, negative or not a number.\nHow to fix: Pass the mass of the reference weight in grams, e.g. `smartscale calibrate --reference-g 100`."
            ),
            ScaleError::Io(msg) => format!(
                "What happened: A file operation failed ({msg}).\nLikely causes: storage.factor_path points at a read-only or missing location.\nHow to fix: Point storage.factor_path at a writable file."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    let msg = format!("{err:#}");
    let lower = msg.to_ascii_lowercase();

    if lower.contains("invalid configuration") || lower.contains("read config") {
        return format!(
            "What happened: Configuration is invalid or unreadable.\nLikely causes: Missing [pins] (hx711_dout, hx711_sck, cancel), a typo, or out-of-range values.\nHow to fix: Edit the TOML config and try again. Details: {msg}"
        );
    }

    if lower.contains("open gpio") || lower.contains("open hx711") {
        return "What happened: Failed to initialize hardware pins.\nLikely causes: Incorrect pin numbers or insufficient GPIO permissions.\nHow to fix: Fix the [pins] values in the config; ensure the process has permission to access GPIO.".to_string();
    }

    format!(
        "Something went wrong.\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Exit status for errors. Sessions that end early are not errors and map
/// through `commands::exit_code_for_outcome` instead.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<BuildError>().is_some() {
        return 2;
    }
    1
}

fn error_kind(err: &eyre::Report) -> &'static str {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::CapacityExceeded { .. } => "capacity_exceeded",
            BuildError::DuplicateKey(_) => "duplicate_key",
            BuildError::InvalidConfig(_) => "invalid_config",
            _ => "missing_collaborator",
        };
    }
    match err.downcast_ref::<ScaleError>() {
        Some(ScaleError::Timeout) => "timeout",
        Some(ScaleError::Config(_)) => "invalid_reference",
        Some(ScaleError::Io(_)) => "io",
        Some(_) => "hardware",
        None => "error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({
        "reason": error_kind(err),
        "message": humanize(err),
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_errors_explain_encoder_slots() {
        let err = eyre::Report::new(BuildError::CapacityExceeded {
            what: "buttons",
            capacity: 4,
        });
        let text = humanize(&err);
        assert!(text.contains("capacity 4"), "{text}");
        assert!(text.contains("three button slots"), "{text}");
        assert_eq!(exit_code_for_error(&err), 2);
    }

    #[test]
    fn json_error_carries_reason() {
        let err = eyre::Report::new(BuildError::DuplicateKey("Vol".into()));
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "duplicate_key");
        assert!(v["message"].as_str().unwrap().contains("'Vol'"));
    }

    #[test]
    fn wrapped_sensor_timeout_is_recognized() {
        use eyre::WrapErr;
        let err: eyre::Result<()> = Err(eyre::Report::new(ScaleError::Timeout));
        let err = err.wrap_err("reading units").unwrap_err();
        assert!(humanize(&err).contains("did not produce data"));
        assert_eq!(exit_code_for_error(&err), 1);
    }
}
