//! Subcommand bodies, generic over the pin bank so the simulated and the
//! GPIO backends share them.

use eyre::{Result, WrapErr};
use serde_json::json;
use smartscale_config::Config;
use smartscale_core::{
    AbortReason, ButtonDefinition, ButtonState, CalibrationOutcome, EncoderDefinition, Rotation,
    ScaleDevice,
};
use smartscale_traits::DigitalPins;

use crate::backend::Backend;

/// Exit status for a finished session.
pub fn exit_code_for_outcome(outcome: &CalibrationOutcome) -> i32 {
    match outcome {
        CalibrationOutcome::Completed { .. } => 0,
        CalibrationOutcome::Aborted {
            reason: AbortReason::Cancelled,
            ..
        } => 3,
        CalibrationOutcome::Aborted {
            reason: AbortReason::IterationLimit,
            ..
        } => 4,
    }
}

pub fn abort_reason_name(reason: AbortReason) -> &'static str {
    match reason {
        AbortReason::Cancelled => "cancelled",
        AbortReason::IterationLimit => "iteration_limit",
    }
}

fn build<P: DigitalPins>(backend: Backend<P>) -> Result<(ScaleDevice<P>, Box<dyn FnMut(u64)>)> {
    let (builder, stimulus) = backend.into_parts();
    let mut device = builder.try_build()?;
    device.init().wrap_err("attach load cell")?;
    Ok((device, stimulus))
}

pub fn calibrate<P: DigitalPins>(backend: Backend<P>, reference_g: f32, json: bool) -> Result<i32> {
    let (mut device, _) = build(backend)?;

    let signal = device.cancel_signal();
    ctrlc::set_handler(move || signal.trip()).wrap_err("install Ctrl-C handler")?;

    tracing::info!(reference_g, "calibration requested");
    let outcome = device.calibrate(reference_g)?;

    if json {
        let body = match &outcome {
            CalibrationOutcome::Completed {
                factor,
                iterations,
                baseline,
            } => json!({
                "outcome": "completed",
                "factor": factor,
                "iterations": iterations,
                "baseline": baseline,
                "reason": null,
            }),
            CalibrationOutcome::Aborted {
                reason,
                restored_factor,
                iterations,
            } => json!({
                "outcome": "aborted",
                "factor": restored_factor,
                "iterations": iterations,
                "reason": abort_reason_name(*reason),
            }),
        };
        println!("{body}");
    } else {
        match &outcome {
            CalibrationOutcome::Completed {
                factor, iterations, ..
            } => println!("calibration complete: factor={factor} iterations={iterations}"),
            CalibrationOutcome::Aborted {
                reason: AbortReason::Cancelled,
                restored_factor,
                ..
            } => println!("calibration cancelled (factor stays {restored_factor})"),
            CalibrationOutcome::Aborted {
                reason: AbortReason::IterationLimit,
                restored_factor,
                iterations,
            } => println!(
                "calibration did not converge after {iterations} iterations (factor stays {restored_factor})"
            ),
        }
    }
    Ok(exit_code_for_outcome(&outcome))
}

fn print_button(json: bool, key: &str, state: ButtonState) {
    if json {
        println!("{}", json!({ "event": "button", "key": key, "state": state.to_string() }));
    } else {
        println!("button {key} {state}");
    }
}

fn print_rotation(json: bool, key: &str, rotation: Rotation) {
    if json {
        println!(
            "{}",
            json!({ "event": "encoder", "key": key, "rotation": rotation.to_string() })
        );
    } else {
        println!("encoder {key} {rotation}");
    }
}

/// Attach printing callbacks to every input the config declares.
fn with_printing_inputs<P: DigitalPins>(mut backend: Backend<P>, cfg: &Config, json: bool) -> Backend<P> {
    for button in &cfg.buttons {
        let def = ButtonDefinition::from(button)
            .with_callback(move |key, state| print_button(json, key, state));
        backend.builder = backend.builder.with_button(def);
    }
    if let Some(encoder) = &cfg.encoder {
        let def = EncoderDefinition::from(encoder)
            .on_rotate(move |key, rotation| print_rotation(json, key, rotation))
            .on_press(move |key, state| print_button(json, key, state));
        backend.builder = backend.builder.with_encoder(def);
    }
    backend
}

pub fn monitor<P: DigitalPins>(backend: Backend<P>, cfg: &Config, ticks: u64, json: bool) -> Result<i32> {
    let (mut device, stimulus) = build(with_printing_inputs(backend, cfg, json))?;
    tracing::info!(
        ticks,
        buttons = device.inputs().button_count(),
        encoders = device.inputs().encoder_count(),
        "monitoring inputs"
    );
    device.poll_for_with(ticks, stimulus);
    Ok(0)
}

pub fn factor<P: DigitalPins>(backend: Backend<P>, json: bool) -> Result<i32> {
    let (device, _) = build(backend)?;
    let factor = device.scale_factor();
    if json {
        println!("{}", json!({ "factor": factor }));
    } else {
        println!("{factor}");
    }
    Ok(0)
}

/// Builds the device with every configured input so wiring mistakes surface.
pub fn self_check<P: DigitalPins>(backend: Backend<P>, cfg: &Config, json: bool) -> Result<i32> {
    let (device, _) = build(with_printing_inputs(backend, cfg, json))?;
    if json {
        println!(
            "{}",
            json!({
                "status": "ok",
                "buttons": device.inputs().button_count(),
                "encoders": device.inputs().encoder_count(),
                "factor": device.scale_factor(),
            })
        );
    } else {
        println!("ok");
    }
    Ok(0)
}
