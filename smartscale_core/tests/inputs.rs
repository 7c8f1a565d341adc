use std::sync::{Arc, Mutex};

use rstest::rstest;
use smartscale_core::{
    ButtonDefinition, ButtonState, EncoderDefinition, InputRegistry, Rotation,
};
use smartscale_hardware::SimulatedPins;
use smartscale_traits::Level;

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Button(String, ButtonState),
    Encoder(String, Rotation),
}

type Log = Arc<Mutex<Vec<Event>>>;

fn button(log: &Log, key: &str, pin: u8, pull_up: bool) -> ButtonDefinition {
    let log = log.clone();
    ButtonDefinition::new(key, pin, pull_up)
        .with_callback(move |k, s| log.lock().unwrap().push(Event::Button(k.to_string(), s)))
}

fn encoder(log: &Log, key: &str, cw: u8, ac: u8, press: u8) -> EncoderDefinition {
    let rotations = log.clone();
    let presses = log.clone();
    EncoderDefinition::new(key, cw, ac, press)
        .on_rotate(move |k, r| rotations.lock().unwrap().push(Event::Encoder(k.to_string(), r)))
        .on_press(move |k, s| presses.lock().unwrap().push(Event::Button(k.to_string(), s)))
}

fn drain(log: &Log) -> Vec<Event> {
    std::mem::take(&mut *log.lock().unwrap())
}

#[rstest]
fn home_button_reports_press_then_release() {
    let pins = SimulatedPins::new();
    let log = Log::default();
    let mut reg: InputRegistry<_> = InputRegistry::new(pins.clone());
    reg.register_button(button(&log, "Home", 2, true)).unwrap();

    pins.set_level(2, Level::High);
    reg.poll_all();
    assert!(drain(&log).is_empty(), "idle level must not fire");

    pins.set_level(2, Level::Low);
    reg.poll_all();
    assert_eq!(drain(&log), vec![Event::Button("Home".into(), ButtonState::Pressed)]);

    pins.set_level(2, Level::High);
    reg.poll_all();
    assert_eq!(drain(&log), vec![Event::Button("Home".into(), ButtonState::Depressed)]);
}

#[rstest]
fn vol_encoder_reports_clockwise() {
    let pins = SimulatedPins::new();
    let log = Log::default();
    let mut reg: InputRegistry<_> = InputRegistry::new(pins.clone());
    reg.register_encoder(encoder(&log, "Vol", 3, 4, 5)).unwrap();

    pins.set_level(4, Level::High);
    pins.set_level(3, Level::High);
    reg.poll_all();

    assert_eq!(drain(&log), vec![Event::Encoder("Vol".into(), Rotation::Clockwise)]);
}

#[rstest]
fn rotation_channels_are_never_polled_directly() {
    let pins = SimulatedPins::new();
    let log = Log::default();
    let mut reg: InputRegistry<_> = InputRegistry::new(pins.clone());
    reg.register_button(button(&log, "Home", 2, true)).unwrap();
    reg.register_encoder(encoder(&log, "Vol", 3, 4, 5)).unwrap();
    let (home, cw, ac, press) = (
        pins.read_count(2),
        pins.read_count(3),
        pins.read_count(4),
        pins.read_count(5),
    );

    for _ in 0..5 {
        reg.poll_all();
    }

    assert_eq!(pins.read_count(2) - home, 5);
    assert_eq!(pins.read_count(5) - press, 5);
    // The clockwise channel is read by the decode step only, once per tick.
    assert_eq!(pins.read_count(3) - cw, 5);
    // No rising edge, so the anti-clockwise channel is never sampled.
    assert_eq!(pins.read_count(4) - ac, 0);
}

#[rstest]
fn second_poll_without_changes_is_silent() {
    let pins = SimulatedPins::new();
    let log = Log::default();
    let mut reg: InputRegistry<_> = InputRegistry::new(pins.clone());
    reg.register_button(button(&log, "Home", 2, true)).unwrap();
    reg.register_encoder(encoder(&log, "Vol", 3, 4, 5)).unwrap();

    pins.set_level(2, Level::Low);
    pins.set_level(3, Level::High);
    pins.set_level(5, Level::Low);
    reg.poll_all();
    assert_eq!(drain(&log).len(), 3);

    reg.poll_all();
    assert!(drain(&log).is_empty());
}

#[rstest]
fn buttons_fire_before_encoders_in_registration_order() {
    let pins = SimulatedPins::new();
    let log = Log::default();
    let mut reg: InputRegistry<_> = InputRegistry::new(pins.clone());
    reg.register_encoder(encoder(&log, "Vol", 3, 4, 5)).unwrap();
    reg.register_button(button(&log, "Home", 2, true)).unwrap();

    pins.set_level(3, Level::High);
    pins.set_level(5, Level::Low);
    pins.set_level(2, Level::Low);
    reg.poll_all();

    assert_eq!(
        drain(&log),
        vec![
            Event::Button("Vol.Button".into(), ButtonState::Pressed),
            Event::Button("Home".into(), ButtonState::Pressed),
            Event::Encoder("Vol".into(), Rotation::AntiClockwise),
        ]
    );
}

#[rstest]
#[case(Level::High, Rotation::Clockwise)]
#[case(Level::Low, Rotation::AntiClockwise)]
fn anti_clockwise_level_picks_direction(#[case] ac: Level, #[case] expected: Rotation) {
    let pins = SimulatedPins::new();
    let log = Log::default();
    let mut reg: InputRegistry<_> = InputRegistry::new(pins.clone());
    reg.register_encoder(encoder(&log, "Vol", 3, 4, 5)).unwrap();

    pins.set_level(4, ac);
    reg.poll_all();
    pins.set_level(3, Level::High);
    reg.poll_all();

    assert_eq!(drain(&log), vec![Event::Encoder("Vol".into(), expected)]);
}
