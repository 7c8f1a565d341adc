#![no_main]
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use libfuzzer_sys::fuzz_target;
use smartscale_core::{ButtonDefinition, EncoderDefinition, InputRegistry};
use smartscale_hardware::SimulatedPins;
use smartscale_traits::Level;

const PINS: [u8; 4] = [2, 3, 4, 5];

// Each byte drives the four managed pins for one tick. Rotations can never
// outnumber clockwise-channel changes.
fuzz_target!(|ticks: Vec<u8>| {
    let pins = SimulatedPins::new();
    let rotations = Arc::new(AtomicUsize::new(0));
    let sink = rotations.clone();
    let mut reg: InputRegistry<_> = InputRegistry::new(pins.clone());
    let _ = reg.register_button(ButtonDefinition::new("Home", 2, true));
    let _ = reg.register_encoder(
        EncoderDefinition::new("Vol", 3, 4, 5).on_rotate(move |_, _| {
            sink.fetch_add(1, Ordering::Relaxed);
        }),
    );

    let mut cw_changes = 0usize;
    let mut cw_last = pins.level(3);
    for bits in ticks {
        for (i, pin) in PINS.iter().enumerate() {
            pins.set_level(*pin, Level::from(bits & (1 << i) != 0));
        }
        if pins.level(3) != cw_last {
            cw_changes += 1;
            cw_last = pins.level(3);
        }
        reg.poll_all();
        assert!(rotations.load(Ordering::Relaxed) <= cw_changes);
    }
});
