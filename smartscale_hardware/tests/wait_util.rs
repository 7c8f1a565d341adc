use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::Duration;

use rstest::rstest;
use smartscale_hardware::error::HwError;
use smartscale_hardware::util::{sign_extend_24, wait_for_level};
use smartscale_traits::Level;

#[test]
fn wait_for_low_success_path() {
    let high = Arc::new(AtomicBool::new(true));
    let high_bg = high.clone();
    // Data-ready goes low after a short delay
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(3));
        high_bg.store(false, Ordering::Relaxed);
    });

    let res = wait_for_level(
        || Level::from(high.load(Ordering::Relaxed)),
        Level::Low,
        Duration::from_millis(500),
        Duration::from_micros(200),
    );
    assert!(res.is_ok(), "expected success, got {res:?}");
}

#[test]
fn wait_for_low_timeout_path() {
    let err = wait_for_level(
        || Level::High,
        Level::Low,
        Duration::from_millis(5),
        Duration::from_micros(200),
    )
    .expect_err("expected timeout error");

    match err {
        HwError::DataReadyTimeout => {}
        other => panic!("unexpected error: {other:?}"),
    }
}

#[rstest]
#[case(0x000001, 1)]
#[case(0x7FFFFF, 8_388_607)]
#[case(0xFFFFFF, -1)]
#[case(0x800000, -8_388_608)]
#[case(0xFF000005, 5)]
fn sign_extension_of_24_bit_samples(#[case] raw: u32, #[case] expected: i32) {
    assert_eq!(sign_extend_24(raw), expected);
}
