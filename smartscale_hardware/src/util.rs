use std::time::{Duration, Instant};

use smartscale_traits::Level;

use crate::error::{HwError, Result};

/// Wait until `read` reports `target`, or a timeout expires.
/// Sleeps in small intervals between reads to avoid CPU spinning.
pub fn wait_for_level(
    mut read: impl FnMut() -> Level,
    target: Level,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    while read() != target {
        if Instant::now() >= deadline {
            return Err(HwError::DataReadyTimeout);
        }
        std::thread::sleep(poll_interval);
    }
    Ok(())
}

/// Sign-extend a 24-bit two's complement sample to i32.
#[inline]
pub fn sign_extend_24(value: u32) -> i32 {
    let v = (value & 0x00FF_FFFF) as i32;
    if v & 0x0080_0000 != 0 { v | !0x00FF_FFFF } else { v }
}
