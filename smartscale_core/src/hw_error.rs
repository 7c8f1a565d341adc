//! Maps `Box<dyn Error>` from trait boundaries to typed `ScaleError`.
//!
//! The collaborator traits use `Box<dyn Error + Send + Sync>`; this module
//! converts those to the core's error enum, with an optional feature-gated
//! path for `smartscale_hardware::HwError` downcasting.

use smartscale_traits::BoxError;

use crate::error::ScaleError;

/// Map a trait-boundary error to a typed `ScaleError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> ScaleError {
    #[cfg(feature = "hardware-errors")]
    {
        use smartscale_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::DataReadyTimeout => ScaleError::Timeout,
                HwError::Io(io) => ScaleError::Io(io.to_string()),
                other => ScaleError::HardwareFault(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        ScaleError::Timeout
    } else {
        ScaleError::Hardware(s)
    }
}

/// Convert a collaborator error into a report carrying the typed error.
pub(crate) fn report(e: BoxError) -> eyre::Report {
    let err: &(dyn std::error::Error + 'static) = e.as_ref();
    eyre::Report::new(map_hw_error(err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_messages_map_to_timeout() {
        let e = std::io::Error::other("sensor Timeout on dout");
        assert!(matches!(map_hw_error(&e), ScaleError::Timeout));
    }

    #[test]
    fn other_messages_stay_generic() {
        let e = std::io::Error::other("bus glitch");
        match map_hw_error(&e) {
            ScaleError::Hardware(msg) => assert_eq!(msg, "bus glitch"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn hw_errors_are_downcast() {
        use smartscale_hardware::error::HwError;
        assert!(matches!(
            map_hw_error(&HwError::DataReadyTimeout),
            ScaleError::Timeout
        ));
        assert!(matches!(
            map_hw_error(&HwError::Gpio("pin 4 busy".into())),
            ScaleError::HardwareFault(_)
        ));
    }
}
