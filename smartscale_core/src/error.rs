use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum ScaleError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("timeout waiting for sensor")]
    Timeout,
    #[error("io error: {0}")]
    Io(String),
}

/// Wiring mistakes reported while the device is assembled at startup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("missing load cell")]
    MissingLoadCell,
    #[error("missing display")]
    MissingDisplay,
    #[error("missing factor store")]
    MissingStore,
    #[error("missing pin bank")]
    MissingPins,
    #[error("too many {what}: capacity is {capacity}")]
    CapacityExceeded { what: &'static str, capacity: usize },
    #[error("duplicate input key '{0}'")]
    DuplicateKey(String),
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

/// Why a calibration session ended without persisting a factor.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    #[error("cancelled by operator")]
    Cancelled,
    #[error("iteration limit reached")]
    IterationLimit,
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
