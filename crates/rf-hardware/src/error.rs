use std::fmt;

/// Errors a hardware driver or transmitter can raise, split along the §7
/// taxonomy line between locally-recovered and fatal conditions.
#[derive(Debug)]
pub enum HardwareError {
    /// Driver returned -1: back off 1s and retry (§4.3, §7).
    Transient(String),
    /// Driver cannot continue at all; caller should stop scheduling this module.
    Fatal(String),
}

impl fmt::Display for HardwareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HardwareError::Transient(msg) => write!(f, "transient hardware error: {msg}"),
            HardwareError::Fatal(msg) => write!(f, "fatal hardware error: {msg}"),
        }
    }
}

impl std::error::Error for HardwareError {}
