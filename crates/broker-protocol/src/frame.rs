/// Hardware class tag carried by a [`PulseFrame`]. `-1` means "any hardware".
pub const HWTYPE_ANY: i32 = -1;

/// An ordered sequence of pulse durations (microseconds) delimiting one
/// candidate RF message, as produced by the receive pipeline (§4.3) and
/// consumed exactly once by the decoder worker (§4.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PulseFrame {
    pub pulses: Vec<u32>,
    pub hwtype: i32,
    /// Base pulse length, derived as `last_edge / PULSE_DIV` by the capturing driver.
    pub pulse_len: u32,
}

impl PulseFrame {
    pub fn new(pulses: Vec<u32>, hwtype: i32, pulse_len: u32) -> Self {
        Self {
            pulses,
            hwtype,
            pulse_len,
        }
    }

    pub fn len(&self) -> usize {
        self.pulses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pulses.is_empty()
    }

    /// True if `self.hwtype` is compatible with `other`, per §3: equal, or
    /// either side is "any".
    pub fn hwtype_compatible(&self, other: i32) -> bool {
        self.hwtype == HWTYPE_ANY || other == HWTYPE_ANY || self.hwtype == other
    }
}
