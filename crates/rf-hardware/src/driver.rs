use async_trait::async_trait;
use broker_protocol::PulseFrame;

use crate::HardwareError;

/// Which capture variant a hardware module implements (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    /// COMOOK: one edge duration per read; the receive pipeline assembles frames.
    Edge,
    /// COMPLSTRAIN: one complete frame per read.
    Frame,
}

/// A receiver hardware module. The original daemon represents a transient
/// failure as a `-1` return and a non-event as `0`; this trait expresses both
/// with `Result`/`Option` instead of sentinel integers.
#[async_trait]
pub trait ReceiveDriver: Send + Sync {
    fn kind(&self) -> DriverKind;

    /// Numeric hardware class tag this module reports on frames it produces.
    fn hwtype(&self) -> i32;

    /// Read one edge duration in microseconds. Used when `kind() == Edge`.
    async fn read_edge(&self) -> Result<u32, HardwareError>;

    /// Read one complete frame. `Ok(None)` is a non-event (original: length
    /// 0). Used when `kind() == Frame`.
    async fn read_frame(&self) -> Result<Option<Vec<u32>>, HardwareError>;

    /// Pause (`true`) or resume (`false`) reception so a concurrent send's
    /// echo is not observed as a reception (§3 invariants, §4.3, §4.5).
    async fn set_wait(&self, wait: bool);
}

/// A transmitter hardware module (§4.5).
#[async_trait]
pub trait Transmitter: Send + Sync {
    fn hwtype(&self) -> i32;

    async fn send(&self, pulses: &[u32], txrpt: u32) -> Result<(), HardwareError>;
}

/// Result of handing a [`PulseFrame`] to a protocol's decoder (§3, §4.4).
#[derive(Debug, Clone)]
pub enum DecodeOutcome {
    NoMatch,
    Match { payload: serde_json::Value },
}

/// Result of handing a client-supplied code object to a protocol's encoder
/// (§3, §4.7 `send`/`control`).
#[derive(Debug, Clone)]
pub struct EncodeOutcome {
    pub frame: PulseFrame,
    pub payload: Option<serde_json::Value>,
}

pub trait ProtocolDecoder: Send + Sync {
    fn decode(&self, frame: &PulseFrame) -> DecodeOutcome;
}

/// `None` means the protocol refused the code object (§7 "encoder failure").
pub trait ProtocolEncoder: Send + Sync {
    fn encode(&self, code: &serde_json::Value) -> Option<EncodeOutcome>;
}
