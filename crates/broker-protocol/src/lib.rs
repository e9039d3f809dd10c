//! Wire and domain types shared between the broker core and the broker service.
//!
//! This crate has no knowledge of hardware or decoding — it only describes the
//! shapes that travel over the client socket protocol and between the core's
//! internal queues. See [`PulseFrame`], [`DecodedMessage`] and [`ClientCommand`].

mod command;
mod error;
mod frame;
mod message;
mod registry;

pub use command::{ClientCommand, IdentifyOptions, RegistryOp, StatusReply};
pub use error::ProtocolError;
pub use frame::{PulseFrame, HWTYPE_ANY};
pub use message::{BroadcastEnvelope, ClientFlags, Media, Origin, SendRequest};
pub use registry::RegistryValue;

/// The reserved `origin::CORE` message type used for periodic stats broadcasts (§4.9).
pub const CORE_TYPE_PROCESS: i64 = 1000;

/// The reserved `origin::CORE` message type used for the synthetic firmware
/// broadcast re-emitted after ingesting a `pilight_firmware` payload (§4.6).
pub const CORE_TYPE_FIRMWARE: i64 = 2;

/// Protocol id reserved for the synthetic loopback protocol (§4.5, §9 "raw" feedback loop).
pub const RAW_PROTOCOL_ID: &str = "raw";

/// Protocol id reserved for firmware-info ingestion (§4.4, §4.6).
pub const FIRMWARE_PROTOCOL_ID: &str = "pilight_firmware";
