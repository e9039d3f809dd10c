use thiserror::Error;

/// Errors surfaced while servicing one client socket session (§4.7, §7).
#[derive(Debug, Error)]
pub enum ClientSessionError {
    #[error("malformed client input: {0}")]
    Protocol(#[from] broker_protocol::ProtocolError),
    #[error("client socket io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("client closed the connection")]
    Closed,
}

/// Errors from the clientize (peer follower) state machine (§4.8, P8).
#[derive(Debug, Error)]
pub enum ClientizeError {
    #[error("discovery failed: {0}")]
    Discovery(#[from] rf_hardware::HardwareError),
    #[error("peer connection failed: {0}")]
    Connect(#[from] std::io::Error),
    #[error("peer rejected identify: {0}")]
    IdentifyRejected(String),
    #[error("peer sent malformed config reply")]
    MalformedConfig,
}

/// Errors from the registry store (C10, §7).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("registry key not found: {0}")]
    NotFound(String),
}
