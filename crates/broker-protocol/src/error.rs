use std::fmt;

/// Errors arising while parsing or validating a line of the client socket protocol.
#[derive(Debug)]
pub enum ProtocolError {
    /// The line was not valid JSON (and not `HEART`, and not an `HTTP/` request line).
    InvalidJson(serde_json::Error),
    /// The JSON object lacked a recognized discriminator (`action`/`status`/`values`/`origin`).
    UnrecognizedShape,
    /// `action: identify` carried an option field outside {core, stats, receiver, config, forward}.
    UnknownIdentifyOption(String),
    /// `action: send` or `control` referenced a protocol id not in the registry.
    UnknownProtocol(String),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::InvalidJson(e) => write!(f, "invalid JSON: {e}"),
            ProtocolError::UnrecognizedShape => write!(f, "unrecognized message shape"),
            ProtocolError::UnknownIdentifyOption(name) => {
                write!(f, "unknown identify option: {name}")
            }
            ProtocolError::UnknownProtocol(id) => write!(f, "unknown protocol: {id}"),
        }
    }
}

impl std::error::Error for ProtocolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProtocolError::InvalidJson(e) => Some(e),
            _ => None,
        }
    }
}
