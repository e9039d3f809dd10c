use serde::{Deserialize, Serialize};

/// Provenance label on a broadcast, controlling routing (§4.6, GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Receiver,
    Sender,
    Master,
    Node,
    Fw,
    Core,
    Stats,
}

/// Coarse client-class label used for per-client device filtering (§3, §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Media {
    #[default]
    All,
    Web,
    Mobile,
    Desktop,
}

impl Media {
    /// True if `self` and `other` are compatible for filtering purposes —
    /// i.e. equal, or either side is `All` (§4.6, P5).
    pub fn compatible(self, other: Media) -> bool {
        self == Media::All || other == Media::All || self == other
    }
}

/// Subscription flags a client can set via `identify` (§3, §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClientFlags {
    #[serde(default)]
    pub core: bool,
    #[serde(default)]
    pub config: bool,
    #[serde(default)]
    pub receiver: bool,
    #[serde(default)]
    pub stats: bool,
    #[serde(default)]
    pub forward: bool,
}

/// A fully decoded (or synthetic) message ready to be dispatched by the
/// broadcaster worker (§3 `DecodedMessage`, §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastEnvelope {
    #[serde(rename = "protocol")]
    pub protocol_id: String,
    pub message: serde_json::Value,
    #[serde(default = "default_repeats")]
    pub repeats: u32,
    pub origin: Origin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<serde_json::Value>,
    /// Present only for `origin: core` messages (§4.6 routing by `type`).
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "type")]
    pub core_type: Option<i64>,
}

fn default_repeats() -> u32 {
    1
}

impl BroadcastEnvelope {
    pub fn new(protocol_id: impl Into<String>, message: serde_json::Value, origin: Origin) -> Self {
        Self {
            protocol_id: protocol_id.into(),
            message,
            repeats: 1,
            origin,
            uuid: None,
            settings: None,
            core_type: None,
        }
    }

    pub fn with_repeats(mut self, repeats: u32) -> Self {
        self.repeats = repeats;
        self
    }

    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = Some(uuid.into());
        self
    }

    pub fn core(core_type: i64, message: serde_json::Value) -> Self {
        let mut envelope = Self::new("core", message, Origin::Core);
        envelope.core_type = Some(core_type);
        envelope
    }

    /// The §9(c) filter: a broadcastable payload must have more than one
    /// top-level field and must not be the empty object.
    pub fn is_payload_broadcastable(&self) -> bool {
        match self.message.as_object() {
            Some(map) => map.len() > 1,
            None => false,
        }
    }
}

/// A pending transmission, constructed by the client session manager (C7)
/// after running a protocol's encoder, and drained by the sender worker (C5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendRequest {
    pub id: u64,
    pub protocol_id: String,
    /// Original client-supplied code object, carried through for logging and
    /// for the broadcast reflected back after the send completes (§4.5).
    pub code: serde_json::Value,
    /// Pulse durations produced by the protocol's encoder (§3, §4.5); this is
    /// what the transmitter hardware module actually sends.
    pub pulses: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_uuid: Option<String>,
    pub origin: Origin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_compatible_treats_all_as_wildcard() {
        assert!(Media::All.compatible(Media::Mobile));
        assert!(Media::Mobile.compatible(Media::All));
        assert!(Media::Mobile.compatible(Media::Mobile));
        assert!(!Media::Mobile.compatible(Media::Desktop));
    }

    #[test]
    fn is_payload_broadcastable_rejects_empty_and_singleton_objects() {
        let empty = BroadcastEnvelope::new("x", serde_json::json!({}), Origin::Receiver);
        assert!(!empty.is_payload_broadcastable());

        let singleton = BroadcastEnvelope::new("x", serde_json::json!({"a": 1}), Origin::Receiver);
        assert!(!singleton.is_payload_broadcastable());

        let ok = BroadcastEnvelope::new("x", serde_json::json!({"a": 1, "b": 2}), Origin::Receiver);
        assert!(ok.is_payload_broadcastable());
    }

    #[test]
    fn core_constructor_sets_origin_and_type() {
        let env = BroadcastEnvelope::core(-1, serde_json::json!({"values": 1}));
        assert_eq!(env.origin, Origin::Core);
        assert_eq!(env.core_type, Some(-1));
    }
}
