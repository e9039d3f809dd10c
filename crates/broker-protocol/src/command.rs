use serde::{Deserialize, Serialize};

/// Identify-time subscription request (§4.7 `identify`). Every field defaults
/// to `false`; an unrecognized sibling key is rejected at the parse site with
/// [`crate::ProtocolError::UnknownIdentifyOption`], not by serde, since serde
/// would otherwise silently ignore it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentifyOptions {
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

/// Sub-action of a `registry` command (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryOp {
    Set,
    Get,
    Remove,
}

/// One parsed line of the client socket protocol that carries an `action`
/// field (§6). `HEART`, `status` replies, and bare broadcasts are handled
/// separately by the session manager since they lack this discriminator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientCommand {
    Identify {
        #[serde(default)]
        uuid: Option<String>,
        #[serde(default)]
        options: IdentifyOptions,
        #[serde(default)]
        media: Option<super::Media>,
    },
    Send {
        code: serde_json::Value,
    },
    Control {
        code: serde_json::Value,
    },
    Registry {
        #[serde(rename = "type")]
        op: RegistryOp,
        key: String,
        #[serde(default)]
        value: Option<serde_json::Value>,
        #[serde(default)]
        decimals: Option<u8>,
    },
    #[serde(rename = "request config")]
    RequestConfig,
    #[serde(rename = "request values")]
    RequestValues,
    Update {
        #[serde(default)]
        values: Option<serde_json::Value>,
        #[serde(default)]
        protocol: Option<String>,
        #[serde(default)]
        message: Option<serde_json::Value>,
    },
}

/// A bare `{"status": "success"|"failed"}` reply from a client acknowledging
/// a previously issued command (§4.7, last table row).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReply {
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identify_parses_recognized_options() {
        let json = serde_json::json!({
            "action": "identify",
            "options": {"stats": 1, "receiver": 1}
        });
        let cmd: ClientCommand = serde_json::from_value(json).unwrap();
        match cmd {
            ClientCommand::Identify { options, .. } => {
                assert!(options.stats);
                assert!(options.receiver);
                assert!(!options.core);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn request_config_and_values_are_distinct_literal_actions() {
        let cfg: ClientCommand =
            serde_json::from_value(serde_json::json!({"action": "request config"})).unwrap();
        assert!(matches!(cfg, ClientCommand::RequestConfig));

        let vals: ClientCommand =
            serde_json::from_value(serde_json::json!({"action": "request values"})).unwrap();
        assert!(matches!(vals, ClientCommand::RequestValues));
    }

    #[test]
    fn registry_set_carries_key_and_value() {
        let json = serde_json::json!({
            "action": "registry",
            "type": "set",
            "key": "test.x",
            "value": 42
        });
        let cmd: ClientCommand = serde_json::from_value(json).unwrap();
        match cmd {
            ClientCommand::Registry { op, key, value, .. } => {
                assert_eq!(op, RegistryOp::Set);
                assert_eq!(key, "test.x");
                assert_eq!(value, Some(serde_json::json!(42)));
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn status_reply_parses_independently_of_action_tag() {
        let reply: StatusReply =
            serde_json::from_value(serde_json::json!({"status": "success"})).unwrap();
        assert_eq!(reply.status, "success");
    }
}
