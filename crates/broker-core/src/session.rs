use std::sync::Arc;

use broker_protocol::{
    BroadcastEnvelope, ClientCommand, ClientFlags, Origin, ProtocolError, RegistryOp,
    RegistryValue, SendRequest, StatusReply,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::client::{next_client_id, Client, ClientId};
use crate::context::Broker;
use crate::error::ClientSessionError;

const KNOWN_IDENTIFY_OPTIONS: [&str; 5] = ["core", "stats", "receiver", "config", "forward"];

/// One line of the client socket protocol, after the discriminator that
/// separates it from `HEART` and raw HTTP request lines (§4.7, §6).
#[derive(Debug)]
pub enum ParsedLine {
    Heart,
    Http(String),
    Command(ClientCommand),
    Status(StatusReply),
}

/// What the session loop should do in response to one parsed line.
pub enum SessionReply {
    /// Nothing to write back (e.g. a logged `status` acknowledgement).
    None,
    /// Write this line back to the client and keep the connection open.
    Text(String),
    /// The request was an HTTP `GET /logo.png`; the caller serves the PNG.
    ServeLogo,
    /// The request was any other `HTTP/` line; the caller serves the
    /// landing page body for `line`.
    ServeLanding,
    /// Malformed input (§7): remove the client and close the socket.
    Disconnect,
}

/// Parse one line into its discriminated shape (§4.7, §6). Unrecognized
/// JSON shapes and invalid JSON both surface as
/// [`ClientSessionError::Protocol`] so the caller can reap the client.
pub fn parse_line(line: &str) -> Result<ParsedLine, ClientSessionError> {
    let trimmed = line.trim();
    if trimmed == "HEART" {
        return Ok(ParsedLine::Heart);
    }
    if trimmed.starts_with("HTTP/") || trimmed.starts_with("GET ") || trimmed.starts_with("POST ") {
        return Ok(ParsedLine::Http(trimmed.to_string()));
    }

    let value: serde_json::Value =
        serde_json::from_str(trimmed).map_err(ProtocolError::InvalidJson)?;

    if let Some(action) = value.get("action").and_then(|a| a.as_str()) {
        if action == "identify" {
            if let Some(options) = value.get("options").and_then(|o| o.as_object()) {
                for key in options.keys() {
                    if !KNOWN_IDENTIFY_OPTIONS.contains(&key.as_str()) {
                        return Err(ProtocolError::UnknownIdentifyOption(key.clone()).into());
                    }
                }
            }
        }
        let cmd: ClientCommand = serde_json::from_value(value).map_err(ProtocolError::InvalidJson)?;
        return Ok(ParsedLine::Command(cmd));
    }

    if value.get("status").is_some() {
        let status: StatusReply =
            serde_json::from_value(value).map_err(ProtocolError::InvalidJson)?;
        return Ok(ParsedLine::Status(status));
    }

    Err(ProtocolError::UnrecognizedShape.into())
}

/// Dispatch one already-parsed command against the broker context (§4.7
/// table). Returns the reply the session loop should write back, if any.
pub async fn dispatch_line(broker: &Broker, client_id: ClientId, line: &str) -> SessionReply {
    let parsed = match parse_line(line) {
        Ok(p) => p,
        Err(err) => {
            debug!("client {client_id} sent malformed input: {err}");
            broker.clients.remove(client_id).await;
            return SessionReply::Disconnect;
        }
    };

    match parsed {
        ParsedLine::Heart => SessionReply::Text("BEAT".to_string()),
        ParsedLine::Http(line) => {
            if line.contains("/logo.png") {
                SessionReply::ServeLogo
            } else {
                SessionReply::ServeLanding
            }
        }
        ParsedLine::Status(status) => {
            info!("client {client_id} reported status: {}", status.status);
            SessionReply::None
        }
        ParsedLine::Command(ClientCommand::Identify { uuid, options, media }) => {
            let flags = ClientFlags {
                core: options.core,
                config: options.config,
                receiver: options.receiver,
                stats: options.stats,
                forward: options.forward,
            };
            broker.clients.update_identify(client_id, uuid, media, flags).await;
            success_reply()
        }
        ParsedLine::Command(ClientCommand::Send { code }) => handle_send(broker, &code, None).await,
        ParsedLine::Command(ClientCommand::Control { code }) => handle_control(broker, &code).await,
        ParsedLine::Command(ClientCommand::Registry { op, key, value, decimals }) => {
            handle_registry(broker, op, &key, value, decimals).await
        }
        ParsedLine::Command(ClientCommand::RequestConfig) => handle_request_config(broker, client_id).await,
        ParsedLine::Command(ClientCommand::RequestValues) => handle_request_values(broker, client_id).await,
        ParsedLine::Command(ClientCommand::Update { values, protocol, message }) => {
            handle_update(broker, client_id, values, protocol, message).await
        }
    }
}

fn success_reply() -> SessionReply {
    SessionReply::Text(r#"{"status":"success"}"#.to_string())
}

fn failed_reply() -> SessionReply {
    SessionReply::Text(r#"{"status":"failed"}"#.to_string())
}

async fn handle_send(broker: &Broker, code: &serde_json::Value, device_values: Option<serde_json::Value>) -> SessionReply {
    let Some(protocol_id) = code
        .get("protocol")
        .and_then(|p| p.as_array())
        .and_then(|arr| arr.first())
        .and_then(|p| p.as_str())
    else {
        return failed_reply();
    };

    let mut merged = code.clone();
    if let (Some(values), Some(obj)) = (device_values, merged.as_object_mut()) {
        if let Some(values_obj) = values.as_object() {
            for (k, v) in values_obj {
                obj.insert(k.clone(), v.clone());
            }
        }
    }

    if broker.protocols.lookup_by_name(protocol_id).is_none() {
        warn!("{}", ProtocolError::UnknownProtocol(protocol_id.to_string()));
        return failed_reply();
    }
    let Some(outcome) = broker.protocols.encode(protocol_id, &merged) else {
        return failed_reply();
    };

    let request = SendRequest {
        id: broker.next_send_id(),
        protocol_id: protocol_id.to_string(),
        code: outcome.payload.unwrap_or(merged),
        pulses: outcome.frame.pulses,
        target_uuid: None,
        origin: Origin::Master,
        settings: None,
    };
    broker.send_queue.try_enqueue(request).await;
    success_reply()
}

async fn handle_control(broker: &Broker, code: &serde_json::Value) -> SessionReply {
    let Some(device_name) = code.get("device").and_then(|d| d.as_str()) else {
        return failed_reply();
    };
    let Some(device) = broker.devices.get(device_name).await else {
        return failed_reply();
    };

    let mut merged_code = device.settings.clone();
    if let Some(obj) = merged_code.as_object_mut() {
        obj.insert("protocol".to_string(), serde_json::json!([device.protocol_id]));
        if let Some(state) = code.get("state") {
            obj.insert("state".to_string(), state.clone());
        }
    }
    let values = code.get("values").cloned();
    handle_send(broker, &merged_code, values).await
}

async fn handle_registry(
    broker: &Broker,
    op: RegistryOp,
    key: &str,
    value: Option<serde_json::Value>,
    decimals: Option<u8>,
) -> SessionReply {
    match op {
        RegistryOp::Set => {
            let Some(value) = value else { return failed_reply() };
            let registry_value = match (value.as_f64(), decimals) {
                (Some(n), dec) => RegistryValue::number(n, dec.unwrap_or(0)),
                (None, _) => match value.as_str() {
                    Some(s) => RegistryValue::text(s),
                    None => return failed_reply(),
                },
            };
            broker.registry.set(key, registry_value).await;
            success_reply()
        }
        RegistryOp::Get => match broker.registry.get(key).await {
            Ok(value) => {
                let json = serde_json::to_value(&value).unwrap_or_default();
                let body = serde_json::json!({"message": "registry", "key": key, "value": json});
                SessionReply::Text(body.to_string())
            }
            Err(_) => failed_reply(),
        },
        RegistryOp::Remove => {
            broker.registry.remove(key).await;
            success_reply()
        }
    }
}

async fn handle_request_config(broker: &Broker, client_id: ClientId) -> SessionReply {
    // `forward=1` clients (peer followers, §4.8 SYNC) get the lighter
    // projection without local `settings`; other clients get the full one.
    let forwarding = broker.clients.flags_of(client_id).await.is_some_and(|f| f.forward);
    let snapshot = broker.devices.config_snapshot(forwarding).await;
    let body = serde_json::json!({"message": "config", "devices": snapshot["devices"]});
    // §9(a): the original deep-copies via stringify-then-reparse; here the
    // snapshot is already an owned `Value` clone, so we only need the
    // literal `%` -> `%%` substitution the wire format requires.
    let text = body.to_string().replace('%', "%%");
    debug!("served config snapshot to client {client_id}");
    SessionReply::Text(text)
}

async fn handle_request_values(broker: &Broker, client_id: ClientId) -> SessionReply {
    let Some(media) = broker.clients.media_of(client_id).await else {
        return failed_reply();
    };
    let values = broker.devices.values_for_media(media).await;
    let body = serde_json::json!({"message": "values", "values": values});
    SessionReply::Text(body.to_string())
}

async fn handle_update(
    broker: &Broker,
    client_id: ClientId,
    values: Option<serde_json::Value>,
    protocol: Option<String>,
    message: Option<serde_json::Value>,
) -> SessionReply {
    if let Some(values) = &values {
        let cpu = values.get("cpu").and_then(|v| v.as_f64());
        let ram = values.get("ram").and_then(|v| v.as_f64());
        if cpu.is_some() || ram.is_some() {
            broker.clients.update_usage(client_id, cpu, ram).await;
        }
    }

    if let Some(protocol_id) = protocol {
        let payload = message.unwrap_or_else(|| values.clone().unwrap_or(serde_json::json!({})));
        broker
            .broadcast_queue
            .try_enqueue(BroadcastEnvelope::new(protocol_id, payload, Origin::Master))
            .await;
    }

    SessionReply::None
}

/// Accept loop for the client socket protocol (§4.7, §6): one task per
/// connection, splitting inbound bytes on `\n`.
pub async fn run_session_manager(broker: Arc<Broker>, listener: TcpListener) {
    info!("client session manager listening on {:?}", listener.local_addr());
    loop {
        if broker.is_stopping() {
            break;
        }
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(err) => {
                warn!("accept failed: {err}");
                continue;
            }
        };
        let broker = broker.clone();
        tokio::spawn(async move {
            debug!("client connected from {peer}");
            serve_client(broker, stream).await;
        });
    }
}

async fn serve_client(broker: Arc<Broker>, stream: TcpStream) {
    let client_id = next_client_id();
    let (read_half, mut write_half) = stream.into_split();
    let (outbox_tx, mut outbox_rx) = mpsc::channel::<String>(256);
    broker.clients.insert(Client::new(client_id, outbox_tx)).await;

    let writer = tokio::spawn(async move {
        while let Some(line) = outbox_rx.recv().await {
            if write_half.write_all(line.as_bytes()).await.is_err() {
                break;
            }
            if write_half.write_all(b"\n").await.is_err() {
                break;
            }
        }
    });

    let mut lines = BufReader::new(read_half).lines();
    loop {
        let next = lines.next_line().await;
        let line = match next {
            Ok(Some(line)) => line,
            Ok(None) | Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }
        match dispatch_line(&broker, client_id, &line).await {
            SessionReply::None => {}
            SessionReply::Text(text) => {
                let _ = broker.clients.send_to(client_id, text).await;
            }
            SessionReply::ServeLogo | SessionReply::ServeLanding => {
                // Serving the actual bytes/HTML body is the service layer's
                // job (template directory access, §1 out-of-scope); here we
                // just know the session ends after an HTTP request.
                break;
            }
            SessionReply::Disconnect => break,
        }
    }

    broker.clients.remove(client_id).await;
    writer.abort();
}
