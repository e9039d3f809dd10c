use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use broker_protocol::{BroadcastEnvelope, ClientCommand, Origin};
use rf_hardware::DiscoveryProvider;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::context::Broker;
use crate::error::ClientizeError;
use crate::session::dispatch_line;

/// States of the peer-follower state machine (§4.8). Re-entering
/// `Discover` on any failure is the only recovery path — there is no
/// "abort permanently" state, matching P8 / §7 "peer disconnect: return to
/// DISCOVER; never exit".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientizeState {
    Discover,
    Connect,
    Identify,
    Sync,
    Stream,
}

/// Drive the clientize loop until `broker.is_stopping()`. `master_addr`
/// takes priority over `discovery` (§4.8 step 1); both are optional so a
/// fixed test address can stand in for real SSDP discovery.
pub async fn run_clientize(
    broker: Arc<Broker>,
    node_uuid: String,
    master_addr: Option<SocketAddr>,
    discovery: Option<Arc<dyn DiscoveryProvider>>,
) {
    while !broker.is_stopping() {
        match run_one_cycle(&broker, &node_uuid, master_addr, discovery.as_deref()).await {
            Ok(()) => {}
            Err(err) => {
                warn!("clientize cycle failed, returning to DISCOVER: {err}");
            }
        }
        if broker.is_stopping() {
            break;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}

async fn run_one_cycle(
    broker: &Broker,
    node_uuid: &str,
    master_addr: Option<SocketAddr>,
    discovery: Option<&dyn DiscoveryProvider>,
) -> Result<(), ClientizeError> {
    let addr = resolve_peer_address(master_addr, discovery).await?;

    let mut stream = TcpStream::connect(addr).await.map_err(ClientizeError::Connect)?;
    debug!("clientize connected to {addr}");

    send_identify(&mut stream, node_uuid).await?;
    sync_config(&mut stream).await?;
    stream_updates(broker, stream).await;
    Ok(())
}

async fn resolve_peer_address(
    master_addr: Option<SocketAddr>,
    discovery: Option<&dyn DiscoveryProvider>,
) -> Result<SocketAddr, ClientizeError> {
    if let Some(addr) = master_addr {
        return Ok(addr);
    }
    match discovery {
        Some(provider) => provider.discover().await.map_err(ClientizeError::Discovery),
        None => Err(ClientizeError::Discovery(rf_hardware::HardwareError::Fatal(
            "no master address configured and no discovery provider available".into(),
        ))),
    }
}

async fn send_identify(stream: &mut TcpStream, node_uuid: &str) -> Result<(), ClientizeError> {
    let identify = serde_json::json!({
        "action": "identify",
        "uuid": node_uuid,
        "options": {"receiver": 1, "forward": 1, "config": 1}
    });
    write_line(stream, &identify.to_string()).await?;

    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .await
        .map_err(ClientizeError::Connect)?;
    let reply: serde_json::Value =
        serde_json::from_str(line.trim()).map_err(|_| ClientizeError::MalformedConfig)?;
    if reply.get("status").and_then(|s| s.as_str()) != Some("success") {
        return Err(ClientizeError::IdentifyRejected(line.trim().to_string()));
    }
    Ok(())
}

async fn sync_config(stream: &mut TcpStream) -> Result<(), ClientizeError> {
    write_line(stream, r#"{"action":"request config"}"#).await?;

    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .await
        .map_err(ClientizeError::Connect)?;
    let reply: serde_json::Value =
        serde_json::from_str(line.trim()).map_err(|_| ClientizeError::MalformedConfig)?;
    if reply.get("message").and_then(|m| m.as_str()) != Some("config") {
        return Err(ClientizeError::MalformedConfig);
    }
    // §4.8 step 4: strip every top-level child except `devices`.
    let _devices_only = reply.get("devices").cloned().unwrap_or(serde_json::json!({}));
    Ok(())
}

async fn stream_updates(broker: &Broker, stream: TcpStream) {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();
    loop {
        if broker.is_stopping() {
            break;
        }
        let next = tokio::select! {
            next = lines.next_line() => next,
            _ = broker.shutdown.notified() => {
                let _ = send_heart(&mut write_half).await;
                break;
            }
        };
        let line = match next {
            Ok(Some(line)) => line,
            Ok(None) | Err(_) => break,
        };
        if line.trim().is_empty() || line.trim() == "HEART" {
            continue;
        }
        let Ok(value) = serde_json::from_str::<serde_json::Value>(line.trim()) else {
            continue;
        };

        if matches!(value.get("action").and_then(|a| a.as_str()), Some("send" | "control")) {
            if let Ok(cmd) = serde_json::from_value::<ClientCommand>(value) {
                redispatch_command(broker, cmd).await;
            }
            continue;
        }

        if let (Some(origin), Some(protocol)) = (
            value.get("origin").and_then(|o| o.as_str()),
            value.get("protocol").and_then(|p| p.as_str()),
        ) {
            if matches!(origin, "receiver" | "sender") {
                let message = value.get("message").cloned().unwrap_or(serde_json::json!({}));
                let envelope = BroadcastEnvelope::new(protocol, message, Origin::Node);
                broker.broadcast_queue.try_enqueue(envelope).await;
            }
        }
    }
    info!("clientize stream ended, returning to DISCOVER");
}

async fn redispatch_command(broker: &Broker, command: ClientCommand) {
    // Re-dispatched commands from the peer have no originating client
    // socket; client id 0 is reserved for this (§4.8 step 5).
    let line = serde_json::to_string(&command).unwrap_or_default();
    let _ = dispatch_line(broker, 0, &line).await;
}

async fn write_line(stream: &mut TcpStream, line: &str) -> Result<(), ClientizeError> {
    stream.write_all(line.as_bytes()).await.map_err(ClientizeError::Connect)?;
    stream.write_all(b"\n").await.map_err(ClientizeError::Connect)?;
    Ok(())
}

/// Sends the `HEART` sentinel to unblock a peer's read loop, used both as a
/// heartbeat and as the shutdown-unblock mechanism (§9 Design Notes,
/// "Double HEART purpose"). Generic over the write half so it works both on
/// a fresh `TcpStream` and on `stream_updates`'s split `OwnedWriteHalf`.
pub async fn send_heart<W: AsyncWrite + Unpin>(writer: &mut W) -> std::io::Result<()> {
    writer.write_all(b"HEART\n").await
}
