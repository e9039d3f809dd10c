//! End-to-end scenarios (§8), driven over real TCP against a test broker
//! wired with fake protocols — no real RF hardware involved.

use std::time::Duration;

use broker_core::DeviceConfig;
use broker_protocol::Media;
use broker_test_support::spawn_test_broker;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

struct Session {
    write: OwnedWriteHalf,
    reader: BufReader<OwnedReadHalf>,
}

impl Session {
    async fn connect(addr: std::net::SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect to test broker");
        let (read_half, write_half) = stream.into_split();
        Self { write: write_half, reader: BufReader::new(read_half) }
    }

    async fn send(&mut self, line: &str) {
        self.write.write_all(line.as_bytes()).await.unwrap();
        self.write.write_all(b"\n").await.unwrap();
    }

    async fn recv_line(&mut self) -> String {
        let mut line = String::new();
        tokio::time::timeout(Duration::from_secs(2), self.reader.read_line(&mut line))
            .await
            .expect("reply within timeout")
            .expect("read succeeds");
        line.trim().to_string()
    }
}

#[tokio::test]
async fn scenario_1_send_a_raw_code() {
    let harness = spawn_test_broker().await;

    // A receiver=1, forward=0 client — the fan-out target for `origin=sender`.
    let mut listener = Session::connect(harness.addr).await;
    listener.send(r#"{"action":"identify","options":{"receiver":true}}"#).await;
    assert_eq!(listener.recv_line().await, r#"{"status":"success"}"#);

    let mut sender = Session::connect(harness.addr).await;
    sender
        .send(r#"{"action":"send","code":{"protocol":["raw"],"pulses":[300,600,300,600,6000]}}"#)
        .await;
    assert_eq!(sender.recv_line().await, r#"{"status":"success"}"#);

    let broadcast_line = listener.recv_line().await;
    let broadcast: serde_json::Value = serde_json::from_str(&broadcast_line).unwrap();
    assert_eq!(broadcast["origin"], "sender");
    assert_eq!(broadcast["protocol"], "raw");

    harness.shutdown().await;
}

#[tokio::test]
async fn scenario_4_registry_round_trip() {
    let harness = spawn_test_broker().await;
    let mut session = Session::connect(harness.addr).await;

    session.send(r#"{"action":"registry","type":"set","key":"test.x","value":42}"#).await;
    assert_eq!(session.recv_line().await, r#"{"status":"success"}"#);

    session.send(r#"{"action":"registry","type":"get","key":"test.x"}"#).await;
    let get_reply = session.recv_line().await;
    let value: serde_json::Value = serde_json::from_str(&get_reply).unwrap();
    assert_eq!(value["message"], "registry");
    assert_eq!(value["value"]["value"], 42.0);

    session.send(r#"{"action":"registry","type":"remove","key":"test.x"}"#).await;
    assert_eq!(session.recv_line().await, r#"{"status":"success"}"#);

    session.send(r#"{"action":"registry","type":"get","key":"test.x"}"#).await;
    assert_eq!(session.recv_line().await, r#"{"status":"failed"}"#);

    harness.shutdown().await;
}

#[tokio::test]
async fn scenario_6_malformed_identify_disconnects() {
    let harness = spawn_test_broker().await;
    let mut session = Session::connect(harness.addr).await;

    session.send(r#"{"action":"identify","options":{"frobnicate":1}}"#).await;

    let mut line = String::new();
    let read = tokio::time::timeout(Duration::from_secs(2), session.reader.read_line(&mut line)).await;
    // The server closes the socket with no reply; read_line returns Ok(0) (EOF).
    assert!(matches!(read, Ok(Ok(0))));

    harness.shutdown().await;
}

#[tokio::test]
async fn p9_heartbeat_always_replies_beat() {
    let harness = spawn_test_broker().await;
    let mut session = Session::connect(harness.addr).await;

    session.send("HEART").await;
    assert_eq!(session.recv_line().await, "BEAT");

    harness.shutdown().await;
}

#[tokio::test]
async fn control_a_device_resolves_through_the_device_table() {
    let harness = spawn_test_broker().await;
    harness
        .broker
        .devices
        .insert(
            "lamp",
            DeviceConfig {
                protocol_id: "fixed".into(),
                settings: serde_json::json!({}),
                values: serde_json::json!({"state": "off"}),
                media: Media::All,
            },
        )
        .await;

    let mut listener = Session::connect(harness.addr).await;
    listener.send(r#"{"action":"identify","options":{"receiver":true}}"#).await;
    assert_eq!(listener.recv_line().await, r#"{"status":"success"}"#);

    let mut controller = Session::connect(harness.addr).await;
    controller
        .send(r#"{"action":"control","code":{"device":"lamp","state":"on"}}"#)
        .await;
    assert_eq!(controller.recv_line().await, r#"{"status":"success"}"#);

    let broadcast_line = listener.recv_line().await;
    let broadcast: serde_json::Value = serde_json::from_str(&broadcast_line).unwrap();
    assert_eq!(broadcast["origin"], "sender");
    assert_eq!(broadcast["protocol"], "fixed");

    harness.shutdown().await;
}
