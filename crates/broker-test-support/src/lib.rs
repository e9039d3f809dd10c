//! Fakes and a one-call harness for exercising the broker message engine
//! end to end without real RF hardware. Mirrors the mock-server/mock-client
//! pattern used for the remote-forwarding test suite: a scriptable fake per
//! collaborator trait, plus a single spawn function that wires a complete
//! [`Broker`] and hands back a socket address a test client can dial.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use broker_core::{Broker, BrokerMode, BrokerSettings, ProtocolRegistry};
use broker_protocol::PulseFrame;
use rf_hardware::{
    DecodeOutcome, DiscoveryProvider, DriverKind, EncodeOutcome, HardwareError, ProtocolDecoder,
    ProtocolDescriptor, ProtocolEncoder, ReceiveDriver, ResourceSample, ResourceSampler,
    Transmitter,
};
use tokio::net::TcpListener;

/// A receiver hardware module driven entirely by a pre-loaded script.
/// Exhausting the script yields a fatal error, which stops the receive
/// worker's loop — tests drive exactly as many reads as they script.
pub struct FakeReceiveDriver {
    kind: DriverKind,
    hwtype: i32,
    edge_script: StdMutex<VecDeque<Result<u32, HardwareError>>>,
    frame_script: StdMutex<VecDeque<Result<Option<Vec<u32>>, HardwareError>>>,
    waits: StdMutex<Vec<bool>>,
}

impl FakeReceiveDriver {
    pub fn edge(hwtype: i32, script: Vec<Result<u32, HardwareError>>) -> Self {
        Self {
            kind: DriverKind::Edge,
            hwtype,
            edge_script: StdMutex::new(script.into()),
            frame_script: StdMutex::new(VecDeque::new()),
            waits: StdMutex::new(Vec::new()),
        }
    }

    pub fn frame(hwtype: i32, script: Vec<Result<Option<Vec<u32>>, HardwareError>>) -> Self {
        Self {
            kind: DriverKind::Frame,
            hwtype,
            edge_script: StdMutex::new(VecDeque::new()),
            frame_script: StdMutex::new(script.into()),
            waits: StdMutex::new(Vec::new()),
        }
    }

    /// The sequence of `set_wait` calls observed so far, oldest first.
    pub fn wait_log(&self) -> Vec<bool> {
        self.waits.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReceiveDriver for FakeReceiveDriver {
    fn kind(&self) -> DriverKind {
        self.kind
    }

    fn hwtype(&self) -> i32 {
        self.hwtype
    }

    async fn read_edge(&self) -> Result<u32, HardwareError> {
        self.edge_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(HardwareError::Fatal("script exhausted".into())))
    }

    async fn read_frame(&self) -> Result<Option<Vec<u32>>, HardwareError> {
        self.frame_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(HardwareError::Fatal("script exhausted".into())))
    }

    async fn set_wait(&self, wait: bool) {
        self.waits.lock().unwrap().push(wait);
    }
}

/// A transmitter that records every send and always succeeds.
pub struct FakeTransmitter {
    hwtype: i32,
    sent: StdMutex<Vec<(Vec<u32>, u32)>>,
}

impl FakeTransmitter {
    pub fn new(hwtype: i32) -> Self {
        Self {
            hwtype,
            sent: StdMutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<(Vec<u32>, u32)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transmitter for FakeTransmitter {
    fn hwtype(&self) -> i32 {
        self.hwtype
    }

    async fn send(&self, pulses: &[u32], txrpt: u32) -> Result<(), HardwareError> {
        self.sent.lock().unwrap().push((pulses.to_vec(), txrpt));
        Ok(())
    }
}

/// Decoder/encoder pair that treats every pulse train as its own payload —
/// the fake stand-in for the `raw` loopback protocol (§9 Design Notes).
pub struct PassthroughProtocol;

impl ProtocolDecoder for PassthroughProtocol {
    fn decode(&self, frame: &PulseFrame) -> DecodeOutcome {
        DecodeOutcome::Match {
            payload: serde_json::json!({"pulses": frame.pulses}),
        }
    }
}

impl ProtocolEncoder for PassthroughProtocol {
    fn encode(&self, code: &serde_json::Value) -> Option<EncodeOutcome> {
        let pulses: Vec<u32> = code
            .get("pulses")?
            .as_array()?
            .iter()
            .filter_map(|v| v.as_u64().map(|n| n as u32))
            .collect();
        Some(EncodeOutcome {
            frame: PulseFrame::new(pulses, 0, 0),
            payload: Some(code.clone()),
        })
    }
}

/// Decoder/encoder pair for a fixed `id`/`state` device code, used to test
/// the repetition gate and `control` dispatch without a real codec.
pub struct FixedCodeProtocol {
    pub id: u64,
}

impl ProtocolDecoder for FixedCodeProtocol {
    fn decode(&self, _frame: &PulseFrame) -> DecodeOutcome {
        DecodeOutcome::Match {
            payload: serde_json::json!({"id": self.id, "state": "on"}),
        }
    }
}

impl ProtocolEncoder for FixedCodeProtocol {
    fn encode(&self, code: &serde_json::Value) -> Option<EncodeOutcome> {
        Some(EncodeOutcome {
            frame: PulseFrame::new(vec![300, 600, 300, 600], 0, 0),
            payload: Some(code.clone()),
        })
    }
}

/// Discovery provider that always resolves to the same fixed address.
pub struct FixedDiscovery(pub SocketAddr);

#[async_trait]
impl DiscoveryProvider for FixedDiscovery {
    async fn discover(&self) -> Result<SocketAddr, HardwareError> {
        Ok(self.0)
    }
}

/// Resource sampler driven by a pre-loaded script; repeats the last sample
/// once exhausted so long-running watchdog tests don't need an oversized script.
pub struct ScriptedSampler {
    script: StdMutex<VecDeque<ResourceSample>>,
    last: StdMutex<ResourceSample>,
}

impl ScriptedSampler {
    pub fn new(script: Vec<ResourceSample>) -> Self {
        let last = script.first().copied().unwrap_or(ResourceSample { cpu_pct: 0.0, ram_pct: 0.0 });
        Self {
            script: StdMutex::new(script.into()),
            last: StdMutex::new(last),
        }
    }
}

#[async_trait]
impl ResourceSampler for ScriptedSampler {
    async fn sample(&self) -> ResourceSample {
        let mut guard = self.script.lock().unwrap();
        match guard.pop_front() {
            Some(sample) => {
                *self.last.lock().unwrap() = sample;
                sample
            }
            None => *self.last.lock().unwrap(),
        }
    }
}

/// A running test broker: the shared context plus the bound client-facing
/// socket address, with every worker already spawned in the background.
pub struct TestBroker {
    pub broker: Arc<Broker>,
    pub addr: SocketAddr,
    handles: Vec<tokio::task::JoinHandle<()>>,
}

impl TestBroker {
    /// Stop every worker and await their completion.
    pub async fn shutdown(self) {
        self.broker.initiate_shutdown();
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

/// Build a [`Broker`] registered with the fake `raw` and `fixed` protocols,
/// spawn the client session manager (C7), decoder (C4) and broadcaster (C6)
/// workers, and bind a loopback listener a test client can connect to.
/// Receive/send pipelines (C3/C5) are left to the caller since most session
/// scenarios only need C4/C6/C7.
pub async fn spawn_test_broker() -> TestBroker {
    let protocols = vec![
        ProtocolDescriptor {
            id: "raw".into(),
            hwtype: rf_hardware::HWTYPE_ANY,
            rxrpt: 1,
            txrpt: 1,
            min_raw: 0,
            max_raw: 1024,
            min_gap: 0,
            max_gap: 0,
            option_schema: Vec::new(),
            decoder: Some(Arc::new(PassthroughProtocol)),
            encoder: Some(Arc::new(PassthroughProtocol)),
        },
        ProtocolDescriptor {
            id: "fixed".into(),
            hwtype: 0,
            rxrpt: 1,
            txrpt: 1,
            min_raw: 0,
            max_raw: 1024,
            min_gap: 0,
            max_gap: 0,
            option_schema: Vec::new(),
            decoder: Some(Arc::new(FixedCodeProtocol { id: 1 })),
            encoder: Some(Arc::new(FixedCodeProtocol { id: 1 })),
        },
    ];

    let broker = Arc::new(Broker::new(
        BrokerSettings {
            port: 0,
            receive_repeats: 1,
            mode: BrokerMode::Standalone,
            node_uuid: "test-node".into(),
            watchdog_enabled: false,
            stats_enabled: false,
        },
        ProtocolRegistry::new(protocols),
    ));

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");

    let transmitters: Vec<Arc<dyn Transmitter>> =
        vec![Arc::new(FakeTransmitter::new(rf_hardware::HWTYPE_ANY)), Arc::new(FakeTransmitter::new(0))];

    let mut handles = Vec::new();
    handles.push(tokio::spawn(broker_core::run_decoder(broker.clone())));
    handles.push(tokio::spawn(broker_core::run_broadcaster(broker.clone(), None)));
    handles.push(tokio::spawn(broker_core::run_session_manager(broker.clone(), listener)));
    handles.push(tokio::spawn(broker_core::run_sender(broker.clone(), transmitters, Vec::new())));

    TestBroker { broker, addr, handles }
}
