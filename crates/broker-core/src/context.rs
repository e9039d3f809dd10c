use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use broker_protocol::{BroadcastEnvelope, PulseFrame, SendRequest};
use tokio::sync::Notify;

use crate::client::ClientTable;
use crate::device_table::DeviceTable;
use crate::protocol_registry::ProtocolRegistry;
use crate::queue::BoundedQueue;
use crate::registry_store::RegistryStore;

/// STANDALONE runs its own socket server; ADHOC (peer/client) mode additionally
/// forwards through a parent connection (§4.6, GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerMode {
    Standalone,
    Adhoc,
}

#[derive(Debug, Clone)]
pub struct BrokerSettings {
    pub port: u16,
    pub receive_repeats: u32,
    pub mode: BrokerMode,
    pub node_uuid: String,
    pub watchdog_enabled: bool,
    pub stats_enabled: bool,
}

/// The single explicit context threaded through every worker: queues,
/// client table, protocol registry, registry store and run-state. This
/// replaces the original's global mutable statics (§9 Design Notes,
/// "Global mutable state") — no component in this crate reaches for a
/// singleton or `static`.
pub struct Broker {
    pub settings: BrokerSettings,
    pub recv_queue: BoundedQueue<PulseFrame>,
    pub send_queue: BoundedQueue<SendRequest>,
    pub broadcast_queue: BoundedQueue<BroadcastEnvelope>,
    pub clients: ClientTable,
    pub protocols: ProtocolRegistry,
    pub registry: RegistryStore,
    pub devices: DeviceTable,
    pub stopping: AtomicBool,
    /// Broker-wide shutdown signal for workers that aren't blocked on a
    /// `BoundedQueue` (e.g. the clientize stream's socket read), so they can
    /// race it with `tokio::select!` instead of polling `is_stopping()`.
    pub shutdown: Notify,
    next_send_id: AtomicU64,
}

impl Broker {
    pub fn new(settings: BrokerSettings, protocols: ProtocolRegistry) -> Self {
        Self {
            settings,
            recv_queue: BoundedQueue::new(),
            send_queue: BoundedQueue::new(),
            broadcast_queue: BoundedQueue::new(),
            clients: ClientTable::new(),
            protocols,
            registry: RegistryStore::new(),
            devices: DeviceTable::new(),
            stopping: AtomicBool::new(false),
            shutdown: Notify::new(),
            next_send_id: AtomicU64::new(1),
        }
    }

    pub fn next_send_id(&self) -> u64 {
        self.next_send_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }

    /// Shutdown procedure (§5 Cancellation): flip the flag, then wake every
    /// queue so blocked consumers observe it and exit their loop.
    pub fn initiate_shutdown(&self) {
        self.stopping.store(true, Ordering::Release);
        self.recv_queue.stop();
        self.send_queue.stop();
        self.broadcast_queue.stop();
        self.shutdown.notify_waiters();
    }
}
