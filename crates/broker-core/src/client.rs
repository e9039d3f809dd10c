use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use broker_protocol::{ClientFlags, Media};
use tokio::sync::{mpsc, RwLock};

/// Monotonic per-accept session identifier (§3 `Client.sessionId`).
pub type ClientId = u64;

/// One connected client (§3 `Client`). `outbox` is the channel the
/// broadcaster and session-reply paths use to hand the session's writer
/// task a line to send; it is this crate's message-passing substitute for
/// writing directly from multiple workers into one socket (§5 Design Notes,
/// "recursive mutexes").
pub struct Client {
    pub id: ClientId,
    pub uuid: Option<String>,
    pub media: Media,
    pub flags: ClientFlags,
    pub cpu_pct: f64,
    pub ram_pct: f64,
    pub outbox: mpsc::Sender<String>,
}

impl Client {
    pub fn new(id: ClientId, outbox: mpsc::Sender<String>) -> Self {
        Self {
            id,
            uuid: None,
            media: Media::All,
            flags: ClientFlags::default(),
            cpu_pct: 0.0,
            ram_pct: 0.0,
            outbox,
        }
    }

    /// `identify` may be issued more than once on the same socket; this
    /// mutates the existing record in place rather than creating a new one
    /// (§4.7, P6).
    pub fn apply_identify(&mut self, uuid: Option<String>, media: Option<Media>, flags: ClientFlags) {
        if let Some(uuid) = uuid {
            self.uuid = Some(uuid);
        }
        if let Some(media) = media {
            self.media = media;
        }
        self.flags = flags;
    }

    pub fn apply_usage_update(&mut self, cpu_pct: Option<f64>, ram_pct: Option<f64>) {
        if let Some(cpu) = cpu_pct {
            self.cpu_pct = cpu;
        }
        if let Some(ram) = ram_pct {
            self.ram_pct = ram;
        }
    }
}

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

pub fn next_client_id() -> ClientId {
    NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed)
}

/// The client list (§3, §5 "client list ... serialize mutation with a single
/// lock"). One `RwLock`, no re-entrant locking: reads (broadcaster fan-out)
/// and writes (accept/identify/disconnect) each take the lock exactly once.
pub struct ClientTable {
    clients: RwLock<HashMap<ClientId, Client>>,
}

impl ClientTable {
    pub fn new() -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
        }
    }

    pub async fn insert(&self, client: Client) {
        self.clients.write().await.insert(client.id, client);
    }

    pub async fn remove(&self, id: ClientId) {
        self.clients.write().await.remove(&id);
    }

    pub async fn update_identify(
        &self,
        id: ClientId,
        uuid: Option<String>,
        media: Option<Media>,
        flags: ClientFlags,
    ) -> bool {
        if let Some(client) = self.clients.write().await.get_mut(&id) {
            client.apply_identify(uuid, media, flags);
            true
        } else {
            false
        }
    }

    pub async fn update_usage(&self, id: ClientId, cpu_pct: Option<f64>, ram_pct: Option<f64>) -> bool {
        if let Some(client) = self.clients.write().await.get_mut(&id) {
            client.apply_usage_update(cpu_pct, ram_pct);
            true
        } else {
            false
        }
    }

    pub async fn media_of(&self, id: ClientId) -> Option<Media> {
        self.clients.read().await.get(&id).map(|c| c.media)
    }

    pub async fn flags_of(&self, id: ClientId) -> Option<ClientFlags> {
        self.clients.read().await.get(&id).map(|c| c.flags)
    }

    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Send `line` to every client for which `predicate` returns true.
    /// Best-effort: a closed outbox is silently skipped (§4.6, the client is
    /// reaped by the session task, not here).
    pub async fn broadcast_to<F>(&self, predicate: F, line: String)
    where
        F: Fn(&Client) -> bool,
    {
        let guard = self.clients.read().await;
        for client in guard.values().filter(|c| predicate(c)) {
            let _ = client.outbox.send(line.clone()).await;
        }
    }

    /// Like [`Self::broadcast_to`], but `render` computes a distinct line
    /// per matching client (used for per-client media-pruned views, §4.6).
    pub async fn send_per_client<P, R>(&self, predicate: P, render: R)
    where
        P: Fn(&Client) -> bool,
        R: Fn(&Client) -> String,
    {
        let guard = self.clients.read().await;
        for client in guard.values().filter(|c| predicate(c)) {
            let _ = client.outbox.send(render(client)).await;
        }
    }

    pub async fn send_to(&self, id: ClientId, line: String) -> bool {
        if let Some(client) = self.clients.read().await.get(&id) {
            client.outbox.send(line).await.is_ok()
        } else {
            false
        }
    }
}

impl Default for ClientTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_client(id: ClientId) -> (Client, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(8);
        (Client::new(id, tx), rx)
    }

    #[tokio::test]
    async fn identify_twice_updates_same_record_without_duplicating() {
        let table = ClientTable::new();
        let (client, _rx) = make_client(1);
        table.insert(client).await;

        let mut flags = ClientFlags::default();
        flags.receiver = true;
        assert!(
            table
                .update_identify(1, Some("node-a".into()), Some(Media::Mobile), flags)
                .await
        );

        let mut flags2 = ClientFlags::default();
        flags2.stats = true;
        assert!(table.update_identify(1, None, None, flags2).await);

        assert_eq!(table.len().await, 1);
    }

    #[tokio::test]
    async fn broadcast_to_only_reaches_matching_clients() {
        let table = ClientTable::new();
        let (c1, mut rx1) = make_client(1);
        let (c2, mut rx2) = make_client(2);
        table.insert(c1).await;
        table.insert(c2).await;
        table
            .update_identify(1, None, None, ClientFlags { core: true, ..Default::default() })
            .await;

        table
            .broadcast_to(|c| c.flags.core, "hello".to_string())
            .await;

        assert_eq!(rx1.try_recv().unwrap(), "hello");
        assert!(rx2.try_recv().is_err());
    }
}
