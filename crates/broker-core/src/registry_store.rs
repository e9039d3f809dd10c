use std::collections::HashMap;

use broker_protocol::RegistryValue;
use tokio::sync::RwLock;

use crate::error::RegistryError;

/// The key/value store (C10). A flat dotted-key map with its own lock — the
/// §5 shared-resource policy calls out the registry as needing its own
/// mutex, separate from the client table and the queues.
pub struct RegistryStore {
    entries: RwLock<HashMap<String, RegistryValue>>,
}

impl RegistryStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn set(&self, key: impl Into<String>, value: RegistryValue) {
        self.entries.write().await.insert(key.into(), value);
    }

    pub async fn get(&self, key: &str) -> Result<RegistryValue, RegistryError> {
        self.entries
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(key.to_string()))
    }

    /// Idempotent: removing an absent key is not an error (§4.10).
    pub async fn remove(&self, key: &str) {
        self.entries.write().await.remove(key);
    }
}

impl Default for RegistryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trip_set_get_remove_then_get_fails() {
        let store = RegistryStore::new();
        store.set("test.x", RegistryValue::number(42.0, 0)).await;
        assert_eq!(store.get("test.x").await.unwrap(), RegistryValue::number(42.0, 0));

        store.remove("test.x").await;
        assert!(matches!(store.get("test.x").await, Err(RegistryError::NotFound(_))));
    }

    #[tokio::test]
    async fn remove_is_idempotent_on_missing_key() {
        let store = RegistryStore::new();
        store.remove("never.existed").await;
        store.remove("never.existed").await;
    }
}
