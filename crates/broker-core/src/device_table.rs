use std::collections::HashMap;

use broker_protocol::Media;
use tokio::sync::RwLock;

/// Minimal device/config record: just enough for `control` to resolve a
/// device name to a protocol plus settings (§4.7), and for `request values`
/// / the broadcaster's media pruning (§4.6, P5) to have something to filter.
/// Full configuration-file parsing is an out-of-core collaborator (§1); this
/// table is populated once at startup from whatever the service layer loads.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub protocol_id: String,
    pub settings: serde_json::Value,
    pub values: serde_json::Value,
    pub media: Media,
}

pub struct DeviceTable {
    devices: RwLock<HashMap<String, DeviceConfig>>,
}

impl DeviceTable {
    pub fn new() -> Self {
        Self {
            devices: RwLock::new(HashMap::new()),
        }
    }

    pub async fn insert(&self, name: impl Into<String>, config: DeviceConfig) {
        self.devices.write().await.insert(name.into(), config);
    }

    pub async fn get(&self, name: &str) -> Option<DeviceConfig> {
        self.devices.read().await.get(name).cloned()
    }

    pub async fn update_values(&self, name: &str, values: serde_json::Value) -> bool {
        if let Some(device) = self.devices.write().await.get_mut(name) {
            device.values = values;
            true
        } else {
            false
        }
    }

    /// Snapshot filtered by media compatibility (§4.6, P5, `request values`).
    pub async fn values_for_media(&self, media: Media) -> serde_json::Value {
        let guard = self.devices.read().await;
        let mut out = serde_json::Map::new();
        for (name, device) in guard.iter() {
            if device.media.compatible(media) {
                out.insert(name.clone(), device.values.clone());
            }
        }
        serde_json::Value::Object(out)
    }

    /// Snapshot of every device, used by `request config` (§4.7). `forward`
    /// selects the lighter peer-sync projection: a peer only needs enough to
    /// identify and relay a device (protocol, media), not this node's local
    /// `settings`, which the internal (non-forward) projection includes.
    pub async fn config_snapshot(&self, forward: bool) -> serde_json::Value {
        let guard = self.devices.read().await;
        let mut devices = serde_json::Map::new();
        for (name, device) in guard.iter() {
            let mut entry = serde_json::json!({
                "protocol": [device.protocol_id],
                "media": format!("{:?}", device.media).to_lowercase(),
            });
            if !forward {
                if let Some(obj) = entry.as_object_mut() {
                    obj.insert("settings".to_string(), device.settings.clone());
                }
            }
            devices.insert(name.clone(), entry);
        }
        serde_json::json!({ "devices": devices })
    }
}

impl Default for DeviceTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn values_for_media_filters_by_compatibility() {
        let table = DeviceTable::new();
        table
            .insert(
                "lamp",
                DeviceConfig {
                    protocol_id: "kaku_switch".into(),
                    settings: serde_json::json!({}),
                    values: serde_json::json!({"state": "on"}),
                    media: Media::Mobile,
                },
            )
            .await;
        table
            .insert(
                "tv",
                DeviceConfig {
                    protocol_id: "kaku_switch".into(),
                    settings: serde_json::json!({}),
                    values: serde_json::json!({"state": "off"}),
                    media: Media::Desktop,
                },
            )
            .await;

        let snapshot = table.values_for_media(Media::Mobile).await;
        let obj = snapshot.as_object().unwrap();
        assert!(obj.contains_key("lamp"));
        assert!(!obj.contains_key("tv"));
    }

    #[tokio::test]
    async fn config_snapshot_strips_settings_for_the_forward_projection() {
        let table = DeviceTable::new();
        table
            .insert(
                "lamp",
                DeviceConfig {
                    protocol_id: "kaku_switch".into(),
                    settings: serde_json::json!({"id": 1, "unit": 2}),
                    values: serde_json::json!({"state": "on"}),
                    media: Media::All,
                },
            )
            .await;

        let internal = table.config_snapshot(false).await;
        assert_eq!(internal["devices"]["lamp"]["settings"], serde_json::json!({"id": 1, "unit": 2}));

        let forward = table.config_snapshot(true).await;
        assert!(forward["devices"]["lamp"].get("settings").is_none());
        assert_eq!(forward["devices"]["lamp"]["protocol"], serde_json::json!(["kaku_switch"]));
    }
}
