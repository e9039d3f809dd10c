use std::sync::Arc;

use broker_protocol::{
    BroadcastEnvelope, Origin, RegistryValue, CORE_TYPE_FIRMWARE, CORE_TYPE_PROCESS,
    FIRMWARE_PROTOCOL_ID,
};
use tokio::sync::mpsc;

use crate::client::Client;
use crate::context::{Broker, BrokerMode};

/// Broadcaster worker (C6): drains BroadcastQ, stamps the node uuid, and
/// fans out each envelope to clients per §4.6's routing rules. `parent` is
/// the outbound line channel to the peer connection when running ADHOC.
pub async fn run_broadcaster(broker: Arc<Broker>, parent: Option<mpsc::Sender<String>>) {
    while let Some(mut envelope) = broker.broadcast_queue.dequeue().await {
        if envelope.uuid.is_none() {
            envelope.uuid = Some(broker.settings.node_uuid.clone());
        }

        if envelope.origin == Origin::Core {
            route_core_message(&broker, &envelope).await;
            if broker.settings.mode == BrokerMode::Adhoc {
                forward_to_parent(&parent, &envelope, "update").await;
            }
            continue;
        }

        if envelope.protocol_id == FIRMWARE_PROTOCOL_ID {
            if let Some(synthetic) = apply_firmware_side_effect(&broker, &envelope).await {
                broker.broadcast_queue.try_enqueue(synthetic).await;
            }
        }

        route_device_message(&broker, &envelope).await;
        if broker.settings.mode == BrokerMode::Adhoc {
            forward_to_parent(&parent, &envelope, "update").await;
        }
    }
}

async fn route_core_message(broker: &Broker, envelope: &BroadcastEnvelope) {
    let core_type = envelope.core_type.unwrap_or(-1);
    let line = serde_json::to_string(envelope).unwrap_or_default();

    if core_type < 0 {
        broker.clients.broadcast_to(|c| c.flags.core, line.clone()).await;
    } else {
        broker.clients.broadcast_to(|c| c.flags.config, line.clone()).await;
    }
    if core_type == CORE_TYPE_PROCESS {
        broker.clients.broadcast_to(|c| c.flags.stats, line).await;
    }
}

/// §4.6 "other origins" path: per-client media pruning for `config=1`
/// clients, and a stripped view for `receiver=1, forward=0` clients.
async fn route_device_message(broker: &Broker, envelope: &BroadcastEnvelope) {
    // config=1 clients: each gets its own media-pruned view of `devices`, so
    // this can't reuse `ClientTable::broadcast_to`'s single shared line.
    broker
        .clients
        .send_per_client(
            |c| c.flags.config,
            |client| {
                let pruned = prune_devices_by_media(&envelope.message, client.media);
                let mut view = envelope.clone();
                view.message = pruned;
                serde_json::to_string(&view).unwrap_or_default()
            },
        )
        .await;

    if envelope.is_payload_broadcastable() {
        let stripped = strip_settings_and_update_tag(envelope);
        let line = serde_json::to_string(&stripped).unwrap_or_default();
        broker
            .clients
            .broadcast_to(|c| c.flags.receiver && !c.flags.forward, line)
            .await;
    }
}

fn prune_devices_by_media(message: &serde_json::Value, media: broker_protocol::Media) -> serde_json::Value {
    let mut pruned = message.clone();
    if let Some(devices) = pruned.get_mut("devices").and_then(|d| d.as_array_mut()) {
        devices.retain(|entry| {
            let entry_media = entry
                .get("media")
                .and_then(|m| m.as_str())
                .and_then(parse_media)
                .unwrap_or(broker_protocol::Media::All);
            entry_media.compatible(media)
        });
    }
    pruned
}

fn parse_media(s: &str) -> Option<broker_protocol::Media> {
    match s {
        "all" => Some(broker_protocol::Media::All),
        "web" => Some(broker_protocol::Media::Web),
        "mobile" => Some(broker_protocol::Media::Mobile),
        "desktop" => Some(broker_protocol::Media::Desktop),
        _ => None,
    }
}

/// Strip `settings` and any `action: update` tag for the plain
/// `receiver=1, forward=0` client view (§4.6).
fn strip_settings_and_update_tag(envelope: &BroadcastEnvelope) -> BroadcastEnvelope {
    let mut view = envelope.clone();
    view.settings = None;
    if let Some(obj) = view.message.as_object_mut() {
        if obj.get("action").and_then(|v| v.as_str()) == Some("update") {
            obj.remove("action");
        }
    }
    view
}

/// §4.6 firmware side effect: update the firmware registry entries and
/// build the synthetic `core/FIRMWARE` re-broadcast. Returns `None` if the
/// payload didn't carry the expected fields (no side effect, no re-emit).
async fn apply_firmware_side_effect(
    broker: &Broker,
    envelope: &BroadcastEnvelope,
) -> Option<BroadcastEnvelope> {
    let obj = envelope.message.as_object()?;
    let version = obj.get("version")?.as_f64()?;
    let lpf = obj.get("lpf")?.as_f64()?;
    let hpf = obj.get("hpf")?.as_f64()?;
    if version <= 0.0 || lpf <= 0.0 || hpf <= 0.0 {
        return None;
    }

    broker.registry.set("pilight.firmware.version", RegistryValue::number(version, 0)).await;
    broker.registry.set("pilight.firmware.lpf", RegistryValue::number(lpf, 0)).await;
    broker.registry.set("pilight.firmware.hpf", RegistryValue::number(hpf, 0)).await;

    Some(BroadcastEnvelope::core(
        CORE_TYPE_FIRMWARE,
        serde_json::json!({"version": version, "lpf": lpf, "hpf": hpf}),
    ))
}

async fn forward_to_parent(parent: &Option<mpsc::Sender<String>>, envelope: &BroadcastEnvelope, action: &str) {
    let Some(parent) = parent else { return };
    let mut tagged = serde_json::to_value(envelope).unwrap_or_default();
    if let Some(obj) = tagged.as_object_mut() {
        obj.insert("action".to_string(), serde_json::json!(action));
    }
    let _ = parent.send(tagged.to_string()).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::BrokerSettings;
    use crate::protocol_registry::ProtocolRegistry;
    use broker_protocol::ClientFlags;

    fn test_broker(mode: BrokerMode) -> Arc<Broker> {
        Arc::new(Broker::new(
            BrokerSettings {
                port: 0,
                receive_repeats: 1,
                mode,
                node_uuid: "node-1".into(),
                watchdog_enabled: false,
                stats_enabled: false,
            },
            ProtocolRegistry::new(Vec::new()),
        ))
    }

    async fn add_client(broker: &Broker, id: u64, flags: ClientFlags) -> tokio::sync::mpsc::Receiver<String> {
        let (tx, rx) = tokio::sync::mpsc::channel(8);
        broker.clients.insert(Client::new(id, tx)).await;
        broker.clients.update_identify(id, None, None, flags).await;
        rx
    }

    #[tokio::test]
    async fn core_negative_type_routes_only_to_core_flagged_clients() {
        let broker = test_broker(BrokerMode::Standalone);
        let mut core_rx = add_client(&broker, 1, ClientFlags { core: true, ..Default::default() }).await;
        let mut config_rx = add_client(&broker, 2, ClientFlags { config: true, ..Default::default() }).await;

        broker
            .broadcast_queue
            .try_enqueue(BroadcastEnvelope::core(-1, serde_json::json!({"x": 1})))
            .await;
        broker.broadcast_queue.stop();
        run_broadcaster(broker.clone(), None).await;

        assert!(core_rx.try_recv().is_ok());
        assert!(config_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn core_process_type_also_reaches_stats_clients() {
        let broker = test_broker(BrokerMode::Standalone);
        let mut stats_rx = add_client(&broker, 1, ClientFlags { stats: true, ..Default::default() }).await;

        broker
            .broadcast_queue
            .try_enqueue(BroadcastEnvelope::core(
                CORE_TYPE_PROCESS,
                serde_json::json!({"cpu": 1.0, "ram": 2.0}),
            ))
            .await;
        broker.broadcast_queue.stop();
        run_broadcaster(broker.clone(), None).await;

        assert!(stats_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn firmware_payload_updates_registry_and_emits_synthetic_broadcast_once() {
        let broker = test_broker(BrokerMode::Standalone);

        broker
            .broadcast_queue
            .try_enqueue(BroadcastEnvelope::new(
                FIRMWARE_PROTOCOL_ID,
                serde_json::json!({"version": 5, "lpf": 1, "hpf": 2}),
                Origin::Receiver,
            ))
            .await;
        broker.broadcast_queue.stop();
        run_broadcaster(broker.clone(), None).await;

        assert_eq!(
            broker.registry.get("pilight.firmware.version").await.unwrap(),
            RegistryValue::number(5.0, 0)
        );
    }

    #[tokio::test]
    async fn firmware_payload_with_any_nonpositive_field_has_no_side_effect() {
        let broker = test_broker(BrokerMode::Standalone);

        broker
            .broadcast_queue
            .try_enqueue(BroadcastEnvelope::new(
                FIRMWARE_PROTOCOL_ID,
                serde_json::json!({"version": 0, "lpf": 0, "hpf": 5}),
                Origin::Receiver,
            ))
            .await;
        broker.broadcast_queue.stop();
        run_broadcaster(broker.clone(), None).await;

        assert!(broker.registry.get("pilight.firmware.version").await.is_err());
    }

    #[test]
    fn prune_devices_by_media_keeps_only_compatible_entries() {
        let message = serde_json::json!({
            "devices": [
                {"name": "a", "media": "mobile"},
                {"name": "b", "media": "desktop"},
                {"name": "c", "media": "all"}
            ]
        });
        let pruned = prune_devices_by_media(&message, broker_protocol::Media::Mobile);
        let names: Vec<_> = pruned["devices"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a", "c"]);
    }
}
