use std::sync::Arc;

use broker_protocol::{BroadcastEnvelope, Origin, PulseFrame, RAW_PROTOCOL_ID};
use rf_hardware::{ReceiveDriver, Transmitter};
use tracing::warn;

use crate::context::Broker;

/// Sender worker (C5): drains SendQ, pauses receivers, invokes the matching
/// transmitter, resumes receivers, and reflects `raw` sends back onto RecvQ.
pub async fn run_sender(
    broker: Arc<Broker>,
    transmitters: Vec<Arc<dyn Transmitter>>,
    receivers: Vec<Arc<dyn ReceiveDriver>>,
) {
    while let Some(request) = broker.send_queue.dequeue().await {
        let protocol = broker.protocols.lookup_by_name(&request.protocol_id);
        let hwtype = protocol.map(|p| p.hwtype);
        let txrpt = protocol.map_or(1, |p| p.txrpt);

        let transmitter = hwtype.and_then(|hw| transmitters.iter().find(|t| t.hwtype() == hw));

        for receiver in &receivers {
            receiver.set_wait(true).await;
        }

        if let Some(transmitter) = transmitter {
            if let Err(err) = transmitter.send(&request.pulses, txrpt).await {
                warn!("send failed for protocol {}: {err}", request.protocol_id);
            }
        } else {
            warn!(
                "no transmitter registered for protocol {} (hwtype {:?})",
                request.protocol_id, hwtype
            );
        }

        for receiver in &receivers {
            receiver.set_wait(false).await;
        }

        // The `raw` feedback loop is intentional (§9 Design Notes): reflect
        // the sent pulses back onto RecvQ regardless of whether a real
        // transmitter handled the send.
        if request.protocol_id == RAW_PROTOCOL_ID {
            let frame = PulseFrame::new(request.pulses.clone(), hwtype.unwrap_or(-1), 0);
            broker.recv_queue.try_enqueue(frame).await;
        }

        let mut envelope =
            BroadcastEnvelope::new(request.protocol_id.clone(), request.code.clone(), Origin::Sender)
                .with_repeats(1);
        if let Some(uuid) = &request.target_uuid {
            envelope = envelope.with_uuid(uuid.clone());
        }
        broker.broadcast_queue.try_enqueue(envelope).await;
    }
}
