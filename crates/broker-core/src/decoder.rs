use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use broker_protocol::{BroadcastEnvelope, Origin, FIRMWARE_PROTOCOL_ID};
use rf_hardware::DecodeOutcome;
use tokio::time::Instant;
use tracing::warn;

use crate::context::Broker;
use crate::REPEAT_GATE_RESET_US;

/// Per-protocol repetition-gate state (§3, §4.4, P2). Kept separate from
/// `Broker` since it is private working state of the decoder worker, not
/// something other components read.
#[derive(Default)]
struct RepeatGate {
    state: HashMap<String, (Instant, u32)>,
}

impl RepeatGate {
    /// Record a match at `now`, resetting the counter if the gap since the
    /// last match on this protocol exceeded the reset window. Returns the
    /// post-increment repeat count.
    fn register_match(&mut self, protocol_id: &str, now: Instant) -> u32 {
        let reset_window = Duration::from_micros(REPEAT_GATE_RESET_US);
        let entry = self
            .state
            .entry(protocol_id.to_string())
            .or_insert((now, 0));
        if now.duration_since(entry.0) > reset_window {
            entry.1 = 0;
        }
        entry.1 += 1;
        entry.0 = now;
        entry.1
    }
}

/// Decoder worker (C4): drains RecvQ, tries every compatible protocol,
/// applies repetition gating, and enqueues matches onto BroadcastQ.
pub async fn run_decoder(broker: Arc<Broker>) {
    let mut gate = RepeatGate::default();
    while let Some(frame) = broker.recv_queue.dequeue().await {
        let candidates: Vec<_> = broker.protocols.compatible_protocols(&frame).collect();
        for protocol in candidates {
            let outcome = broker.protocols.decode(protocol, &frame);
            let DecodeOutcome::Match { payload } = outcome else {
                continue;
            };

            let (emit, repeats) = if protocol.id == FIRMWARE_PROTOCOL_ID {
                // Firmware bypasses the gate: emit on first match (§4.4).
                (true, 1)
            } else {
                let threshold = (broker.settings.receive_repeats * protocol.rxrpt).max(1);
                let repeats = gate.register_match(&protocol.id, Instant::now());
                (repeats >= threshold, repeats)
            };

            if emit {
                let envelope = BroadcastEnvelope::new(protocol.id.clone(), payload, Origin::Receiver)
                    .with_repeats(repeats);
                if broker.broadcast_queue.try_enqueue(envelope).await
                    == crate::QueueOutcome::Dropped
                {
                    warn!("BroadcastQ full, dropped decoded message for {}", protocol.id);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn gate_withholds_until_threshold_then_emits_every_match_within_window() {
        let mut gate = RepeatGate::default();
        let threshold = 3;

        assert!(gate.register_match("proto", Instant::now()) < threshold);
        assert!(gate.register_match("proto", Instant::now()) < threshold);
        assert_eq!(gate.register_match("proto", Instant::now()), threshold);

        tokio::time::advance(Duration::from_millis(10)).await;
        assert!(gate.register_match("proto", Instant::now()) >= threshold);
    }

    #[tokio::test(start_paused = true)]
    async fn gap_over_500ms_resets_the_counter() {
        let mut gate = RepeatGate::default();
        gate.register_match("proto", Instant::now());
        gate.register_match("proto", Instant::now());

        tokio::time::advance(Duration::from_millis(501)).await;

        let repeats = gate.register_match("proto", Instant::now());
        assert_eq!(repeats, 1, "counter should have reset after a >500ms gap");
    }

    #[tokio::test(start_paused = true)]
    async fn gap_under_500ms_does_not_reset() {
        let mut gate = RepeatGate::default();
        gate.register_match("proto", Instant::now());

        tokio::time::advance(Duration::from_millis(100)).await;
        let repeats = gate.register_match("proto", Instant::now());
        assert_eq!(repeats, 2);
    }
}
