use std::sync::Arc;
use std::time::Duration;

use broker_protocol::PulseFrame;
use rf_hardware::{HardwareError, ReceiveDriver, PULSE_DIV};
use tracing::{debug, warn};

use crate::context::Broker;

/// Edge driver loop (COMOOK, §4.3): accumulate edges until a long-enough
/// gap closes the frame, then enqueue if its length fits the registry's
/// union bounds.
pub async fn run_edge_receiver(
    broker: Arc<Broker>,
    driver: Arc<dyn ReceiveDriver>,
    min_raw: usize,
    max_raw: usize,
    min_gap: u32,
    max_gap: u32,
) {
    let mut buffer: Vec<u32> = Vec::new();
    let mut pulse_len: u32 = 0;
    while !broker.is_stopping() {
        match driver.read_edge().await {
            Ok(duration) => {
                buffer.push(duration);
                if duration > min_gap {
                    if duration < max_gap {
                        pulse_len = duration / PULSE_DIV;
                    }
                    if buffer.len() >= min_raw && buffer.len() <= max_raw {
                        let frame = PulseFrame::new(buffer.clone(), driver.hwtype(), pulse_len);
                        if broker.recv_queue.try_enqueue(frame).await
                            == crate::QueueOutcome::Dropped
                        {
                            warn!("RecvQ full, dropped framed pulse train");
                        }
                    }
                    buffer.clear();
                }
            }
            Err(HardwareError::Transient(msg)) => {
                debug!("edge driver transient failure: {msg}");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
            Err(HardwareError::Fatal(msg)) => {
                warn!("edge driver fatal failure, stopping receiver: {msg}");
                break;
            }
        }
    }
}

/// Frame driver loop (COMPLSTRAIN, §4.3): the driver already returns a
/// complete pulse sequence per call.
pub async fn run_frame_receiver(
    broker: Arc<Broker>,
    driver: Arc<dyn ReceiveDriver>,
    min_raw: usize,
    max_raw: usize,
) {
    while !broker.is_stopping() {
        match driver.read_frame().await {
            Ok(Some(pulses)) => {
                let pulse_len = pulses.last().copied().unwrap_or(0) / PULSE_DIV;
                if pulses.len() >= min_raw && pulses.len() <= max_raw {
                    let frame = PulseFrame::new(pulses, driver.hwtype(), pulse_len);
                    if broker.recv_queue.try_enqueue(frame).await == crate::QueueOutcome::Dropped {
                        warn!("RecvQ full, dropped framed pulse train");
                    }
                }
            }
            Ok(None) => {}
            Err(HardwareError::Transient(msg)) => {
                debug!("frame driver transient failure, reinitializing: {msg}");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
            Err(HardwareError::Fatal(msg)) => {
                warn!("frame driver fatal failure, stopping receiver: {msg}");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{BrokerMode, BrokerSettings};
    use crate::protocol_registry::ProtocolRegistry;
    use async_trait::async_trait;
    use rf_hardware::DriverKind;
    use std::sync::Mutex as StdMutex;
    use std::collections::VecDeque;

    struct ScriptedEdgeDriver {
        script: StdMutex<VecDeque<Result<u32, HardwareError>>>,
    }

    #[async_trait]
    impl ReceiveDriver for ScriptedEdgeDriver {
        fn kind(&self) -> DriverKind {
            DriverKind::Edge
        }
        fn hwtype(&self) -> i32 {
            0
        }
        async fn read_edge(&self) -> Result<u32, HardwareError> {
            let mut guard = self.script.lock().unwrap();
            guard.pop_front().unwrap_or(Err(HardwareError::Fatal("script exhausted".into())))
        }
        async fn read_frame(&self) -> Result<Option<Vec<u32>>, HardwareError> {
            unreachable!()
        }
        async fn set_wait(&self, _wait: bool) {}
    }

    fn test_broker() -> Arc<Broker> {
        Arc::new(Broker::new(
            BrokerSettings {
                port: 0,
                receive_repeats: 1,
                mode: BrokerMode::Standalone,
                node_uuid: "node".into(),
                watchdog_enabled: false,
                stats_enabled: false,
            },
            ProtocolRegistry::new(Vec::new()),
        ))
    }

    #[tokio::test]
    async fn edge_driver_closes_frame_on_gap_and_enqueues_within_bounds() {
        let broker = test_broker();
        let driver: Arc<dyn ReceiveDriver> = Arc::new(ScriptedEdgeDriver {
            script: StdMutex::new(VecDeque::from([
                Ok(300),
                Ok(600),
                Ok(300),
                Ok(600),
                Ok(6000), // > min_gap(500), < max_gap(30000): closes the frame
            ])),
        });

        run_edge_receiver(broker.clone(), driver, 3, 10, 500, 30_000).await;

        let frame = broker.recv_queue.dequeue().await.expect("frame enqueued");
        assert_eq!(frame.pulses, vec![300, 600, 300, 600, 6000]);
        assert_eq!(frame.pulse_len, 600);
    }

    #[tokio::test]
    async fn edge_driver_enqueues_even_when_closing_gap_exceeds_max_gap() {
        let broker = test_broker();
        let driver: Arc<dyn ReceiveDriver> = Arc::new(ScriptedEdgeDriver {
            script: StdMutex::new(VecDeque::from([
                Ok(300),
                Ok(600),
                Ok(300),
                Ok(600),
                Ok(40_000), // > min_gap(500) but also >= max_gap(30000): still closes and enqueues
            ])),
        });

        run_edge_receiver(broker.clone(), driver, 3, 10, 500, 30_000).await;

        let frame = broker.recv_queue.dequeue().await.expect("frame enqueued despite oversized gap");
        assert_eq!(frame.pulses, vec![300, 600, 300, 600, 40_000]);
    }

    #[tokio::test]
    async fn edge_driver_drops_too_short_frame() {
        let broker = test_broker();
        let driver: Arc<dyn ReceiveDriver> = Arc::new(ScriptedEdgeDriver {
            script: StdMutex::new(VecDeque::from([Ok(300), Ok(6000)])),
        });

        run_edge_receiver(broker.clone(), driver, 5, 10, 500, 30_000).await;

        assert!(broker.recv_queue.is_empty().await);
    }
}
