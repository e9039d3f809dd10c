use std::sync::Arc;
use std::time::Duration;

use broker_protocol::{BroadcastEnvelope, CORE_TYPE_PROCESS};
use rf_hardware::{ResourceSample, ResourceSampler};
use tracing::{error, warn};

use crate::context::Broker;

const WARN_THRESHOLD_PCT: f64 = 60.0;
const ABORT_THRESHOLD_PCT: f64 = 90.0;
const RECHECK: Duration = Duration::from_secs(10);
const TICK: Duration = Duration::from_secs(1);

/// Outcome of one watchdog evaluation (§4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogOutcome {
    Healthy,
    FirstStrike,
    ControlledShutdown,
    ImmediateAbort,
}

/// Tracks the two-strike watchdog policy across ticks: a first strike
/// arms a 10s re-check; a second strike over 60% triggers a controlled
/// shutdown, and any sample over 90% on the second strike aborts
/// immediately (§4.9, §7).
#[derive(Default)]
struct WatchdogTracker {
    armed: bool,
}

impl WatchdogTracker {
    fn evaluate(&mut self, sample: ResourceSample) -> WatchdogOutcome {
        let breach = sample.cpu_pct > WARN_THRESHOLD_PCT || sample.ram_pct > WARN_THRESHOLD_PCT;
        if !self.armed {
            if breach {
                self.armed = true;
                return WatchdogOutcome::FirstStrike;
            }
            return WatchdogOutcome::Healthy;
        }

        // Second strike.
        self.armed = false;
        if !breach {
            return WatchdogOutcome::Healthy;
        }
        if sample.cpu_pct > ABORT_THRESHOLD_PCT || sample.ram_pct > ABORT_THRESHOLD_PCT {
            WatchdogOutcome::ImmediateAbort
        } else {
            WatchdogOutcome::ControlledShutdown
        }
    }
}

/// Statistics & watchdog worker (C9): samples at 1Hz, runs the two-strike
/// policy when enabled, and publishes a `process` broadcast every third
/// healthy tick.
pub async fn run_stats_watchdog(broker: Arc<Broker>, sampler: Arc<dyn ResourceSampler>) {
    let mut tracker = WatchdogTracker::default();
    let mut healthy_ticks: u32 = 0;

    while !broker.is_stopping() {
        let tick_delay = if tracker.armed { RECHECK } else { TICK };
        tokio::time::sleep(tick_delay).await;
        if broker.is_stopping() {
            break;
        }

        let sample = sampler.sample().await;

        if broker.settings.watchdog_enabled {
            match tracker.evaluate(sample) {
                WatchdogOutcome::Healthy => {
                    healthy_ticks += 1;
                }
                WatchdogOutcome::FirstStrike => {
                    warn!(
                        "watchdog first strike: cpu={:.1}% ram={:.1}%",
                        sample.cpu_pct, sample.ram_pct
                    );
                    continue;
                }
                WatchdogOutcome::ControlledShutdown => {
                    warn!("watchdog threshold breached twice, initiating controlled shutdown");
                    broker.initiate_shutdown();
                    break;
                }
                WatchdogOutcome::ImmediateAbort => {
                    error!("watchdog observed >90% usage on second strike, aborting");
                    broker.initiate_shutdown();
                    break;
                }
            }
        } else {
            healthy_ticks += 1;
        }

        if broker.settings.stats_enabled && healthy_ticks % 3 == 0 {
            let envelope = BroadcastEnvelope::core(
                CORE_TYPE_PROCESS,
                serde_json::json!({"cpu": sample.cpu_pct, "ram": sample.ram_pct}),
            );
            broker.broadcast_queue.try_enqueue(envelope).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_breach_is_only_a_first_strike() {
        let mut tracker = WatchdogTracker::default();
        let outcome = tracker.evaluate(ResourceSample { cpu_pct: 70.0, ram_pct: 10.0 });
        assert_eq!(outcome, WatchdogOutcome::FirstStrike);
    }

    #[test]
    fn two_consecutive_breaches_trigger_controlled_shutdown() {
        let mut tracker = WatchdogTracker::default();
        tracker.evaluate(ResourceSample { cpu_pct: 70.0, ram_pct: 10.0 });
        let outcome = tracker.evaluate(ResourceSample { cpu_pct: 65.0, ram_pct: 10.0 });
        assert_eq!(outcome, WatchdogOutcome::ControlledShutdown);
    }

    #[test]
    fn second_strike_over_90_percent_aborts_immediately() {
        let mut tracker = WatchdogTracker::default();
        tracker.evaluate(ResourceSample { cpu_pct: 70.0, ram_pct: 10.0 });
        let outcome = tracker.evaluate(ResourceSample { cpu_pct: 95.0, ram_pct: 10.0 });
        assert_eq!(outcome, WatchdogOutcome::ImmediateAbort);
    }

    #[test]
    fn recovering_before_second_strike_clears_the_arm() {
        let mut tracker = WatchdogTracker::default();
        tracker.evaluate(ResourceSample { cpu_pct: 70.0, ram_pct: 10.0 });
        let outcome = tracker.evaluate(ResourceSample { cpu_pct: 10.0, ram_pct: 10.0 });
        assert_eq!(outcome, WatchdogOutcome::Healthy);
    }
}
