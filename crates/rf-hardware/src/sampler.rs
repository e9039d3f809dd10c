use async_trait::async_trait;

/// One CPU/RAM reading (§4.9). Percentages in `[0.0, 100.0]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceSample {
    pub cpu_pct: f64,
    pub ram_pct: f64,
}

/// Out-of-core collaborator providing process resource usage to the
/// statistics & watchdog component (§4.9). Real sampling (`/proc/self/stat`)
/// is not part of this workspace; tests supply a scripted fake.
#[async_trait]
pub trait ResourceSampler: Send + Sync {
    async fn sample(&self) -> ResourceSample;
}
