use metrics_util::AtomicBucket;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Lock-free sink for per-operation latencies.
///
/// Workers push concurrently; the orchestrator drains once every task has finished.
pub struct LatencyCollector {
    latency: AtomicBucket<Duration>,
    errors: AtomicU64,
}

impl Default for LatencyCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl LatencyCollector {
    pub fn new() -> Self {
        Self {
            latency: AtomicBucket::new(),
            errors: AtomicU64::new(0),
        }
    }

    pub fn record(&self, latency: Duration) {
        self.latency.push(latency);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Removes every recorded sample and resets the error count.
    pub fn drain(&self) -> Drained {
        let mut latency = vec![];
        self.latency.clear_with(|block| {
            latency.extend_from_slice(block);
        });
        let errors = self.errors.swap(0, Ordering::Relaxed);

        Drained { latency, errors }
    }
}

#[derive(Debug)]
pub struct Drained {
    pub latency: Vec<Duration>,
    pub errors: u64,
}
