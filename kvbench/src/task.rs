use crate::collector::LatencyCollector;
use crate::latch::CompletionGuard;
use crate::store::{KvStore, StoreError};
use kvbench_core::KEY_LENGTH;
use rand::distributions::{Alphanumeric, DistString};
use std::sync::Arc;
use std::time::{Duration, Instant};
#[allow(unused)]
use tracing::{debug, trace};

/// Value written by every operation of a run. Generated once and shared read-only.
#[derive(Clone, Debug)]
pub struct Payload(Arc<[u8]>);

impl Payload {
    pub fn random(size: usize) -> Self {
        let data = Alphanumeric.sample_string(&mut rand::thread_rng(), size);
        Self(Arc::from(data.into_bytes()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

pub fn random_key() -> String {
    Alphanumeric.sample_string(&mut rand::thread_rng(), KEY_LENGTH)
}

/// One timed `SET`.
///
/// Holds its completion guard from construction, so the run's latch is counted down once
/// whether the task succeeds, fails, panics, or is dropped unrun.
pub struct WriteTask<S> {
    store: Arc<S>,
    payload: Payload,
    collector: Arc<LatencyCollector>,
    op_timeout: Duration,
    _done: CompletionGuard,
}

impl<S: KvStore> WriteTask<S> {
    pub fn new(
        store: Arc<S>,
        payload: Payload,
        collector: Arc<LatencyCollector>,
        op_timeout: Duration,
        done: CompletionGuard,
    ) -> Self {
        Self {
            store,
            payload,
            collector,
            op_timeout,
            _done: done,
        }
    }

    /// Writes once and records the latency. Failed writes are sampled too, since their
    /// duration is still what the client observed.
    pub async fn run(self) {
        let key = random_key();

        let start = Instant::now();
        let res = tokio::time::timeout(
            self.op_timeout,
            self.store.set(&key, self.payload.as_bytes()),
        )
        .await
        .unwrap_or(Err(StoreError::Timeout(self.op_timeout)));
        let elapsed = start.elapsed();

        self.collector.record(elapsed);

        record_metrics(elapsed, res.is_ok());

        if let Err(err) = res {
            self.collector.record_error();
            debug!("SET {key} failed after {elapsed:?}: {err}");
        }
    }
}

#[cfg(feature = "metrics")]
fn record_metrics(elapsed: Duration, success: bool) {
    metrics::histogram!("kvbench.set.latency").record(elapsed.as_nanos() as f64);
    if success {
        metrics::counter!("kvbench.set.success").increment(1);
    } else {
        metrics::counter!("kvbench.set.error").increment(1);
    }
}

#[cfg(not(feature = "metrics"))]
fn record_metrics(_elapsed: Duration, _success: bool) {}
