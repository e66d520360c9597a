//! Run orchestration.
use crate::collector::LatencyCollector;
use crate::error::BenchError;
use crate::latch::CountdownLatch;
use crate::pool::GatedPool;
use crate::store::{KvStore, Target};
use crate::task::{Payload, WriteTask};
use crate::topology::{self, FlushReport};
use kvbench_core::{RunConfig, RunStatistics};
use std::sync::Arc;
use std::time::Instant;
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn};

/// Drives one configuration against one store.
///
/// Every call to [`Benchmark::run`] builds its own pool, collector and latch, so repeated
/// runs never share samples.
pub struct Benchmark<S> {
    config: RunConfig,
    store: Arc<S>,
    flush: Option<FlushReport>,
}

impl Benchmark<Target> {
    /// Validates the configuration and connects to the store it names.
    ///
    /// Clustered runs flush every member first. Flush problems are logged and kept in
    /// [`Benchmark::flush_report`] but never fail the connect.
    pub async fn connect(config: RunConfig) -> Result<Self, BenchError> {
        config.validate()?;
        let store = Target::connect(&config).await?;

        let flush = if config.mode.is_clustered() {
            match topology::flush_cluster(&config).await {
                Ok(report) => Some(report),
                Err(err) => {
                    warn!("Could not discover cluster nodes to flush: {err}");
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            config,
            store: Arc::new(store),
            flush,
        })
    }
}

impl<S: KvStore> Benchmark<S> {
    pub fn new(config: RunConfig, store: S) -> Result<Self, BenchError> {
        config.validate()?;
        Ok(Self {
            config,
            store: Arc::new(store),
            flush: None,
        })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn flush_report(&self) -> Option<&FlushReport> {
        self.flush.as_ref()
    }

    /// Executes every operation and returns the run's statistics.
    ///
    /// All writes are queued on a paused pool before the clock starts; the clock covers
    /// exactly the span from resuming the pool to the last write signalling completion.
    #[instrument(
        name = "benchmark",
        skip_all,
        fields(ops = self.config.operations, concurrency = self.config.concurrency.get())
    )]
    pub async fn run(&self) -> Result<RunStatistics, BenchError> {
        let config = &self.config;
        let operations = config.operations;

        let payload = Payload::random(config.payload_size);
        let collector = Arc::new(LatencyCollector::new());
        let latch = CountdownLatch::new(operations);
        let mut pool = GatedPool::new(config.concurrency);
        pool.pause()?;

        for _ in 0..operations {
            let task = WriteTask::new(
                self.store.clone(),
                payload.clone(),
                collector.clone(),
                config.op_timeout,
                latch.guard(),
            );
            pool.submit(task.run())?;
        }
        debug!("Queued {operations} writes.");

        let start = Instant::now();
        pool.resume();
        pool.shutdown_after_drain();
        latch.wait().await;
        let elapsed = start.elapsed();

        let drained = collector.drain();
        pool.join().await;

        if drained.latency.len() != operations {
            error!(
                "Collected {} samples for {operations} operations.",
                drained.latency.len()
            );
        }

        let stats = RunStatistics::compute(
            drained.latency,
            drained.errors,
            elapsed,
            operations as u64,
            config.concurrency.get(),
            payload.len(),
        );
        info!(
            "Finished in {elapsed:?}: {} ops/s, {} errors.",
            stats.throughput, stats.errors
        );

        Ok(stats)
    }

    pub fn close(&self) {
        self.store.close();
    }
}
