use async_channel::{unbounded, Receiver, Sender};
use futures_util::FutureExt;
use std::any::Any;
use std::future::Future;
use std::num::NonZeroUsize;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

pub type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("pool has been shut down and accepts no more jobs")]
    ShutDown,

    #[error("pool has already been resumed and cannot be paused again")]
    AlreadyResumed,
}

/// Fixed-concurrency executor whose workers hold off until the pool is resumed.
///
/// The pool starts paused: [`GatedPool::submit`] queues jobs, but every worker waits on a
/// closed gate before it dequeues anything. [`GatedPool::resume`] opens the gate for good,
/// so the moment of resuming is the earliest instant any job can run.
///
/// Workers are tokio tasks, so the pool must be created inside a runtime.
pub struct GatedPool {
    concurrency: NonZeroUsize,
    jobs: Option<Sender<Job>>,
    gate: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
}

impl GatedPool {
    pub fn new(concurrency: NonZeroUsize) -> Self {
        let (tx, rx) = unbounded();
        let (gate, _) = watch::channel(false);

        let workers = (0..concurrency.get())
            .map(|id| tokio::spawn(worker(id, gate.subscribe(), rx.clone())))
            .collect();

        Self {
            concurrency,
            jobs: Some(tx),
            gate,
            workers,
        }
    }

    pub fn concurrency(&self) -> NonZeroUsize {
        self.concurrency
    }

    pub fn is_paused(&self) -> bool {
        !*self.gate.borrow()
    }

    /// Number of jobs waiting for a worker.
    pub fn queued(&self) -> usize {
        self.jobs.as_ref().map_or(0, |tx| tx.len())
    }

    /// No-op while paused. The gate only ever opens, so pausing a resumed pool is an error.
    pub fn pause(&self) -> Result<(), PoolError> {
        if self.is_paused() {
            Ok(())
        } else {
            Err(PoolError::AlreadyResumed)
        }
    }

    /// Queues a job without waiting for it to run.
    pub fn submit<F>(&self, job: F) -> Result<(), PoolError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let tx = self.jobs.as_ref().ok_or(PoolError::ShutDown)?;
        tx.try_send(Box::pin(job)).map_err(|_| PoolError::ShutDown)
    }

    /// Opens the gate. Queued jobs start as workers pick them up.
    pub fn resume(&self) {
        let was_open = self.gate.send_replace(true);
        if !was_open {
            debug!(
                "Resuming pool with {} queued jobs across {} workers.",
                self.queued(),
                self.concurrency
            );
        }
    }

    /// Stops accepting jobs; workers exit once the queue is empty. In-flight jobs are left
    /// alone.
    pub fn shutdown_after_drain(&mut self) {
        if let Some(tx) = self.jobs.take() {
            tx.close();
        }
    }

    /// Waits for every worker to exit. Only returns once the pool has been shut down and
    /// drained, or was dropped before resuming.
    pub async fn join(mut self) {
        self.shutdown_after_drain();
        for handle in self.workers.drain(..) {
            if let Err(err) = handle.await {
                error!("Pool worker failed: {err}");
            }
        }
    }
}

async fn worker(id: usize, mut gate: watch::Receiver<bool>, jobs: Receiver<Job>) {
    let opened = gate.wait_for(|open| *open).await.is_ok();
    if !opened {
        trace!(worker = id, "Pool dropped before it was resumed.");
        return;
    }

    while let Ok(job) = jobs.recv().await {
        if let Err(panic) = AssertUnwindSafe(job).catch_unwind().await {
            error!(worker = id, "Job panicked: {}", panic_message(&*panic));
        }
    }
    trace!(worker = id, "Queue drained; worker exiting.");
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg
    } else {
        "<non-string panic payload>"
    }
}
