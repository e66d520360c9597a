use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
#[allow(unused)]
use tracing::{debug, error, trace};

/// Down-counting barrier that wakes its waiters once the count reaches zero.
///
/// Each participant holds a [`CompletionGuard`]; dropping the guard counts down once.
#[derive(Debug)]
pub struct CountdownLatch {
    remaining: AtomicUsize,
    notify: Notify,
}

impl CountdownLatch {
    pub fn new(count: usize) -> Arc<Self> {
        Arc::new(Self {
            remaining: AtomicUsize::new(count),
            notify: Notify::new(),
        })
    }

    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    /// Hands out a guard that counts the latch down exactly once, when dropped.
    pub fn guard(self: &Arc<Self>) -> CompletionGuard {
        CompletionGuard {
            latch: self.clone(),
        }
    }

    fn count_down(&self) {
        let prev = self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));

        match prev {
            Ok(1) => {
                trace!("Latch reached zero.");
                self.notify.notify_waiters();
            }
            Ok(_) => {}
            Err(_) => error!("Latch counted down more times than it was sized for."),
        }
    }

    /// Waits until the count reaches zero. Returns immediately for a latch created at zero.
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a concurrent final count-down cannot be missed.
            notified.as_mut().enable();

            if self.remaining() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Counts its latch down on drop, so every exit path (including panics) signals once.
#[derive(Debug)]
pub struct CompletionGuard {
    latch: Arc<CountdownLatch>,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        self.latch.count_down();
    }
}
