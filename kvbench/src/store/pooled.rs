use super::{KvStore, StoreError};
use async_channel::{bounded, Receiver, Sender};
use redis::aio::ConnectionManager;
use std::num::NonZeroUsize;
use std::ops::{Deref, DerefMut};
#[allow(unused)]
use tracing::{debug, trace, warn};

/// Fixed set of connections to one node, lent out one write at a time.
///
/// Idle connections sit in a bounded channel; borrowing waits for one to come back when
/// all are in use, which caps concurrent requests at the pool size.
pub struct PooledStore {
    idle_tx: Sender<ConnectionManager>,
    idle_rx: Receiver<ConnectionManager>,
    size: NonZeroUsize,
}

impl PooledStore {
    /// Opens every connection up front, so an unreachable node fails here rather than
    /// mid-run.
    pub async fn connect(url: &str, size: NonZeroUsize) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;

        // Fail fast on an unreachable node; the managers below retry with backoff.
        let mut probe = client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<_, ()>(&mut probe).await?;

        let (idle_tx, idle_rx) = bounded(size.get());

        for _ in 0..size.get() {
            let conn = ConnectionManager::new(client.clone()).await?;
            idle_tx
                .try_send(conn)
                .map_err(|_| StoreError::PoolClosed)?;
        }
        trace!("Opened {size} connections to {url}");

        Ok(Self {
            idle_tx,
            idle_rx,
            size,
        })
    }

    pub fn size(&self) -> NonZeroUsize {
        self.size
    }

    pub fn idle(&self) -> usize {
        self.idle_rx.len()
    }

    async fn borrow(&self) -> Result<PooledConnection<'_>, StoreError> {
        let conn = self
            .idle_rx
            .recv()
            .await
            .map_err(|_| StoreError::PoolClosed)?;
        Ok(PooledConnection {
            conn,
            home: &self.idle_tx,
        })
    }
}

impl KvStore for PooledStore {
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut conn = self.borrow().await?;
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .query_async::<_, ()>(&mut *conn)
            .await?;
        Ok(())
    }

    fn close(&self) {
        self.idle_rx.close();
        while self.idle_rx.try_recv().is_ok() {}
        debug!("Connection pool closed.");
    }
}

/// Borrowed connection; a handle goes back to the idle set on drop, including when the
/// write future is cancelled.
struct PooledConnection<'a> {
    conn: ConnectionManager,
    home: &'a Sender<ConnectionManager>,
}

impl Deref for PooledConnection<'_> {
    type Target = ConnectionManager;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl DerefMut for PooledConnection<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        // Handles share one socket, so returning a clone returns the connection. Fails
        // only once the pool is closed.
        let _ = self.home.try_send(self.conn.clone());
    }
}
