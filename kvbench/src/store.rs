//! Store clients the benchmark writes through.
mod cluster;
mod pooled;

pub use cluster::ClusterStore;
pub use pooled::PooledStore;

use kvbench_core::{RunConfig, RunMode};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
#[allow(unused)]
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection pool is closed")]
    PoolClosed,
}

/// A key-value store that can take blocking-style writes from many tasks at once.
pub trait KvStore: Send + Sync + 'static {
    fn set(&self, key: &str, value: &[u8]) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Releases connections. Writes issued afterwards may fail.
    fn close(&self) {}
}

/// The store selected by a run's [`RunMode`].
pub enum Target {
    Pooled(PooledStore),
    Cluster(ClusterStore),
}

impl Target {
    /// Connects according to the run mode. Single-node and proxied runs write through a
    /// connection pool aimed at the data port; cluster runs use a topology-aware client
    /// seeded from the configured host.
    pub async fn connect(config: &RunConfig) -> Result<Self, StoreError> {
        match config.mode {
            RunMode::Single | RunMode::ClusterViaProxy { .. } => {
                let url = config.data_url();
                debug!("Opening {} pooled connections to {url}", config.connections);
                Ok(Target::Pooled(
                    PooledStore::connect(&url, config.connections).await?,
                ))
            }
            RunMode::Cluster => {
                if config.connections.get() > 1 {
                    warn!(
                        "Ignoring connections={}: the cluster client keeps one connection per node.",
                        config.connections
                    );
                }
                let url = config.seed_url();
                debug!("Opening cluster client seeded from {url}");
                Ok(Target::Cluster(ClusterStore::connect(&url).await?))
            }
        }
    }
}

impl KvStore for Target {
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        match self {
            Target::Pooled(store) => store.set(key, value).await,
            Target::Cluster(store) => store.set(key, value).await,
        }
    }

    fn close(&self) {
        match self {
            Target::Pooled(store) => store.close(),
            Target::Cluster(store) => store.close(),
        }
    }
}
