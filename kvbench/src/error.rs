use crate::pool::PoolError;
use crate::store::StoreError;
use kvbench_core::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("unable to connect to the store: {0}")]
    Connect(#[from] StoreError),

    #[error("worker pool rejected a task: {0}")]
    Pool(#[from] PoolError),
}
