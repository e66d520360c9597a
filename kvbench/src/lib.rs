#![doc = include_str!("../README.md")]

pub mod benchmark;
pub mod collector;
mod error;
pub mod latch;
pub mod pool;
pub mod store;
pub mod task;
pub mod topology;

pub use benchmark::Benchmark;
pub use error::BenchError;
pub use store::{KvStore, StoreError, Target};

pub mod prelude {
    pub use crate::benchmark::Benchmark;
    pub use crate::store::{KvStore, Target};
    pub use kvbench_core::{RunConfig, RunMode, RunStatistics};
}
