use std::num::NonZeroUsize;
use std::time::Duration;

pub const DEFAULT_OPERATIONS: usize = 100_000;

pub const DEFAULT_CONCURRENCY: NonZeroUsize = unsafe { NonZeroUsize::new_unchecked(1) };

pub const DEFAULT_CONNECTIONS: NonZeroUsize = unsafe { NonZeroUsize::new_unchecked(1) };

pub const DEFAULT_HOST: &str = "localhost";

pub const DEFAULT_PORT: u16 = 6379;

/// Size of the value written by every `SET`, in bytes.
pub const DEFAULT_PAYLOAD_SIZE: usize = 100;

/// Length of the random key generated per operation.
pub const KEY_LENGTH: usize = 15;

/// Upper bound on a single store operation before it counts as failed.
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(5);

/// Reported percentiles, in per-mille so that 99.9 stays an integer.
pub const PERCENTILES_PERMILLE: [u64; 6] = [500, 900, 950, 990, 999, 1000];
