use crate::PERCENTILES_PERMILLE;
use std::time::Duration;

/// Latency cut-points for one run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Percentiles {
    pub p50: Duration,
    pub p90: Duration,
    pub p95: Duration,
    pub p99: Duration,
    pub p999: Duration,
    pub p100: Duration,
}

impl Percentiles {
    /// Computes cut-points from samples that are already sorted ascending.
    ///
    /// The value for percentile `p` is taken at index `floor(len * p / 100) - 1`, clamped to
    /// zero, so that at small sample counts several buckets land on the same sample.
    pub fn from_sorted(sorted: &[Duration]) -> Self {
        if sorted.is_empty() {
            return Self::default();
        }

        let [p50, p90, p95, p99, p999, p100] =
            PERCENTILES_PERMILLE.map(|permille| sorted[percentile_index(sorted.len(), permille)]);

        Self {
            p50,
            p90,
            p95,
            p99,
            p999,
            p100,
        }
    }

    pub fn as_array(&self) -> [Duration; 6] {
        [self.p50, self.p90, self.p95, self.p99, self.p999, self.p100]
    }
}

fn percentile_index(len: usize, permille: u64) -> usize {
    let rank = (len as u128 * permille as u128 / 1000) as usize;
    rank.saturating_sub(1)
}

/// Statistics for a finished run.
///
/// Computed once, after every task has signalled completion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunStatistics {
    pub operations: u64,
    pub concurrency: usize,
    pub payload_size: usize,
    pub samples: usize,
    pub errors: u64,
    pub elapsed: Duration,
    pub sum: Duration,
    pub mean: Duration,
    pub latency: Percentiles,
    /// Whole operations per second, using millisecond granularity for the elapsed time.
    ///
    /// Runs shorter than one millisecond report 0.
    pub throughput: u64,
}

impl RunStatistics {
    pub fn compute(
        mut samples: Vec<Duration>,
        errors: u64,
        elapsed: Duration,
        operations: u64,
        concurrency: usize,
        payload_size: usize,
    ) -> Self {
        samples.sort_unstable();

        let sum: Duration = samples.iter().sum();
        let mean = if samples.is_empty() {
            Duration::ZERO
        } else {
            let nanos = sum.as_nanos() / samples.len() as u128;
            Duration::from_nanos(nanos as u64)
        };

        let elapsed_ms = elapsed.as_millis();
        let throughput = if elapsed_ms == 0 {
            0
        } else {
            (operations as u128 * 1000 / elapsed_ms) as u64
        };

        Self {
            operations,
            concurrency,
            payload_size,
            samples: samples.len(),
            errors,
            elapsed,
            sum,
            mean,
            latency: Percentiles::from_sorted(&samples),
            throughput,
        }
    }

    pub fn error_rate(&self) -> f64 {
        if self.samples == 0 {
            0.
        } else {
            self.errors as f64 / self.samples as f64
        }
    }
}
