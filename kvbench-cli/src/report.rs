use kvbench_core::RunStatistics;
use std::fmt;
use std::time::SystemTime;

/// Console rendering of one run. Latencies are whole milliseconds.
pub struct Report<'a> {
    pub iteration: u64,
    pub finished_at: SystemTime,
    pub stats: &'a RunStatistics,
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats;
        let l = &stats.latency;

        writeln!(
            f,
            "run #{} finished at {}",
            self.iteration,
            humantime::format_rfc3339_seconds(self.finished_at)
        )?;
        writeln!(f, "Data size (bytes)    : {}", stats.payload_size)?;
        writeln!(f, "Concurrency          : {}", stats.concurrency)?;
        writeln!(f, "Operations           : {}", stats.operations)?;
        writeln!(
            f,
            "Errors               : {} ({:.2}%)",
            stats.errors,
            stats.error_rate() * 100.
        )?;
        writeln!(f, "Elapsed (ms)         : {}", stats.elapsed.as_millis())?;
        writeln!(f, "Average (ms)         : {}", stats.mean.as_millis())?;
        for (label, value) in [
            ("50", l.p50),
            ("90", l.p90),
            ("95", l.p95),
            ("99", l.p99),
            ("99.9", l.p999),
            ("100", l.p100),
        ] {
            writeln!(f, "{label:>5} % <= (ms)     : {}", value.as_millis())?;
        }
        write!(f, "{} operations per second", stats.throughput)
    }
}
