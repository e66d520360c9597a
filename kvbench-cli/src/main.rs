mod cli;
mod report;

use anyhow::Context;
use clap::Parser;
use cli::Cli;
use kvbench::prelude::*;
use metrics_exporter_prometheus::PrometheusBuilder;
use report::Report;
use std::time::SystemTime;
#[allow(unused)]
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const DEFAULT_LOG_FILTER: &str = "kvbench=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    FmtSubscriber::builder().with_env_filter(filter).init();

    let cli = Cli::parse();

    if let Some(addr) = cli.metrics_addr {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .with_context(|| format!("failed to serve metrics on {addr}"))?;
        info!("Serving metrics on {addr}");
    }

    let config = cli.run_config();
    config.validate()?;
    info!("Benchmark configuration: {config}");

    let mut iteration = 1;
    loop {
        run_once(config.clone(), iteration).await?;
        if !cli.repeat {
            return Ok(());
        }
        iteration += 1;
    }
}

async fn run_once(config: RunConfig, iteration: u64) -> anyhow::Result<()> {
    let target = format!("{}:{}", config.host, config.data_port());
    let bench = Benchmark::connect(config)
        .await
        .with_context(|| format!("failed to prepare benchmark against {target}"))?;

    if let Some(flush) = bench.flush_report() {
        if !flush.is_clean() {
            warn!(
                "{} cluster nodes could not be flushed; continuing.",
                flush.failed.len()
            );
        }
    }

    let stats = bench.run().await?;
    bench.close();

    println!(
        "{}\n",
        Report {
            iteration,
            finished_at: SystemTime::now(),
            stats: &stats,
        }
    );
    Ok(())
}
