use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use kvbench_core::{
    RunConfig, RunMode, DEFAULT_CONCURRENCY, DEFAULT_CONNECTIONS, DEFAULT_HOST,
    DEFAULT_OPERATIONS, DEFAULT_OP_TIMEOUT, DEFAULT_PAYLOAD_SIZE, DEFAULT_PORT,
};
use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::time::Duration;

/// Measure SET latency and throughput of a Redis-compatible store.
///
/// `-h` selects the host, so help is only available as `--help`.
#[derive(Parser, Debug)]
#[command(version, disable_help_flag = true)]
pub struct Cli {
    /// Number of SET operations per run
    #[arg(short = 'n', long = "ops", default_value_t = DEFAULT_OPERATIONS)]
    pub operations: usize,

    /// Number of concurrent workers
    #[arg(short = 't', long, default_value_t = DEFAULT_CONCURRENCY)]
    pub threads: NonZeroUsize,

    /// Number of store connections
    #[arg(short = 'c', long, default_value_t = DEFAULT_CONNECTIONS)]
    pub connections: NonZeroUsize,

    #[arg(short = 'h', long, default_value = DEFAULT_HOST)]
    pub host: String,

    #[arg(short = 'p', long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Value size in bytes
    #[arg(short = 's', long = "data-size", default_value_t = DEFAULT_PAYLOAD_SIZE)]
    pub data_size: usize,

    /// Target is a cluster: route by slot and flush every member before each run.
    /// Accepts an optional 1/0
    #[arg(
        short = 'g',
        long,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value = "false",
        default_missing_value = "true",
        value_parser = BoolishValueParser::new(),
    )]
    pub cluster: bool,

    /// Send writes through a proxy on this port instead of the node port; 0 disables
    #[arg(short = 'x', long = "proxy-port")]
    pub proxy_port: Option<u16>,

    /// Repeat the run until interrupted. Accepts an optional 1/0
    #[arg(
        short = 'l',
        long = "loop",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value = "false",
        default_missing_value = "true",
        value_parser = BoolishValueParser::new(),
    )]
    pub repeat: bool,

    /// Per-operation timeout in milliseconds
    #[arg(long = "timeout-ms", default_value_t = DEFAULT_OP_TIMEOUT.as_millis() as u64)]
    pub timeout_ms: u64,

    /// Serve Prometheus metrics on this address
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,

    /// Print help
    #[arg(long, action = ArgAction::Help)]
    #[allow(dead_code)]
    help: Option<bool>,
}

impl Cli {
    pub fn run_config(&self) -> RunConfig {
        let proxy_port = self.proxy_port.filter(|&port| port != 0);
        let (port, mode) = match (self.cluster, proxy_port) {
            (false, None) => (self.port, RunMode::Single),
            (false, Some(proxy_port)) => (proxy_port, RunMode::Single),
            (true, None) => (self.port, RunMode::Cluster),
            (true, Some(proxy_port)) => (self.port, RunMode::ClusterViaProxy { proxy_port }),
        };

        RunConfig::new(&self.host, port)
            .operations(self.operations)
            .concurrency(self.threads)
            .connections(self.connections)
            .payload_size(self.data_size)
            .mode(mode)
            .op_timeout(Duration::from_millis(self.timeout_ms))
    }
}
