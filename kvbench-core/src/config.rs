use crate::{
    DEFAULT_CONCURRENCY, DEFAULT_CONNECTIONS, DEFAULT_HOST, DEFAULT_OPERATIONS,
    DEFAULT_OP_TIMEOUT, DEFAULT_PAYLOAD_SIZE, DEFAULT_PORT,
};
use std::fmt;
use std::num::NonZeroUsize;
use std::time::Duration;
use thiserror::Error;

/// How writes are routed to the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunMode {
    /// Direct connections to a single node.
    Single,
    /// Topology-aware routing across all cluster shards.
    Cluster,
    /// Cluster whose data traffic goes through a proxy listening on `proxy_port`.
    ///
    /// Writes use plain pooled connections to the proxy; discovery and flush still talk to
    /// the seed node.
    ClusterViaProxy { proxy_port: u16 },
}

impl RunMode {
    pub fn is_clustered(&self) -> bool {
        !matches!(self, RunMode::Single)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("host must not be empty")]
    EmptyHost,

    #[error("port must not be 0")]
    ZeroPort,

    #[error("operation timeout must be greater than zero")]
    ZeroTimeout,
}

/// Everything needed to execute one benchmark run.
///
/// Built once per run and handed to the orchestrator, which threads it into every write
/// task. Nothing about the run lives in global state.
#[derive(Clone, Debug)]
pub struct RunConfig {
    pub operations: usize,
    pub concurrency: NonZeroUsize,
    /// Size of the connection pool. Unused in [`RunMode::Cluster`], where the cluster
    /// client keeps one multiplexed connection per node.
    pub connections: NonZeroUsize,
    pub payload_size: usize,
    pub host: String,
    pub port: u16,
    pub mode: RunMode,
    pub op_timeout: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

impl RunConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            operations: DEFAULT_OPERATIONS,
            concurrency: DEFAULT_CONCURRENCY,
            connections: DEFAULT_CONNECTIONS,
            payload_size: DEFAULT_PAYLOAD_SIZE,
            host: host.to_string(),
            port,
            mode: RunMode::Single,
            op_timeout: DEFAULT_OP_TIMEOUT,
        }
    }

    pub fn operations(mut self, operations: usize) -> Self {
        self.operations = operations;
        self
    }

    pub fn concurrency(mut self, concurrency: NonZeroUsize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn connections(mut self, connections: NonZeroUsize) -> Self {
        self.connections = connections;
        self
    }

    pub fn payload_size(mut self, payload_size: usize) -> Self {
        self.payload_size = payload_size;
        self
    }

    pub fn mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn op_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if self.port == 0 {
            return Err(ConfigError::ZeroPort);
        }
        if let RunMode::ClusterViaProxy { proxy_port: 0 } = self.mode {
            return Err(ConfigError::ZeroPort);
        }
        if self.op_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    /// Whether writes go through a fixed pool of `connections` connections.
    pub fn uses_connection_pool(&self) -> bool {
        !matches!(self.mode, RunMode::Cluster)
    }

    /// Port that receives the benchmark's data traffic.
    pub fn data_port(&self) -> u16 {
        match self.mode {
            RunMode::ClusterViaProxy { proxy_port } => proxy_port,
            RunMode::Single | RunMode::Cluster => self.port,
        }
    }

    /// Connection URL for the node that receives writes.
    pub fn data_url(&self) -> String {
        format!("redis://{}:{}/", self.host, self.data_port())
    }

    /// Connection URL for the configured host/port, used as the cluster seed.
    pub fn seed_url(&self) -> String {
        format!("redis://{}:{}/", self.host, self.port)
    }
}

impl fmt::Display for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let connections = if self.uses_connection_pool() {
            self.connections.to_string()
        } else {
            "per-node".to_string()
        };
        let mode = match self.mode {
            RunMode::Single => "single".to_string(),
            RunMode::Cluster => "cluster".to_string(),
            RunMode::ClusterViaProxy { proxy_port } => format!("cluster via proxy :{proxy_port}"),
        };
        write!(
            f,
            "ops={}, concurrency={}, connections={}, payload={}B, target={}:{} ({mode}), timeout={}",
            self.operations,
            self.concurrency,
            connections,
            self.payload_size,
            self.host,
            self.data_port(),
            humantime::format_duration(self.op_timeout),
        )
    }
}
