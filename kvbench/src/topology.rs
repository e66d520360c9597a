//! Cluster member discovery and the pre-run flush.
use crate::store::StoreError;
use kvbench_core::RunConfig;
use redis::ErrorKind;
use std::fmt;
#[allow(unused)]
use tracing::{debug, info, warn};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeAddr {
    pub host: String,
    pub port: u16,
}

impl NodeAddr {
    pub fn url(&self) -> String {
        if self.host.contains(':') {
            format!("redis://[{}]:{}/", self.host, self.port)
        } else {
            format!("redis://{}:{}/", self.host, self.port)
        }
    }
}

impl fmt::Display for NodeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Parses `CLUSTER NODES` output into member addresses.
///
/// Address fields look like `ip:port@cport[,hostname]`, or plain `ip:port` on older
/// servers. A node that does not know its own ip yet reports `:port`; `seed_host` stands
/// in for it. Members flagged `noaddr` are skipped.
pub fn parse_cluster_nodes(text: &str, seed_host: &str) -> Vec<NodeAddr> {
    let mut nodes: Vec<NodeAddr> = vec![];

    for line in text.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let [_id, addr, flags, ..] = fields[..] else {
            continue;
        };
        if flags.split(',').any(|flag| flag == "noaddr") {
            continue;
        }

        let addr = addr.split(',').next().unwrap_or(addr);
        let addr = addr.split('@').next().unwrap_or(addr);
        let Some((host, port)) = addr.rsplit_once(':') else {
            warn!("Unparseable cluster node address: {addr}");
            continue;
        };
        let Ok(port) = port.parse() else {
            warn!("Unparseable cluster node port: {addr}");
            continue;
        };

        let host = host.trim_start_matches('[').trim_end_matches(']');
        let host = if host.is_empty() { seed_host } else { host };
        let node = NodeAddr {
            host: host.to_string(),
            port,
        };

        if !nodes.contains(&node) {
            nodes.push(node);
        }
    }

    nodes
}

/// Asks the seed node for every member of its cluster.
pub async fn discover_nodes(config: &RunConfig) -> Result<Vec<NodeAddr>, StoreError> {
    let client = redis::Client::open(config.seed_url())?;
    let mut conn = client.get_multiplexed_async_connection().await?;
    let text: String = redis::cmd("CLUSTER")
        .arg("NODES")
        .query_async(&mut conn)
        .await?;

    let nodes = parse_cluster_nodes(&text, &config.host);
    debug!("Discovered {} cluster nodes.", nodes.len());
    Ok(nodes)
}

/// Outcome of flushing every cluster member.
#[derive(Debug, Default)]
pub struct FlushReport {
    pub flushed: Vec<NodeAddr>,
    /// Replicas that refused with `READONLY`; their primaries are flushed instead.
    pub replicas: Vec<NodeAddr>,
    pub failed: Vec<(NodeAddr, StoreError)>,
}

impl FlushReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Issues `FLUSHALL` on every node.
///
/// A `READONLY` refusal is what a replica answers and is ignored. Any other failure is
/// logged and kept in the report; none of them stop the benchmark.
pub async fn flush_all_nodes(nodes: &[NodeAddr]) -> FlushReport {
    let mut report = FlushReport::default();

    for node in nodes {
        match flush_node(node).await {
            Ok(()) => {
                debug!("Flushed {node}");
                report.flushed.push(node.clone());
            }
            Err(StoreError::Redis(err)) if err.kind() == ErrorKind::ReadOnly => {
                debug!("Skipping read-only replica {node}");
                report.replicas.push(node.clone());
            }
            Err(err) => {
                warn!("Failed to flush {node}: {err}");
                report.failed.push((node.clone(), err));
            }
        }
    }

    report
}

async fn flush_node(node: &NodeAddr) -> Result<(), StoreError> {
    let client = redis::Client::open(node.url())?;
    let mut conn = client.get_multiplexed_async_connection().await?;
    redis::cmd("FLUSHALL")
        .query_async::<_, ()>(&mut conn)
        .await?;
    Ok(())
}

/// Discovers the cluster behind the configured seed and flushes it.
pub async fn flush_cluster(config: &RunConfig) -> Result<FlushReport, StoreError> {
    let nodes = discover_nodes(config).await?;
    let report = flush_all_nodes(&nodes).await;
    info!(
        "Flushed {} nodes ({} replicas skipped, {} failed).",
        report.flushed.len(),
        report.replicas.len(),
        report.failed.len()
    );
    Ok(report)
}
