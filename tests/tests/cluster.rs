mod utils;
use utils::*;

use kvbench::prelude::*;
use kvbench::topology::{self, NodeAddr};
use kvbench::StoreError;
use mock_service::{FlushReply, MockConfig};
use std::num::NonZeroUsize;
use std::time::Duration;

fn node_line(id: &str, port: u16, flags: &str) -> String {
    format!(
        "{id} 127.0.0.1:{port}@{} {flags} - 0 0 1 connected\n",
        port as u32 + 10_000
    )
}

fn addr(port: u16) -> NodeAddr {
    NodeAddr {
        host: "127.0.0.1".into(),
        port,
    }
}

#[tokio::test]
async fn flush_ignores_readonly_replicas_and_surfaces_other_errors() -> anyhow::Result<()> {
    init();
    let primary = mock_service::spawn(MockConfig::default()).await?;
    let replica = mock_service::spawn(MockConfig {
        flush: FlushReply::ReadOnly,
        ..Default::default()
    })
    .await?;
    let broken = mock_service::spawn(MockConfig {
        flush: FlushReply::Error,
        ..Default::default()
    })
    .await?;

    // The primary reports an empty host, as an unconfigured `myself` entry does.
    let nodes = [
        format!(
            "a :{}@{} myself,master - 0 0 1 connected 0-5460\n",
            primary.port(),
            primary.port() as u32 + 10_000
        ),
        node_line("b", replica.port(), "slave"),
        node_line("c", broken.port(), "master"),
    ]
    .concat();
    let seed = mock_service::spawn(MockConfig {
        cluster_nodes: Some(nodes),
        ..Default::default()
    })
    .await?;

    let config = RunConfig::new("127.0.0.1", seed.port()).mode(RunMode::Cluster);
    let discovered = topology::discover_nodes(&config).await?;
    assert_eq!(
        discovered,
        vec![addr(primary.port()), addr(replica.port()), addr(broken.port())]
    );

    let report = tokio::time::timeout(
        Duration::from_secs(30),
        topology::flush_all_nodes(&discovered),
    )
    .await?;

    assert_eq!(report.flushed, vec![addr(primary.port())]);
    assert_eq!(report.replicas, vec![addr(replica.port())]);
    assert_eq!(report.failed.len(), 1);
    assert!(!report.is_clean());

    let (node, err) = &report.failed[0];
    assert_eq!(*node, addr(broken.port()));
    assert!(matches!(err, StoreError::Redis(e) if e.kind() != redis::ErrorKind::ReadOnly));

    assert_eq!(primary.state.flushes(), 1);
    assert_eq!(broken.state.flushes(), 0);
    assert_eq!(seed.state.flushes(), 0);
    Ok(())
}

#[tokio::test]
async fn discovery_fails_on_non_cluster_node() -> anyhow::Result<()> {
    init();
    let plain = mock_service::spawn(MockConfig::default()).await?;
    let config = RunConfig::new("127.0.0.1", plain.port()).mode(RunMode::Cluster);
    assert!(topology::flush_cluster(&config).await.is_err());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cluster_run_with_readonly_replica_writes_every_operation() -> anyhow::Result<()> {
    init();
    let replica = mock_service::spawn(MockConfig {
        flush: FlushReply::ReadOnly,
        ..Default::default()
    })
    .await?;

    // The seed serves every slot itself, so its own address has to be in the node list.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let seed_addr = listener.local_addr()?;
    let nodes = [
        format!(
            "s 127.0.0.1:{}@{} myself,master - 0 0 1 connected 0-16383\n",
            seed_addr.port(),
            seed_addr.port() as u32 + 10_000
        ),
        node_line("r", replica.port(), "slave"),
    ]
    .concat();
    let seed = mock_service::spawn_on(
        listener,
        MockConfig {
            cluster_nodes: Some(nodes),
            ..Default::default()
        },
    )?;

    let config = RunConfig::new("127.0.0.1", seed_addr.port())
        .operations(200)
        .concurrency(NonZeroUsize::new(8).unwrap())
        .mode(RunMode::Cluster);
    let bench = Benchmark::connect(config).await?;

    let flush = bench.flush_report().expect("clustered runs flush first");
    assert_eq!(flush.flushed, vec![addr(seed_addr.port())]);
    assert_eq!(flush.replicas, vec![addr(replica.port())]);
    assert!(flush.is_clean());

    let stats = tokio::time::timeout(Duration::from_secs(30), bench.run()).await??;
    bench.close();

    assert_eq!(stats.samples, 200);
    assert_eq!(stats.errors, 0);
    assert_eq!(seed.state.sets(), 200);
    assert_eq!(seed.state.flushes(), 1);
    assert_eq!(replica.state.sets(), 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn proxied_cluster_writes_to_proxy_and_flushes_members() -> anyhow::Result<()> {
    init();
    let proxy = mock_service::spawn(MockConfig::default()).await?;
    let member = mock_service::spawn(MockConfig::default()).await?;
    let seed = mock_service::spawn(MockConfig {
        cluster_nodes: Some(node_line("m", member.port(), "master")),
        ..Default::default()
    })
    .await?;

    let config = RunConfig::new("127.0.0.1", seed.port())
        .operations(100)
        .concurrency(NonZeroUsize::new(4).unwrap())
        .mode(RunMode::ClusterViaProxy {
            proxy_port: proxy.port(),
        });
    let bench = Benchmark::connect(config).await?;

    let flush = bench.flush_report().expect("clustered runs flush first");
    assert_eq!(flush.flushed, vec![addr(member.port())]);
    assert!(flush.is_clean());

    let stats = bench.run().await?;
    assert_eq!(stats.samples, 100);
    assert_eq!(proxy.state.sets(), 100);
    assert_eq!(seed.state.sets(), 0);
    assert_eq!(member.state.sets(), 0);
    assert_eq!(member.state.flushes(), 1);
    Ok(())
}

#[tokio::test]
async fn unreachable_seed_does_not_abort_proxied_run() -> anyhow::Result<()> {
    init();
    let proxy = mock_service::spawn(MockConfig::default()).await?;
    let dead_port = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        listener.local_addr()?.port()
    };

    let config = RunConfig::new("127.0.0.1", dead_port)
        .operations(10)
        .mode(RunMode::ClusterViaProxy {
            proxy_port: proxy.port(),
        });
    let bench = Benchmark::connect(config).await?;
    assert!(bench.flush_report().is_none());

    let stats = bench.run().await?;
    assert_eq!(stats.samples, 10);
    assert_eq!(proxy.state.sets(), 10);
    Ok(())
}
