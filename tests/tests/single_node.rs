mod utils;
use utils::*;

use kvbench::prelude::*;
use kvbench::store::Target;
use kvbench::BenchError;
use mock_service::MockConfig;
use std::num::NonZeroUsize;
use std::time::Duration;

fn nz(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn single_node_run_writes_every_operation() -> anyhow::Result<()> {
    init();
    let mock = mock_service::spawn(MockConfig::default()).await?;

    let config = RunConfig::new("127.0.0.1", mock.port())
        .operations(500)
        .concurrency(nz(8))
        .connections(nz(4))
        .payload_size(64);
    let bench = Benchmark::connect(config).await?;
    assert!(bench.flush_report().is_none());
    let Target::Pooled(pool) = bench.store() else {
        panic!("single-node runs write through a connection pool");
    };
    assert_eq!(pool.size().get(), 4);
    assert_eq!(pool.idle(), 4);

    let stats = tokio::time::timeout(Duration::from_secs(30), bench.run()).await??;
    assert_eq!(pool.idle(), 4, "every borrowed connection is returned");
    bench.close();
    assert_eq!(pool.idle(), 0);

    assert_eq!(stats.samples, 500);
    assert_eq!(stats.errors, 0);
    assert_eq!(mock.state.sets(), 500);
    assert_eq!(mock.state.any_value_len(), Some(64));
    assert_eq!(mock.state.flushes(), 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failing_node_still_completes() -> anyhow::Result<()> {
    init();
    let mock = mock_service::spawn(MockConfig {
        fail_sets: true,
        ..Default::default()
    })
    .await?;

    let config = RunConfig::new("127.0.0.1", mock.port())
        .operations(200)
        .concurrency(nz(16))
        .connections(nz(2));
    let bench = Benchmark::connect(config).await?;

    let stats = tokio::time::timeout(Duration::from_secs(30), bench.run())
        .await
        .expect("run hung on failing writes")?;

    assert_eq!(stats.samples, 200);
    assert_eq!(stats.errors, 200);
    assert_eq!(mock.state.keys(), 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn slow_node_hits_operation_timeout() -> anyhow::Result<()> {
    init();
    let mock = mock_service::spawn(MockConfig {
        set_delay: Duration::from_millis(500),
        ..Default::default()
    })
    .await?;

    let config = RunConfig::new("127.0.0.1", mock.port())
        .operations(4)
        .concurrency(nz(4))
        .connections(nz(4))
        .op_timeout(Duration::from_millis(50));
    let bench = Benchmark::connect(config).await?;

    let stats = tokio::time::timeout(Duration::from_secs(30), bench.run()).await??;

    assert_eq!(stats.samples, 4);
    assert_eq!(stats.errors, 4);
    assert!(stats.latency.p100 < Duration::from_millis(500));
    Ok(())
}

#[tokio::test]
async fn loop_iterations_are_independent() -> anyhow::Result<()> {
    init();
    let mock = mock_service::spawn(MockConfig::default()).await?;
    let config = RunConfig::new("127.0.0.1", mock.port())
        .operations(50)
        .concurrency(nz(4))
        .connections(nz(2));

    for iteration in 1..=3u64 {
        let bench = Benchmark::connect(config.clone()).await?;
        let stats = bench.run().await?;
        bench.close();

        assert_eq!(stats.samples, 50);
        assert_eq!(mock.state.sets(), 50 * iteration);
    }
    Ok(())
}

#[tokio::test]
async fn unreachable_node_is_fatal() -> anyhow::Result<()> {
    init();
    // Grab a free port, then release it so nothing is listening.
    let port = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        listener.local_addr()?.port()
    };

    let config = RunConfig::new("127.0.0.1", port).operations(10);
    let res = tokio::time::timeout(Duration::from_secs(30), Benchmark::connect(config)).await?;
    assert!(matches!(res, Err(BenchError::Connect(_))));
    Ok(())
}
