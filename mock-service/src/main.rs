use mock_service::{MockConfig, MockState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let addr: SocketAddr = "0.0.0.0:6380".parse()?;
    let state = Arc::new(MockState::default());
    tokio::spawn(ops_measure_task(state.clone()));

    mock_service::run(addr, MockConfig::default(), state).await
}

async fn ops_measure_task(state: Arc<MockState>) {
    let mut last = 0;
    loop {
        tokio::time::sleep(Duration::from_millis(1000)).await;
        let sets = state.sets();
        println!("{} SET/s", sets - last);
        last = sets;
    }
}
