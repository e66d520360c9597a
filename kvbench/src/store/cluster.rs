use super::{KvStore, StoreError};
use redis::cluster::ClusterClient;
use redis::cluster_async::ClusterConnection;

/// Topology-aware client that routes each key to the shard owning its slot.
pub struct ClusterStore {
    conn: ClusterConnection,
}

impl ClusterStore {
    pub async fn connect(seed_url: &str) -> Result<Self, StoreError> {
        let client = ClusterClient::new(vec![seed_url])?;
        let conn = client.get_async_connection().await?;
        Ok(Self { conn })
    }
}

impl KvStore for ClusterStore {
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        // Clones share the underlying multiplexed node connections.
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }
}
