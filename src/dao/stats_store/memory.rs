//! Process-local statistics store, used when no database is configured and in tests.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;

use crate::dao::{models::PlayerStatsEntity, stats_store::StatsStore, storage::StorageResult};

/// Statistics kept in a concurrent map for the lifetime of the process.
#[derive(Clone, Default)]
pub struct MemoryStatsStore {
    records: Arc<DashMap<String, PlayerStatsEntity>>,
}

impl MemoryStatsStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatsStore for MemoryStatsStore {
    fn find_stats(
        &self,
        user_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerStatsEntity>>> {
        let found = self.records.get(&user_id).map(|entry| entry.value().clone());
        Box::pin(async move { Ok(found) })
    }

    fn save_stats(&self, stats: PlayerStatsEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.records.insert(stats.user_id.clone(), stats);
        Box::pin(async { Ok(()) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn saves_and_replaces_records() {
        let store = MemoryStatsStore::new();
        assert!(store.find_stats("u-1".into()).await.unwrap().is_none());

        let mut stats = PlayerStatsEntity::new("u-1".into());
        store.save_stats(stats.clone()).await.unwrap();
        stats.games_played = 3;
        store.save_stats(stats).await.unwrap();

        let found = store.find_stats("u-1".into()).await.unwrap().unwrap();
        assert_eq!(found.games_played, 3);
        assert!(store.find_stats("u-2".into()).await.unwrap().is_none());
    }
}
