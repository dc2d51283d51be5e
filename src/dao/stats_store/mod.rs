/// CouchDB backend.
#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;
/// MongoDB backend.
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::PlayerStatsEntity;
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;

/// Abstraction over the persistence layer for cumulative player statistics.
pub trait StatsStore: Send + Sync {
    /// Load the record of `user_id`, `None` if the player never finished a match.
    fn find_stats(
        &self,
        user_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerStatsEntity>>>;
    /// Insert or replace a record, keyed by its `user_id`.
    fn save_stats(&self, stats: PlayerStatsEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Cheap round-trip used by the storage supervisor.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the backend connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
