use std::sync::Arc;

use futures::future::BoxFuture;
use mongodb::{Client, Collection, Database, IndexModel, bson::doc, options::IndexOptions};
use tokio::sync::RwLock;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoStatsDocument, doc_id},
};
use crate::dao::{models::PlayerStatsEntity, stats_store::StatsStore, storage::StorageResult};

const STATS_COLLECTION_NAME: &str = "player_stats";

/// Statistics store backed by a MongoDB collection.
#[derive(Clone)]
pub struct MongoStatsStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    // Kept so the connection pool lives as long as the database handle.
    #[allow(dead_code)]
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoStatsStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let collection = self.collection().await;
        let index = IndexModel::builder()
            .keys(doc! {"games_won": -1})
            .options(
                IndexOptions::builder()
                    .name(Some("player_stats_wins_idx".to_owned()))
                    .build(),
            )
            .build();

        collection
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: STATS_COLLECTION_NAME,
                index: "games_won",
                source,
            })?;
        Ok(())
    }

    async fn collection(&self) -> Collection<MongoStatsDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoStatsDocument>(STATS_COLLECTION_NAME)
    }

    async fn find(&self, user_id: String) -> MongoResult<Option<PlayerStatsEntity>> {
        let collection = self.collection().await;
        let document = collection
            .find_one(doc_id(&user_id))
            .await
            .map_err(|source| MongoDaoError::LoadStats { user_id, source })?;
        Ok(document.map(Into::into))
    }

    async fn save(&self, stats: PlayerStatsEntity) -> MongoResult<()> {
        let user_id = stats.user_id.clone();
        let document: MongoStatsDocument = stats.into();
        let collection = self.collection().await;
        collection
            .replace_one(doc_id(&user_id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveStats { user_id, source })?;
        Ok(())
    }
}

impl StatsStore for MongoStatsStore {
    fn find_stats(
        &self,
        user_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerStatsEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find(user_id).await.map_err(Into::into) })
    }

    fn save_stats(&self, stats: PlayerStatsEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save(stats).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
