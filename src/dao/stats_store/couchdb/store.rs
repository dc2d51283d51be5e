use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};

use crate::dao::{
    models::PlayerStatsEntity,
    stats_store::StatsStore,
    storage::{StorageError, StorageResult},
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{CouchStatsDocument, stats_doc_id},
};

/// Statistics store backed by a CouchDB database reached over HTTP.
#[derive(Clone)]
pub struct CouchStatsStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

impl CouchStatsStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let base_url = Arc::<str>::from(config.base_url.trim_end_matches('/'));
        let database = Arc::<str>::from(config.database);
        let auth = config
            .username
            .zip(config.password)
            .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p)));

        let store = Self {
            client,
            base_url,
            database,
            auth,
        };
        store.ensure_database().await?;
        Ok(store)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth {
            Some((ref user, ref pass)) => builder.basic_auth(user.as_ref(), Some(pass.as_ref())),
            None => builder,
        }
    }

    fn database_url(&self) -> String {
        format!("{}/{}", self.base_url, self.database)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.database_url(), path);
        self.authorize(self.client.request(method, url))
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = self.database_url();

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|source| CouchDaoError::Database {
                database: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .authorize(self.client.put(&url))
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::Database {
                        database: database.clone(),
                        source,
                    })?;
                if create.status().is_success() {
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                status: other,
            }),
        }
    }

    async fn get_document<T>(&self, doc_id: &str) -> CouchResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::GET, doc_id)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                response.json::<T>().await.map(Some).map_err(|source| {
                    CouchDaoError::DecodeResponse {
                        path: doc_id.to_string(),
                        source,
                    }
                })
            }
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn put_document<T>(&self, doc_id: &str, document: &T) -> CouchResult<()>
    where
        T: ?Sized + Serialize,
    {
        let response = self
            .request(Method::PUT, doc_id)
            .json(document)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: response.status(),
            })
        }
    }

    async fn save(&self, stats: PlayerStatsEntity) -> CouchResult<()> {
        let doc_id = stats_doc_id(&stats.user_id);
        // Updates must quote the current revision or CouchDB answers 409.
        let rev = self
            .get_document::<CouchStatsDocument>(&doc_id)
            .await?
            .and_then(|existing| existing.rev);
        let doc = CouchStatsDocument::from_entity(stats, rev);
        self.put_document(&doc_id, &doc).await
    }
}

impl StatsStore for CouchStatsStore {
    fn find_stats(
        &self,
        user_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerStatsEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = stats_doc_id(&user_id);
            let maybe_doc = store.get_document::<CouchStatsDocument>(&doc_id).await?;
            match maybe_doc {
                Some(doc) if doc.stats.user_id != user_id => Err(StorageError::Corrupted {
                    user_id,
                    message: format!("document belongs to `{}`", doc.stats.user_id),
                }),
                other => Ok(other.map(|doc| doc.stats)),
            }
        })
    }

    fn save_stats(&self, stats: PlayerStatsEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save(stats).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let url = store.database_url();
            let response = store
                .authorize(store.client.get(&url))
                .send()
                .await
                .map_err(|source| CouchDaoError::RequestSend {
                    path: url.clone(),
                    source,
                })?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(CouchDaoError::RequestStatus {
                    path: url,
                    status: response.status(),
                }
                .into())
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}
