use mongodb::options::ClientOptions;

use super::error::{MongoDaoError, MongoResult};

const DEFAULT_DB: &str = "courtroom";

/// Parsed client options plus the database holding the statistics collection.
#[derive(Clone)]
pub struct MongoConfig {
    /// Driver options parsed from the URI.
    pub options: ClientOptions,
    /// Database holding `player_stats`.
    pub database_name: String,
}

impl MongoConfig {
    /// Parse a connection string; `db_name` defaults to `courtroom`.
    pub async fn from_uri(uri: &str, db_name: Option<&str>) -> MongoResult<Self> {
        let database_name = db_name.unwrap_or(DEFAULT_DB).to_owned();
        let options =
            ClientOptions::parse(uri)
                .await
                .map_err(|source| MongoDaoError::InvalidUri {
                    uri: uri.to_owned(),
                    source,
                })?;

        Ok(Self {
            options,
            database_name,
        })
    }

    /// Read `MONGO_URI` and the optional `MONGO_DB`.
    pub async fn from_env() -> MongoResult<Self> {
        let uri = std::env::var("MONGO_URI")
            .map_err(|_| MongoDaoError::MissingEnvVar { var: "MONGO_URI" })?;
        let db = std::env::var("MONGO_DB").ok();
        Self::from_uri(&uri, db.as_deref()).await
    }
}
