use mongodb::error::Error as MongoError;
use thiserror::Error;

/// Result alias for the MongoDB statistics store.
pub type MongoResult<T> = Result<T, MongoDaoError>;

/// Failures raised by the MongoDB statistics store.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// A required environment variable is not set.
    #[error("missing MongoDB environment variable `{var}`")]
    MissingEnvVar {
        /// Variable name.
        var: &'static str,
    },
    /// `MONGO_URI` could not be parsed.
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        /// Offending URI.
        uri: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The driver rejected the client options.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The server never answered the startup ping.
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        /// Pings tried.
        attempts: u32,
        /// Last driver error.
        #[source]
        source: MongoError,
    },
    /// A periodic ping failed.
    #[error("MongoDB ping health check failed")]
    HealthPing {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Creating an index failed.
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        /// Collection name.
        collection: &'static str,
        /// Index name.
        index: &'static str,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Reading a player's document failed.
    #[error("failed to load statistics of `{user_id}`")]
    LoadStats {
        /// Account id.
        user_id: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Writing a player's document failed.
    #[error("failed to save statistics of `{user_id}`")]
    SaveStats {
        /// Account id.
        user_id: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
}
