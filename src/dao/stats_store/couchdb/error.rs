//! Error types raised by the CouchDB statistics store.

use reqwest::StatusCode;
use thiserror::Error;

/// Convenient result alias returning [`CouchDaoError`] failures.
pub type CouchResult<T> = Result<T, CouchDaoError>;

/// Failures that can occur while interacting with CouchDB.
#[derive(Debug, Error)]
pub enum CouchDaoError {
    /// Required environment variable is missing.
    #[error("missing CouchDB environment variable `{var}`")]
    MissingEnvVar {
        /// Variable name.
        var: &'static str,
    },
    /// Building the HTTP client failed.
    #[error("failed to build CouchDB client")]
    ClientBuilder {
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },
    /// The database could not be queried or created.
    #[error("failed to reach CouchDB database `{database}`")]
    Database {
        /// Database name.
        database: String,
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },
    /// CouchDB returned an unexpected status code for a database operation.
    #[error("unexpected CouchDB database response status {status} for `{database}`")]
    DatabaseStatus {
        /// Database name.
        database: String,
        /// Status received.
        status: StatusCode,
    },
    /// A request to a document endpoint could not be sent.
    #[error("failed to send CouchDB request to `{path}`")]
    RequestSend {
        /// Request path.
        path: String,
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },
    /// CouchDB returned an unexpected status code for a document endpoint.
    #[error("unexpected CouchDB response status {status} for `{path}`")]
    RequestStatus {
        /// Request path.
        path: String,
        /// Status received.
        status: StatusCode,
    },
    /// Response payload could not be decoded.
    #[error("failed to decode CouchDB response for `{path}`")]
    DecodeResponse {
        /// Request path.
        path: String,
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },
}
