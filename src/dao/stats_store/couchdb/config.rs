use super::error::{CouchDaoError, CouchResult};

/// Runtime configuration describing how to reach the CouchDB statistics database.
#[derive(Debug, Clone)]
pub struct CouchConfig {
    /// Server URL without a trailing slash.
    pub base_url: String,
    /// Database name.
    pub database: String,
    /// Basic auth user.
    pub username: Option<String>,
    /// Basic auth password.
    pub password: Option<String>,
}

impl CouchConfig {
    /// Construct a configuration from explicit base URL and database name.
    pub fn new(base_url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            database: database.into(),
            username: None,
            password: None,
        }
    }

    /// Attach basic-auth credentials.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Read `COUCH_BASE_URL`, `COUCH_DB` and the optional credentials.
    pub fn from_env() -> CouchResult<Self> {
        let base_url =
            std::env::var("COUCH_BASE_URL").map_err(|_| CouchDaoError::MissingEnvVar {
                var: "COUCH_BASE_URL",
            })?;
        let database = std::env::var("COUCH_DB").unwrap_or_else(|_| "courtroom".to_string());

        let mut config = Self::new(base_url, database);
        if let (Ok(username), Ok(password)) = (
            std::env::var("COUCH_USERNAME"),
            std::env::var("COUCH_PASSWORD"),
        ) {
            config = config.with_credentials(username, password);
        }
        Ok(config)
    }
}
