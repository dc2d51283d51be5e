//! Application-level configuration loading: match timings and oracle connection settings.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::{DurationMilliSeconds, DurationSeconds, serde_as};
use tracing::{info, warn};

use crate::{oracle::OracleClientConfig, state::room::RoomSettings};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "COURTROOM_BACK_CONFIG_PATH";

const DEFAULT_ORACLE_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_ORACLE_MODEL: &str = "gpt-4o-mini";

/// Immutable runtime configuration shared across the application.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Length of the case reading countdown.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub case_reading: Duration,
    /// Length of the verdict reading countdown between rounds.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub round_reading: Duration,
    /// Time allowed for each argument.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub turn: Duration,
    /// Pause between the coin flip and the case reading.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub ready_delay: Duration,
    /// How long a finished room stays available for result screens.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub game_over_retention: Duration,
    /// Longest accepted argument, in characters.
    pub max_argument_chars: usize,
    /// Require both players to be ready in the lobby before the match starts.
    pub lobby_ready_gate: bool,
    /// Text generation service settings.
    pub oracle: OracleSettings,
}

/// Connection settings of the text generation service.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OracleSettings {
    /// Chat completions URL.
    pub endpoint: String,
    /// Model identifier.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Upper bound for one request.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub timeout: Duration,
    /// Bearer token. Usually supplied through `ORACLE_API_KEY` rather than the file.
    pub api_key: String,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ORACLE_ENDPOINT.into(),
            model: DEFAULT_ORACLE_MODEL.into(),
            temperature: 0.7,
            timeout: Duration::from_secs(60),
            api_key: String::new(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            case_reading: Duration::from_secs(120),
            round_reading: Duration::from_secs(60),
            turn: Duration::from_secs(90),
            ready_delay: Duration::from_millis(1_000),
            game_over_retention: Duration::from_secs(300),
            max_argument_chars: 2_000,
            lobby_ready_gate: false,
            oracle: OracleSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load the configuration from disk, falling back to built-in defaults, then apply
    /// environment overrides for the oracle connection.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let mut config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Self>(&contents) {
                Ok(config) => {
                    info!(path = %path.display(), "loaded configuration");
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        };
        config.apply_env_overrides(|name| env::var(name).ok());
        config
    }

    /// Override oracle settings from `ORACLE_API_KEY`, `ORACLE_ENDPOINT` and `ORACLE_MODEL`.
    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        if let Some(key) = lookup("ORACLE_API_KEY") {
            self.oracle.api_key = key;
        }
        if let Some(endpoint) = lookup("ORACLE_ENDPOINT") {
            self.oracle.endpoint = endpoint;
        }
        if let Some(model) = lookup("ORACLE_MODEL") {
            self.oracle.model = model;
        }
    }

    /// Settings handed to every new room.
    pub fn room_settings(&self) -> RoomSettings {
        RoomSettings {
            case_reading_secs: whole_seconds(self.case_reading),
            round_reading_secs: whole_seconds(self.round_reading),
            turn_secs: whole_seconds(self.turn),
            ready_delay: self.ready_delay,
            max_argument_chars: self.max_argument_chars,
            lobby_ready_gate: self.lobby_ready_gate,
        }
    }

    /// Settings for the HTTP text generation client.
    pub fn oracle_client(&self) -> OracleClientConfig {
        OracleClientConfig {
            endpoint: self.oracle.endpoint.clone(),
            api_key: self.oracle.api_key.clone(),
            model: self.oracle.model.clone(),
            temperature: self.oracle.temperature,
            timeout: self.oracle.timeout,
        }
    }
}

/// Countdowns run on whole seconds; anything shorter than one second still lasts one.
fn whole_seconds(duration: Duration) -> u32 {
    u32::try_from(duration.as_secs()).unwrap_or(u32::MAX).max(1)
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
