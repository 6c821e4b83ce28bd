//! Client settings loaded via OrthoConfig.

use std::path::PathBuf;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use url::Url;

use crate::domain::{AuthToken, RetryBackoff};

const DEFAULT_DATABASE_FILE: &str = "story-sync.db";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
const DEFAULT_PROBE_INTERVAL_SECS: u64 = 30;
const DEFAULT_MAX_BACKOFF_MS: u64 = 15 * 60 * 1000;

/// Settings for the local store, the remote service, and the sync engine.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "STORY_SYNC")]
pub struct SyncSettings {
    /// SQLite database file.
    pub database_path: Option<PathBuf>,
    /// Story service base URL. Without it a fixture remote accepts every
    /// submission and lists nothing.
    pub api_base_url: Option<String>,
    /// Bearer token for the story service.
    pub auth_token: Option<String>,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: Option<u64>,
    /// First retry delay for failed items. Unset disables backoff.
    pub retry_initial_backoff_ms: Option<u64>,
    /// Upper bound on the retry delay.
    pub retry_max_backoff_ms: Option<u64>,
    /// Reachability probe interval in seconds.
    pub probe_interval_secs: Option<u64>,
}

/// Raised when a configured value cannot be used.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// `api_base_url` did not parse.
    #[error("invalid api_base_url `{value}`: {source}")]
    InvalidBaseUrl {
        /// Raw configured value.
        value: String,
        /// Parser error.
        source: url::ParseError,
    },
}

impl SyncSettings {
    /// Database file, defaulting to `story-sync.db` in the working directory.
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_FILE))
    }

    /// Parsed base URL, if one is configured.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::InvalidBaseUrl`] when the value does not parse.
    pub fn api_base_url(&self) -> Result<Option<Url>, SettingsError> {
        self.api_base_url
            .as_deref()
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| {
                Url::parse(raw).map_err(|source| SettingsError::InvalidBaseUrl {
                    value: raw.to_owned(),
                    source,
                })
            })
            .transpose()
    }

    /// Token for remote calls. An empty token is sent when none is set.
    pub fn auth_token(&self) -> AuthToken {
        AuthToken::new(self.auth_token.clone().unwrap_or_default())
    }

    /// Per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS)
                .max(1),
        )
    }

    /// Reachability probe interval.
    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(
            self.probe_interval_secs
                .unwrap_or(DEFAULT_PROBE_INTERVAL_SECS)
                .max(1),
        )
    }

    /// Retry backoff, present only when an initial delay is configured.
    pub fn retry_backoff(&self) -> Option<RetryBackoff> {
        let initial = self.retry_initial_backoff_ms.filter(|ms| *ms > 0)?;
        let max = self
            .retry_max_backoff_ms
            .unwrap_or(DEFAULT_MAX_BACKOFF_MS)
            .max(initial);
        Some(RetryBackoff {
            initial: Duration::from_millis(initial),
            max: Duration::from_millis(max),
        })
    }
}
