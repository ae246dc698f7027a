// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Worker configuration
//!
//! Precedence, lowest first: built-in defaults, the `--config` TOML file,
//! environment variables, explicit flags. Environment and flags arrive
//! already merged by clap as [`ConfigOverrides`].

use dt_core::DEFAULT_MAX_CONCURRENCY;
use dt_source_client::{DEFAULT_API_URL, MAX_PER_PAGE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

/// Database path that keeps the timeline in process memory
pub const IN_MEMORY_DATABASE: &str = ":memory:";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid api_url {url:?}: {source}")]
    ApiUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("max_concurrency must be at least 1")]
    ZeroConcurrency,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkerConfig {
    /// Base URL of the source-control REST API
    pub api_url: String,
    /// Bearer token for the API; never logged
    pub token: Option<String>,
    /// SQLite database file, or `:memory:`
    pub database_path: String,
    /// Page size for listings, clamped to 1..=100
    pub per_page: u8,
    /// Bound on concurrent per-item store lookups and writes within a step.
    /// Listing pages are fetched one after another by following `Link` headers.
    pub max_concurrency: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            token: None,
            database_path: default_database_path().to_string_lossy().into_owned(),
            per_page: MAX_PER_PAGE,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

/// Values supplied through the environment or on the command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub api_url: Option<String>,
    pub token: Option<String>,
    pub database_path: Option<String>,
    pub per_page: Option<u8>,
    pub max_concurrency: Option<usize>,
}

/// `<data dir>/deploy-timeline/timeline.sqlite3`
pub fn default_database_path() -> PathBuf {
    dt_logging::data_dir().join("timeline.sqlite3")
}

impl WorkerConfig {
    pub fn from_toml_str(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content, path)
    }

    /// Layer file and overrides over the defaults, then validate
    pub fn resolve(file: Option<&Path>, overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        let base = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        base.with_overrides(overrides).validated()
    }

    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(api_url) = overrides.api_url {
            self.api_url = api_url;
        }
        if let Some(token) = overrides.token {
            self.token = Some(token);
        }
        if let Some(database_path) = overrides.database_path {
            self.database_path = database_path;
        }
        if let Some(per_page) = overrides.per_page {
            self.per_page = per_page;
        }
        if let Some(max_concurrency) = overrides.max_concurrency {
            self.max_concurrency = max_concurrency;
        }
        self
    }

    /// Clamp `per_page` and reject values no scan could run with
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        self.per_page = self.per_page.clamp(1, MAX_PER_PAGE);
        if self.max_concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        self.api_url()?;
        if self.token.as_deref().is_some_and(|token| token.trim().is_empty()) {
            self.token = None;
        }
        Ok(self)
    }

    pub fn api_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.api_url).map_err(|source| ConfigError::ApiUrl {
            url: self.api_url.clone(),
            source,
        })
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_path == IN_MEMORY_DATABASE
    }
}
