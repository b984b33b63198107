// Runtime configuration for the paddockd runner (paddock.toml).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },
}

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseSection,
    pub cache: CacheSection,
    pub jobs: JobsSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    /// How long a computed leaderboard stays valid. Minutes-scale; cache
    /// entries are also invalidated explicitly on every score change.
    pub leaderboard_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JobsSection {
    /// Interval between season recompute / event rescoring ticks.
    pub scoring_interval_secs: u64,
    /// Interval between draft-closure (auto-pick timer) ticks.
    pub draft_interval_secs: u64,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        DatabaseSection {
            path: "paddock.db".to_string(),
        }
    }
}

impl Default for CacheSection {
    fn default() -> Self {
        CacheSection {
            leaderboard_ttl_secs: 300,
        }
    }
}

impl Default for JobsSection {
    fn default() -> Self {
        JobsSection {
            scoring_interval_secs: 600,
            draft_interval_secs: 30,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database: DatabaseSection::default(),
            cache: CacheSection::default(),
            jobs: JobsSection::default(),
        }
    }
}

impl Config {
    pub fn leaderboard_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.leaderboard_ttl_secs)
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load configuration from `path`. Missing file is an error here; callers
/// that want defaults-on-missing use `load_or_default`.
pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: Config = toml::from_str(&text).map_err(|source| ConfigError::ParseError {
        path: path.to_path_buf(),
        source,
    })?;
    validate(&config)?;
    Ok(config)
}

/// Load configuration from `path`, falling back to built-in defaults when
/// the file does not exist.
pub fn load_or_default(path: &Path) -> Result<Config, ConfigError> {
    match load_from(path) {
        Err(ConfigError::FileNotFound { .. }) => Ok(Config::default()),
        other => other,
    }
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.database.path.is_empty() {
        return Err(ConfigError::ValidationError {
            field: "database.path".to_string(),
            message: "must not be empty".to_string(),
        });
    }
    if config.cache.leaderboard_ttl_secs == 0 {
        return Err(ConfigError::ValidationError {
            field: "cache.leaderboard_ttl_secs".to_string(),
            message: "must be positive".to_string(),
        });
    }
    if config.jobs.scoring_interval_secs == 0 || config.jobs.draft_interval_secs == 0 {
        return Err(ConfigError::ValidationError {
            field: "jobs".to_string(),
            message: "intervals must be positive".to_string(),
        });
    }
    Ok(())
}
