// src/config.rs
//! Configuration file parsing for rpmmap
//!
//! Supports TOML configuration files with the following sections:
//! - [database] - Database location and lock timeout
//! - [mapping] - Mapping read behavior
//! - [logging] - Default log filter
//!
//! A missing file means defaults. `RPMMAP_DB` overrides `database.path`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "/etc/rpmmap/config.toml";

/// Environment variable overriding the database path
pub const DB_PATH_ENV: &str = "RPMMAP_DB";

/// TOML configuration file structure
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Database settings
    #[serde(default)]
    pub database: DatabaseSection,

    /// Mapping settings
    #[serde(default)]
    pub mapping: MappingConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Database configuration section
#[derive(Debug, Deserialize)]
pub struct DatabaseSection {
    /// Path to the SQLite database
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    /// How long to wait for a locked database, in milliseconds
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("/var/lib/rpmmap/rpmmap.db")
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

/// Mapping configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct MappingConfig {
    /// Delete ineffective, unprotected overrides when a mapping is read
    #[serde(default = "default_true")]
    pub cleanup_useless: bool,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            cleanup_useless: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Logging configuration section
#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    /// `tracing` filter directive used when `RUST_LOG` is unset
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

fn default_filter() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load `path` if it exists, defaults otherwise, then apply the
    /// environment override
    pub fn load_or_default(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            Self::load(path)?
        } else {
            Self::default()
        };

        if let Ok(db_path) = std::env::var(DB_PATH_ENV)
            && !db_path.is_empty()
        {
            config.database.path = PathBuf::from(db_path);
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.database.path.as_os_str().is_empty() {
            anyhow::bail!("database.path must not be empty");
        }
        if self.database.busy_timeout_ms == 0 {
            anyhow::bail!("database.busy_timeout_ms must be greater than zero");
        }
        Ok(())
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.database.busy_timeout_ms)
    }

    /// Database path as a string, as the database layer expects it
    pub fn db_path(&self) -> Result<&str> {
        self.database.path.to_str().with_context(|| {
            format!(
                "database.path is not valid UTF-8: {}",
                self.database.path.display()
            )
        })
    }
}
