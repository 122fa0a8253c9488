//! Runtime configuration.
//!
//! Precedence: CLI > env > config file > defaults. The only environment
//! variable consulted is [`URI_ENV`].

use crate::errors::{BookstoreError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_URI: &str = "mongodb://localhost:27017";
pub const DEFAULT_DATABASE: &str = "plp_bookstore";
pub const DEFAULT_COLLECTION: &str = "books";
pub const URI_ENV: &str = "BOOKSTORE_MONGODB_URI";
pub const CONFIG_FILE_NAME: &str = "bookstore.toml";

/// Where and what to connect to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub uri: String,
    pub database: String,
    pub collection: String,
    pub server_selection_timeout_ms: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri: DEFAULT_URI.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            server_selection_timeout_ms: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// error|warn|info|debug|trace
    pub level: Option<String>,
    /// When set, logs are also written to a rolling file in this directory.
    pub dir: Option<PathBuf>,
}

/// On-disk shape of `bookstore.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub uri: Option<String>,
    pub database: Option<String>,
    pub collection: Option<String>,
    pub server_selection_timeout_ms: Option<u64>,
    pub logging: LoggingConfig,
}

impl FileConfig {
    /// # Errors
    /// `Io` when the file cannot be read, `Config` when it is not valid TOML.
    pub fn read(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)
            .map_err(|e| BookstoreError::Io(format!("{}: {e}", path.display())))?;
        toml::from_str(&s)
            .map_err(|e| BookstoreError::Config(format!("{}: {e}", path.display())))
    }
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config_path: Option<PathBuf>,
    pub uri: Option<String>,
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

/// Implicit config locations, in lookup order.
fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Ok(cur) = std::env::current_dir() {
        paths.push(cur.join(CONFIG_FILE_NAME));
    }
    if let Some(dir) = dirs_next::config_dir() {
        paths.push(dir.join("bookstore").join(CONFIG_FILE_NAME));
    }
    paths
}

impl AppConfig {
    /// Loads configuration for this process.
    ///
    /// # Errors
    /// An explicit `--config` file that is missing or malformed.
    pub fn load(overrides: &Overrides) -> Result<Self> {
        let file = match &overrides.config_path {
            Some(p) => Some(FileConfig::read(p)?),
            None => default_config_paths().into_iter().filter(|p| p.exists()).find_map(|p| {
                match FileConfig::read(&p) {
                    Ok(cfg) => {
                        log::debug!("loaded config from {}", p.display());
                        Some(cfg)
                    }
                    Err(e) => {
                        log::warn!("ignoring config file: {e}");
                        None
                    }
                }
            }),
        };
        Ok(Self::resolve(file.unwrap_or_default(), std::env::var(URI_ENV).ok(), overrides))
    }

    /// Merges the sources; pure so precedence can be tested without touching the process env.
    #[must_use]
    pub fn resolve(file: FileConfig, env_uri: Option<String>, overrides: &Overrides) -> Self {
        let defaults = StoreConfig::default();
        let uri = overrides
            .uri
            .clone()
            .or(env_uri.filter(|s| !s.trim().is_empty()))
            .or(file.uri)
            .unwrap_or(defaults.uri);
        let mut logging = file.logging;
        if overrides.log_level.is_some() {
            logging.level = overrides.log_level.clone();
        }
        Self {
            store: StoreConfig {
                uri,
                database: file.database.unwrap_or(defaults.database),
                collection: file.collection.unwrap_or(defaults.collection),
                server_selection_timeout_ms: file.server_selection_timeout_ms,
            },
            logging,
        }
    }
}
