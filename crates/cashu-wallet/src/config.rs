//! Wallet settings
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then environment
//! variables prefixed with `CASHU_WALLET` (nested keys joined by `__`, for example
//! `CASHU_WALLET_POLLER__ATTEMPTS=5`).

use std::path::PathBuf;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "CASHU_WALLET";

/// Reconciliation poller settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    /// Milliseconds between two scheduled poll cycles
    pub check_interval_ms: u64,
    /// Failed checks a pending transaction is allowed before polling for it stops
    pub attempts: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: 10_000,
            attempts: 20,
        }
    }
}

impl PollerConfig {
    /// Interval between scheduled poll cycles
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms.max(1))
    }
}

/// Storage engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageEngine {
    /// Nothing survives a restart
    #[default]
    Memory,
    /// One JSON file per mint
    File,
    /// One redb database for all mints
    Redb,
}

impl std::str::FromStr for StorageEngine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(StorageEngine::Memory),
            "file" => Ok(StorageEngine::File),
            "redb" => Ok(StorageEngine::Redb),
            _ => Err(format!("Unknown storage engine: {s}")),
        }
    }
}

/// Storage settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Engine
    pub engine: StorageEngine,
    /// Directory on-disk engines write to
    pub work_dir: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            engine: StorageEngine::default(),
            work_dir: PathBuf::from(".cashu-wallet"),
        }
    }
}

/// Wallet settings, derived from `config.toml` and the environment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Poller
    pub poller: PollerConfig,
    /// Storage
    pub storage: StorageSettings,
    /// Trusted mints loaded on startup
    pub mints: Vec<String>,
}

impl Settings {
    /// Load settings, falling back to the defaults if they cannot be read
    ///
    /// Without a file name only the defaults and the environment are used.
    #[must_use]
    pub fn new<P>(config_file_name: Option<P>) -> Self
    where
        P: Into<PathBuf>,
    {
        let default_settings = Self::default();
        // attempt to construct settings with file
        let from_file = Self::new_from_default(&default_settings, config_file_name);
        match from_file {
            Ok(f) => f,
            Err(e) => {
                tracing::error!(
                    "Error reading config file, falling back to defaults. Error: {e:?}"
                );
                default_settings
            }
        }
    }

    fn new_from_default<P>(
        default: &Settings,
        config_file_name: Option<P>,
    ) -> Result<Self, ConfigError>
    where
        P: Into<PathBuf>,
    {
        let mut builder = Config::builder()
            // use defaults
            .add_source(Config::try_from(default)?);

        if let Some(config_file_name) = config_file_name {
            let config: String = config_file_name.into().to_string_lossy().to_string();
            // override with file contents
            builder = builder.add_source(File::with_name(&config));
        }

        let config: Config = builder
            // override with environment
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("mints"),
            )
            .build()?;

        config.try_deserialize()
    }
}
