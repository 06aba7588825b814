//! # Cash Register Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     CLINIC_DATABASE_PATH=/var/lib/clinic/cash_register.db              │
//! │     CLINIC_DB_MAX_CONNECTIONS=5                                        │
//! │     CLINIC_VOID_WINDOW_HOURS=24                                        │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/clinic-cash-register/cash_register.toml (Linux)          │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # cash_register.toml
//! [database]
//! path = "/var/lib/clinic/cash_register.db"
//! max_connections = 5
//! run_migrations = true
//!
//! [ledger]
//! void_window_hours = 24
//! history_limit = 50
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

use clinic_core::{DEFAULT_HISTORY_LIMIT, DEFAULT_VOID_WINDOW_HOURS};
use clinic_db::DbConfig;

const CONFIG_FILE_NAME: &str = "cash_register.toml";
const DATABASE_FILE_NAME: &str = "cash_register.db";

// =============================================================================
// Errors
// =============================================================================

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read or write config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("No config path available")]
    NoConfigPath,
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Database Settings
// =============================================================================

/// Where and how the ledger database is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file path. `:memory:` gives a throwaway database.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

fn default_database_path() -> PathBuf {
    directories::ProjectDirs::from("com", "clinic", "cash-register")
        .map(|dirs| dirs.data_dir().join(DATABASE_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(DATABASE_FILE_NAME))
}

fn default_max_connections() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
            max_connections: default_max_connections(),
            run_migrations: true,
        }
    }
}

// =============================================================================
// Ledger Settings
// =============================================================================

/// Business settings of the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSettings {
    /// Hours after closing during which transactions may be voided.
    #[serde(default = "default_void_window_hours")]
    pub void_window_hours: i64,

    /// Default page size for audit history.
    #[serde(default = "default_history_limit")]
    pub history_limit: u32,
}

fn default_void_window_hours() -> i64 {
    DEFAULT_VOID_WINDOW_HOURS
}

fn default_history_limit() -> u32 {
    DEFAULT_HISTORY_LIMIT
}

impl Default for LedgerSettings {
    fn default() -> Self {
        LedgerSettings {
            void_window_hours: default_void_window_hours(),
            history_limit: default_history_limit(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete cash register configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub ledger: LedgerSettings,
}

impl LedgerConfig {
    /// Configuration backed by an in-memory database (tests, demos).
    pub fn in_memory() -> Self {
        LedgerConfig {
            database: DatabaseSettings {
                path: PathBuf::from(":memory:"),
                max_connections: 1,
                run_migrations: true,
            },
            ledger: LedgerSettings::default(),
        }
    }

    /// Loads defaults, then the TOML file, then environment overrides.
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading cash register config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Like [`LedgerConfig::load`], falling back to defaults on any error.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load cash register config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Writes the configuration as TOML.
    pub fn save(&self, config_path: Option<PathBuf>) -> ConfigResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or(ConfigError::NoConfigPath)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Cash register config saved");
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.ledger.void_window_hours <= 0 {
            return Err(ConfigError::Invalid(
                "ledger.void_window_hours must be greater than 0".into(),
            ));
        }

        if self.ledger.history_limit == 0 {
            return Err(ConfigError::Invalid(
                "ledger.history_limit must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies `CLINIC_*` overrides read through `lookup`.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("CLINIC_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(max) = lookup("CLINIC_DB_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(max) => self.database.max_connections = max,
                Err(_) => warn!(value = %max, "Ignoring invalid CLINIC_DB_MAX_CONNECTIONS"),
            }
        }

        if let Some(hours) = lookup("CLINIC_VOID_WINDOW_HOURS") {
            match hours.parse::<i64>() {
                Ok(hours) => {
                    debug!(hours, "Overriding void window from environment");
                    self.ledger.void_window_hours = hours;
                }
                Err(_) => warn!(value = %hours, "Ignoring invalid CLINIC_VOID_WINDOW_HOURS"),
            }
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "clinic", "cash-register")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Pool configuration for [`clinic_db::Database::new`].
    pub fn db_config(&self) -> DbConfig {
        let base = if self.database.path.as_os_str() == ":memory:" {
            DbConfig::in_memory()
        } else {
            DbConfig::new(self.database.path.clone()).max_connections(self.database.max_connections)
        };
        base.run_migrations(self.database.run_migrations)
    }

    pub fn void_window_hours(&self) -> i64 {
        self.ledger.void_window_hours
    }

    pub fn history_limit(&self) -> u32 {
        self.ledger.history_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = LedgerConfig::default();
        assert_eq!(config.ledger.void_window_hours, 24);
        assert_eq!(config.ledger.history_limit, 50);
        assert!(config.database.run_migrations);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = LedgerConfig::default();
        config.ledger.void_window_hours = 0;
        assert!(config.validate().is_err());

        config.ledger.void_window_hours = 24;
        config.database.max_connections = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("CLINIC_DATABASE_PATH", "/tmp/clinic.db"),
            ("CLINIC_VOID_WINDOW_HOURS", "48"),
            ("CLINIC_DB_MAX_CONNECTIONS", "not-a-number"),
        ]);

        let mut config = LedgerConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.database.path, PathBuf::from("/tmp/clinic.db"));
        assert_eq!(config.ledger.void_window_hours, 48);
        assert_eq!(config.database.max_connections, 5);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: LedgerConfig = toml::from_str(
            r#"
            [ledger]
            void_window_hours = 12
            "#,
        )
        .unwrap();
        assert_eq!(config.ledger.void_window_hours, 12);
        assert_eq!(config.ledger.history_limit, 50);
        assert_eq!(config.database.max_connections, 5);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        let mut config = LedgerConfig::in_memory();
        config.ledger.history_limit = 20;
        config.save(Some(path.clone())).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[database]"));
        assert!(contents.contains("[ledger]"));

        let loaded: LedgerConfig = toml::from_str(&contents).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_in_memory_db_config() {
        let db = LedgerConfig::in_memory().db_config();
        assert!(db.is_in_memory());
        assert_eq!(db.max_connections, 1);
    }
}
