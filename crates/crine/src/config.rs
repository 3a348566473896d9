//! Configuration management for crine.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "crine";

/// Default database file name for the local store.
const DATABASE_FILE_NAME: &str = "documents.db";

/// Customer quota applied when a profile does not set `maxCustomers`.
pub const DEFAULT_MAX_CUSTOMERS: u64 = 10;

/// Number of backup history entries returned when no limit is given.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `CRINE_`, sections split on `__`)
/// 2. TOML config file at `~/.config/crine/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend configuration.
    pub backend: BackendConfig,
    /// Customer quota configuration.
    pub quota: QuotaConfig,
    /// Backup history configuration.
    pub history: HistoryConfig,
}

/// Backend-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Identifier of the backend project.
    pub project_id: String,
    /// Path to the local document store.
    /// Defaults to `~/.local/share/crine/documents.db`
    pub database_path: Option<PathBuf>,
}

/// Quota-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    /// Customer limit for users whose profile sets none.
    pub default_max_customers: u64,
}

/// Backup-history-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Entries returned by a history listing without an explicit limit.
    pub default_limit: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            project_id: "crine-free".to_string(),
            database_path: None, // Resolved to the data directory at runtime
        }
    }
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            default_max_customers: DEFAULT_MAX_CUSTOMERS,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("CRINE_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.backend.project_id.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "backend.project_id cannot be empty".to_string(),
            });
        }

        if self.quota.default_max_customers == 0 {
            return Err(Error::ConfigValidation {
                message: "quota.default_max_customers must be greater than 0".to_string(),
            });
        }

        if self.history.default_limit == 0 {
            return Err(Error::ConfigValidation {
                message: "history.default_limit must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.backend
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.backend.project_id, "crine-free");
        assert!(config.backend.database_path.is_none());
        assert_eq!(config.quota.default_max_customers, 10);
        assert_eq!(config.history.default_limit, 10);
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_empty_project_id() {
        let mut config = Config::default();
        config.backend.project_id = "  ".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("project_id"));
    }

    #[test]
    fn test_validate_zero_quota() {
        let mut config = Config::default();
        config.quota.default_max_customers = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("default_max_customers"));
    }

    #[test]
    fn test_validate_zero_history_limit() {
        let mut config = Config::default();
        config.history.default_limit = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("default_limit"));
    }

    #[test]
    fn test_database_path_default() {
        let path = Config::default().database_path();
        assert!(path.to_string_lossy().contains("documents.db"));
        assert!(path.to_string_lossy().contains("crine"));
    }

    #[test]
    fn test_database_path_custom() {
        let mut config = Config::default();
        config.backend.database_path = Some(PathBuf::from("/custom/path/db.sqlite"));

        assert_eq!(
            config.database_path(),
            PathBuf::from("/custom/path/db.sqlite")
        );
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("crine"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        figment::Jail::expect_with(|_jail| {
            let config = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml")))
                .map_err(|e| e.to_string())?;
            assert_eq!(config, Config::default());
            Ok(())
        });
    }

    #[test]
    fn test_load_toml_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "crine.toml",
                r#"
                [backend]
                project_id = "salon-test"

                [quota]
                default_max_customers = 50
                "#,
            )?;

            let config = Config::load_from(Some(PathBuf::from("crine.toml")))
                .map_err(|e| e.to_string())?;
            assert_eq!(config.backend.project_id, "salon-test");
            assert_eq!(config.quota.default_max_customers, 50);
            assert_eq!(config.history.default_limit, 10);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("crine.toml", "[history]\ndefault_limit = 5\n")?;
            jail.set_env("CRINE_HISTORY__DEFAULT_LIMIT", "20");

            let config = Config::load_from(Some(PathBuf::from("crine.toml")))
                .map_err(|e| e.to_string())?;
            assert_eq!(config.history.default_limit, 20);
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("crine.toml", "[quota]\ndefault_max_customers = 0\n")?;

            let result = Config::load_from(Some(PathBuf::from("crine.toml")));
            assert!(matches!(result, Err(Error::ConfigValidation { .. })));
            Ok(())
        });
    }

    #[test]
    fn test_config_serialize() {
        let json = serde_json::to_string(&Config::default()).unwrap();
        assert!(json.contains("default_max_customers"));
        assert!(json.contains("project_id"));
    }
}
