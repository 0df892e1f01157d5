//! Configuration management for OpenLedger

use crate::error::LedgerError;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Environment variable naming an alternative config file.
pub const CONFIG_ENV_VAR: &str = "OPENLEDGER_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "ledger.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub ledger: LedgerSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
    #[serde(default)]
    pub in_memory: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            in_memory: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerSection {
    #[serde(default = "default_proposer_id")]
    pub proposer_id: String,
    #[serde(default = "default_block_cache_size")]
    pub block_cache_size: usize,
    #[serde(default = "default_max_block_transactions")]
    pub max_block_transactions: usize,
}

impl Default for LedgerSection {
    fn default() -> Self {
        Self {
            proposer_id: default_proposer_id(),
            block_cache_size: default_block_cache_size(),
            max_block_transactions: default_max_block_transactions(),
        }
    }
}

impl LedgerConfig {
    /// Config with an in-memory backend and default ledger settings.
    pub fn in_memory() -> Self {
        Self {
            database: DatabaseConfig {
                in_memory: true,
                ..DatabaseConfig::default()
            },
            ledger: LedgerSection::default(),
        }
    }

    pub fn with_database_path(path: impl Into<String>) -> Self {
        Self {
            database: DatabaseConfig {
                path: path.into(),
                in_memory: false,
            },
            ledger: LedgerSection::default(),
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self, LedgerError> {
        let config: LedgerConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read config from `path`. A missing file yields the defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref();
        if !path.exists() {
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }
        let config_str = fs::read_to_string(path)?;
        Self::from_toml_str(&config_str)
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        if !self.database.in_memory && self.database.path.is_empty() {
            return Err(LedgerError::Config("database.path must be set when database.in_memory is false".to_string()));
        }
        if self.ledger.block_cache_size == 0 {
            return Err(LedgerError::Config("ledger.block_cache_size must be greater than zero".to_string()));
        }
        if self.ledger.max_block_transactions == 0 {
            return Err(LedgerError::Config("ledger.max_block_transactions must be greater than zero".to_string()));
        }
        Ok(())
    }
}

/// Load config from `$OPENLEDGER_CONFIG`, or `ledger.toml` in the working
/// directory, falling back to defaults when the file is absent.
pub fn load_config() -> Result<LedgerConfig, LedgerError> {
    let path = std::env::var(CONFIG_ENV_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    LedgerConfig::from_file(path)
}

fn default_db_path() -> String {
    "./data/ledger.db".to_string()
}

fn default_proposer_id() -> String {
    "proposerID".to_string()
}

fn default_block_cache_size() -> usize {
    100
}

fn default_max_block_transactions() -> usize {
    10_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_sections_missing() {
        let config = LedgerConfig::from_toml_str("").unwrap();
        assert_eq!(config.database.path, "./data/ledger.db");
        assert!(!config.database.in_memory);
        assert_eq!(config.ledger.proposer_id, "proposerID");
        assert_eq!(config.ledger.block_cache_size, 100);
    }

    #[test]
    fn test_parse_full_config() {
        let config = LedgerConfig::from_toml_str(
            r#"
            [database]
            path = "/var/lib/ledger.db"

            [ledger]
            proposer_id = "peer-7"
            block_cache_size = 8
            max_block_transactions = 50
            "#,
        )
        .unwrap();
        assert_eq!(config.database.path, "/var/lib/ledger.db");
        assert_eq!(config.ledger.proposer_id, "peer-7");
        assert_eq!(config.ledger.block_cache_size, 8);
        assert_eq!(config.ledger.max_block_transactions, 50);
    }

    #[test]
    fn test_validation_rejects_empty_path() {
        let result = LedgerConfig::from_toml_str("[database]\npath = \"\"\n");
        assert!(matches!(result, Err(LedgerError::Config(_))));

        let in_memory = LedgerConfig::from_toml_str("[database]\npath = \"\"\nin_memory = true\n");
        assert!(in_memory.is_ok());
    }

    #[test]
    fn test_validation_rejects_zero_limits() {
        let result = LedgerConfig::from_toml_str("[ledger]\nblock_cache_size = 0\n");
        assert!(matches!(result, Err(LedgerError::Config(_))));
        let result = LedgerConfig::from_toml_str("[ledger]\nmax_block_transactions = 0\n");
        assert!(matches!(result, Err(LedgerError::Config(_))));
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        assert!(matches!(LedgerConfig::from_toml_str("[database"), Err(LedgerError::Config(_))));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = LedgerConfig::from_file(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.ledger.block_cache_size, 100);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("ledger.toml");
        fs::write(&path, "[database]\nin_memory = true\n").unwrap();
        let config = LedgerConfig::from_file(&path).unwrap();
        assert!(config.database.in_memory);
    }

    #[test]
    fn test_load_config_reads_env_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(&path, "[ledger]\nproposer_id = \"peer-env\"\nblock_cache_size = 3\n").unwrap();

        std::env::set_var(CONFIG_ENV_VAR, &path);
        let loaded = load_config();
        std::env::remove_var(CONFIG_ENV_VAR);

        let config = loaded.unwrap();
        assert_eq!(config.ledger.proposer_id, "peer-env");
        assert_eq!(config.ledger.block_cache_size, 3);
    }
}
