//! Error types for OpenLedger

use crate::ledger::BatchId;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("Ledger initialization failed: {0}")]
    Initialization(String),
    #[error("Batch conflict: {0}")]
    BatchConflict(String),
    #[error("Invalid batch id: {0}")]
    InvalidBatchId(String),
    #[error("Failed to commit batch [{batch}]: {reason}")]
    Commit { batch: BatchId, reason: String },
    #[error("State hash error: {0}")]
    StateHash(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Invalid block: {0}")]
    InvalidBlock(String),
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::Io(err.to_string())
    }
}

impl From<Box<bincode::ErrorKind>> for LedgerError {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for LedgerError {
    fn from(err: toml::de::Error) -> Self {
        LedgerError::Config(err.to_string())
    }
}

impl From<rusqlite::Error> for LedgerError {
    fn from(err: rusqlite::Error) -> Self {
        LedgerError::Database(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, LedgerError>;
