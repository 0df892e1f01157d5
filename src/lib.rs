//! OpenLedger - a transaction-batch ledger over an append-only block store
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Batch Lifecycle
//! - [`ledger`] - Batch coordinator, process-wide accessor and collaborator traits
//!
//! ## Block Store
//! - [`blockchain`] - Block structure, validation and the append-only chain
//! - [`transaction`] - Transaction records
//! - [`cache`] - Recent block cache
//!
//! ## State Management
//! - [`state`] - World state with the uncommitted batch overlay
//! - [`persistence`] - Database layer (SQLite) and in-memory backend
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Batch Lifecycle
// ============================================================================
pub mod ledger;

// ============================================================================
// Block Store
// ============================================================================
pub mod blockchain;
pub mod cache;
pub mod transaction;

// ============================================================================
// State Management
// ============================================================================
pub mod persistence;
pub mod state;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;

pub use error::{LedgerError, Result};
pub use ledger::{get_ledger, get_ledger_with_config, BatchId, Ledger};
