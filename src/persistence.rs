//! Database persistence layer for OpenLedger

use crate::blockchain::{Block, BlockHeader};
use crate::error::LedgerError;
use crate::state::StateDelta;
use crate::transaction::Transaction;
use rusqlite::{params, Connection};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Abstraction for persistence backends. `save_block_with_state` must be
/// atomic: either the block and its state delta are both durable, or neither.
pub trait Persistence: Send + Sync {
    fn save_block_with_state(&self, block: &Block, delta: &StateDelta) -> Result<(), LedgerError>;
    fn load_block(&self, height: u64) -> Result<Option<Block>, LedgerError>;
    fn load_last_block(&self) -> Result<Option<Block>, LedgerError>;
    fn load_state(&self) -> Result<BTreeMap<String, Vec<u8>>, LedgerError>;
}

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &str) -> Result<Self, LedgerError> {
        let conn = Connection::open(path)
            .map_err(|e| LedgerError::Database(format!("Failed to open database: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS blocks (
                height INTEGER PRIMARY KEY,
                hash BLOB NOT NULL,
                previous_hash BLOB NOT NULL,
                timestamp INTEGER NOT NULL,
                proposer TEXT NOT NULL,
                transactions_root BLOB NOT NULL,
                state_hash BLOB NOT NULL,
                proof BLOB NOT NULL,
                transactions TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| LedgerError::Database(format!("Failed to create blocks table: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS state (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL
            )",
            [],
        )
        .map_err(|e| LedgerError::Database(format!("Failed to create state table: {}", e)))?;

        Ok(Database { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, LedgerError> {
        self.conn.lock().map_err(|_| LedgerError::Database("Mutex poisoned".to_string()))
    }

    /// Atomically saves a block, the state changes it commits and the chain
    /// height. All writes share one SQL transaction.
    pub fn save_block_with_state(&self, block: &Block, delta: &StateDelta) -> Result<(), LedgerError> {
        let transactions_json = serde_json::to_string(&block.transactions).map_err(|e| {
            LedgerError::Database(format!("Failed to serialize transactions: {}", e))
        })?;

        let conn_guard = self.lock()?;
        let tx = conn_guard.unchecked_transaction().map_err(|e| {
            LedgerError::Database(format!("Failed to start transaction: {}", e))
        })?;

        tx.execute(
            "INSERT INTO blocks (height, hash, previous_hash, timestamp, proposer, transactions_root, state_hash, proof, transactions)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                block.header.height as i64,
                block.hash().to_vec(),
                block.header.previous_hash.to_vec(),
                block.header.timestamp as i64,
                block.header.proposer,
                block.header.transactions_root.to_vec(),
                block.header.state_hash.to_vec(),
                block.proof,
                transactions_json,
            ],
        ).map_err(|e| LedgerError::Database(format!("Failed to save block: {}", e)))?;

        for (key, value) in delta.iter() {
            let written = match value {
                Some(v) => tx.execute(
                    "INSERT OR REPLACE INTO state (key, value) VALUES (?1, ?2)",
                    params![key, v],
                ),
                None => tx.execute("DELETE FROM state WHERE key = ?1", params![key]),
            };
            written.map_err(|e| LedgerError::Database(format!("Failed to save state key {}: {}", key, e)))?;
        }

        tx.commit().map_err(|e| {
            LedgerError::Database(format!("Failed to commit transaction: {}", e))
        })?;

        Ok(())
    }

    pub fn load_block(&self, height: u64) -> Result<Option<Block>, LedgerError> {
        let mut blocks = self.query_blocks(
            "SELECT height, previous_hash, timestamp, proposer, transactions_root, state_hash, proof, transactions
             FROM blocks WHERE height = ?1",
            params![height as i64],
        )?;
        Ok(blocks.pop())
    }

    pub fn load_last_block(&self) -> Result<Option<Block>, LedgerError> {
        let mut blocks = self.query_blocks(
            "SELECT height, previous_hash, timestamp, proposer, transactions_root, state_hash, proof, transactions
             FROM blocks ORDER BY height DESC LIMIT 1",
            [],
        )?;
        Ok(blocks.pop())
    }

    fn query_blocks<P: rusqlite::Params>(&self, sql: &str, query_params: P) -> Result<Vec<Block>, LedgerError> {
        let conn_guard = self.lock()?;
        let mut stmt = conn_guard
            .prepare(sql)
            .map_err(|e| LedgerError::Database(format!("Failed to prepare query: {}", e)))?;

        let blocks_iter = stmt
            .query_map(query_params, |row| {
                let transactions_json: String = row.get(7)?;
                let transactions: Vec<Transaction> = serde_json::from_str(&transactions_json)
                    .map_err(|_e| rusqlite::Error::InvalidQuery)?;

                let height: i64 = row.get(0)?;
                let timestamp: i64 = row.get(2)?;
                let proposer: String = row.get(3)?;
                let proof: Vec<u8> = row.get(6)?;

                Ok(Block {
                    header: BlockHeader {
                        height: height as u64,
                        timestamp: timestamp as u64,
                        previous_hash: hash_from_row(row, 1)?,
                        transactions_root: hash_from_row(row, 4)?,
                        state_hash: hash_from_row(row, 5)?,
                        proposer,
                    },
                    transactions,
                    proof,
                })
            })
            .map_err(|e| LedgerError::Database(format!("Failed to query blocks: {}", e)))?;

        let mut blocks = Vec::new();
        for block_result in blocks_iter {
            blocks.push(
                block_result.map_err(|e| LedgerError::Database(format!("Failed to load block: {}", e)))?,
            );
        }
        Ok(blocks)
    }

    pub fn load_state(&self) -> Result<BTreeMap<String, Vec<u8>>, LedgerError> {
        let conn_guard = self.lock()?;
        let mut stmt = conn_guard
            .prepare("SELECT key, value FROM state")
            .map_err(|e| LedgerError::Database(format!("Failed to prepare state query: {}", e)))?;

        let rows = stmt
            .query_map([], |row| {
                let key: String = row.get(0)?;
                let value: Vec<u8> = row.get(1)?;
                Ok((key, value))
            })
            .map_err(|e| LedgerError::Database(format!("Failed to query state: {}", e)))?;

        let mut state = BTreeMap::new();
        for row_result in rows {
            let (key, value) = row_result
                .map_err(|e| LedgerError::Database(format!("Failed to read row: {}", e)))?;
            state.insert(key, value);
        }
        Ok(state)
    }
}

fn hash_from_row(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<[u8; 32]> {
    let bytes: Vec<u8> = row.get(idx)?;
    bytes.try_into().map_err(|_| rusqlite::Error::InvalidColumnType(
        idx,
        "hash".to_string(),
        rusqlite::types::Type::Blob,
    ))
}

// Implement the Persistence trait for the rusqlite-backed Database
impl Persistence for Database {
    fn save_block_with_state(&self, block: &Block, delta: &StateDelta) -> Result<(), LedgerError> {
        Database::save_block_with_state(self, block, delta)
    }

    fn load_block(&self, height: u64) -> Result<Option<Block>, LedgerError> {
        Database::load_block(self, height)
    }

    fn load_last_block(&self) -> Result<Option<Block>, LedgerError> {
        Database::load_last_block(self)
    }

    fn load_state(&self) -> Result<BTreeMap<String, Vec<u8>>, LedgerError> {
        Database::load_state(self)
    }
}

/// Simple in-memory persistence implementation useful for tests and ephemeral runs.
/// Clones share the same storage.
#[derive(Clone, Default)]
pub struct InMemoryPersistence {
    pub blocks: Arc<Mutex<Vec<Block>>>,
    pub state: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> LedgerError {
    LedgerError::Database("Mutex poisoned".to_string())
}

impl Persistence for InMemoryPersistence {
    fn save_block_with_state(&self, block: &Block, delta: &StateDelta) -> Result<(), LedgerError> {
        let mut blocks = self.blocks.lock().map_err(poisoned)?;
        let mut state = self.state.lock().map_err(poisoned)?;

        if blocks.iter().any(|b| b.header.height == block.header.height) {
            return Err(LedgerError::Database(format!(
                "Block at height {} already exists",
                block.header.height
            )));
        }

        blocks.push(block.clone());
        delta.apply_to(&mut state);
        Ok(())
    }

    fn load_block(&self, height: u64) -> Result<Option<Block>, LedgerError> {
        let blocks = self.blocks.lock().map_err(poisoned)?;
        Ok(blocks.iter().find(|b| b.header.height == height).cloned())
    }

    fn load_last_block(&self) -> Result<Option<Block>, LedgerError> {
        let blocks = self.blocks.lock().map_err(poisoned)?;
        Ok(blocks.iter().max_by_key(|b| b.header.height).cloned())
    }

    fn load_state(&self) -> Result<BTreeMap<String, Vec<u8>>, LedgerError> {
        let state = self.state.lock().map_err(poisoned)?;
        Ok(state.clone())
    }
}
