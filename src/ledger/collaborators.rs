//! Interfaces the ledger consumes from its block store and world state.

use crate::blockchain::Block;
use crate::error::LedgerError;
use crate::state::{StateDelta, StateHash};
use crate::transaction::Transaction;

pub trait BlockStore: Send + Sync {
    /// Pure construction; the block is linked to the chain by `add_block`.
    fn new_block(&self, proposer: &str, transactions: Vec<Transaction>) -> Block;

    /// Durably append `block` together with the state changes it commits.
    /// Returns only after both are persisted, yielding the block height.
    fn add_block(&self, block: Block, delta: &StateDelta) -> Result<u64, LedgerError>;

    fn height(&self) -> u64;

    fn get_block(&self, height: u64) -> Result<Option<Block>, LedgerError>;
}

pub trait StateStore: Send + Sync {
    fn get_state(&self, key: &str, committed: bool) -> Result<Option<Vec<u8>>, LedgerError>;

    fn set_state(&self, key: &str, value: Vec<u8>) -> Result<(), LedgerError>;

    fn delete_state(&self, key: &str) -> Result<(), LedgerError>;

    fn get_state_hash(&self) -> Result<StateHash, LedgerError>;

    /// Hash over committed state with the uncommitted overlay applied.
    fn get_temp_state_hash(&self) -> Result<StateHash, LedgerError>;

    fn state_delta(&self) -> StateDelta;

    /// Discard the overlay. Idempotent.
    fn clear_in_memory_changes(&self, changes_persisted: bool);
}
