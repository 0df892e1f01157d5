use crate::blockchain::{Block, Blockchain};
use crate::config::LedgerConfig;
use crate::error::{LedgerError, Result};
use crate::state::{State, StateHash};
use crate::transaction::Transaction;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::batch::BatchId;
use super::collaborators::{BlockStore, StateStore};

/// Coordinates the begin/commit/rollback lifecycle of transaction batches.
///
/// At most one batch is active at a time. The active marker is guarded by a
/// single mutex that is held for the whole of each lifecycle operation, so
/// the "is a batch active" check and the transition happen as one step.
pub struct Ledger {
    block_store: Box<dyn BlockStore>,
    state_store: Box<dyn StateStore>,
    proposer_id: String,
    active_batch: Mutex<Option<BatchId>>,
}

impl Ledger {
    pub fn new(block_store: Box<dyn BlockStore>, state_store: Box<dyn StateStore>) -> Self {
        Ledger {
            block_store,
            state_store,
            proposer_id: LedgerConfig::default().ledger.proposer_id,
            active_batch: Mutex::new(None),
        }
    }

    pub fn with_proposer(mut self, proposer_id: impl Into<String>) -> Self {
        self.proposer_id = proposer_id.into();
        self
    }

    /// Build a ledger over the backend named by `config`: the block store and
    /// the committed state are both loaded from the same persistence.
    pub fn open(config: &LedgerConfig) -> Result<Self> {
        let init_err = |e: LedgerError| LedgerError::Initialization(e.to_string());

        config.validate().map_err(init_err)?;
        let persistence = Blockchain::open_persistence(config).map_err(init_err)?;
        let state = State::from_persistence(persistence.as_ref()).map_err(init_err)?;
        let blockchain = Blockchain::new_with_persistence(
            persistence,
            config.ledger.block_cache_size,
            config.ledger.max_block_transactions,
        )
        .map_err(init_err)?;

        info!(
            height = blockchain.height(),
            state_keys = state.len(),
            in_memory = config.database.in_memory,
            "Ledger opened"
        );

        Ok(Ledger::new(Box::new(blockchain), Box::new(state)).with_proposer(config.ledger.proposer_id.clone()))
    }

    /// Start a new batch. Fails if another batch is in progress.
    pub fn begin_tx_batch(&self, id: impl Into<BatchId>) -> Result<()> {
        let id = id.into();
        if id.is_empty() {
            return Err(LedgerError::InvalidBatchId("batch id must not be empty".to_string()));
        }

        let mut active = self.active_batch.lock();
        check_idle(&active)?;
        debug!(batch = %id, "Batch begun");
        *active = Some(id);
        Ok(())
    }

    /// Commit the active batch as a new block carrying `transactions`,
    /// `proof` and the state changes made during the batch.
    ///
    /// Returns the height of the appended block once it is durable. If the
    /// append fails the batch stays active and its state changes are kept,
    /// so the caller may retry or roll back.
    pub fn commit_tx_batch(
        &self,
        id: impl Into<BatchId>,
        transactions: Vec<Transaction>,
        proof: Vec<u8>,
    ) -> Result<u64> {
        let id = id.into();
        let mut active = self.active_batch.lock();
        check_active(&active, &id)?;

        let tx_count = transactions.len();
        let state_hash = self
            .state_store
            .get_temp_state_hash()
            .map_err(|e| LedgerError::StateHash(e.to_string()))?;
        let block: Block = self
            .block_store
            .new_block(&self.proposer_id, transactions)
            .with_proof(proof)
            .with_state_hash(state_hash);
        let delta = self.state_store.state_delta();

        let height = self
            .block_store
            .add_block(block, &delta)
            .map_err(|e| LedgerError::Commit {
                batch: id.clone(),
                reason: e.to_string(),
            })?;

        self.reset_for_next_batch(&mut active, true);
        info!(batch = %id, height, transactions = tx_count, "Batch committed");
        Ok(height)
    }

    /// Discard every state change made during the active batch. No block is
    /// produced.
    pub fn rollback_tx_batch(&self, id: impl Into<BatchId>) -> Result<()> {
        let id = id.into();
        let mut active = self.active_batch.lock();
        check_active(&active, &id)?;

        self.reset_for_next_batch(&mut active, false);
        info!(batch = %id, "Batch rolled back");
        Ok(())
    }

    /// State hash including changes made so far in the current batch.
    pub fn get_temp_state_hash(&self) -> Result<StateHash> {
        self.state_store
            .get_temp_state_hash()
            .map_err(|e| LedgerError::StateHash(e.to_string()))
    }

    /// State hash over committed state only.
    pub fn get_state_hash(&self) -> Result<StateHash> {
        self.state_store
            .get_state_hash()
            .map_err(|e| LedgerError::StateHash(e.to_string()))
    }

    pub fn get_state(&self, key: &str, committed: bool) -> Result<Option<Vec<u8>>> {
        self.state_store.get_state(key, committed)
    }

    /// Write `key` into the current batch's overlay.
    pub fn set_state(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let active = self.active_batch.lock();
        require_batch(&active)?;
        self.state_store.set_state(key, value)
    }

    /// Delete `key` within the current batch's overlay.
    pub fn delete_state(&self, key: &str) -> Result<()> {
        let active = self.active_batch.lock();
        require_batch(&active)?;
        self.state_store.delete_state(key)
    }

    pub fn active_batch(&self) -> Option<BatchId> {
        self.active_batch.lock().clone()
    }

    pub fn is_batch_active(&self) -> bool {
        self.active_batch.lock().is_some()
    }

    pub fn proposer_id(&self) -> &str {
        &self.proposer_id
    }

    pub fn blockchain_height(&self) -> u64 {
        self.block_store.height()
    }

    pub fn get_block(&self, height: u64) -> Result<Option<Block>> {
        self.block_store.get_block(height)
    }

    // The marker and the overlay are reset together under the batch lock.
    fn reset_for_next_batch(&self, active: &mut Option<BatchId>, changes_persisted: bool) {
        *active = None;
        self.state_store.clear_in_memory_changes(changes_persisted);
    }
}

fn check_idle(active: &Option<BatchId>) -> Result<()> {
    match active {
        Some(current) => Err(LedgerError::BatchConflict(format!(
            "Another TxBatch [{}] already in-progress",
            current
        ))),
        None => Ok(()),
    }
}

fn require_batch(active: &Option<BatchId>) -> Result<()> {
    match active {
        Some(_) => Ok(()),
        None => Err(LedgerError::BatchConflict("No TxBatch in-progress".to_string())),
    }
}

fn check_active(active: &Option<BatchId>, id: &BatchId) -> Result<()> {
    match active {
        None => Err(LedgerError::BatchConflict(format!(
            "No TxBatch in-progress, cannot complete [{}]",
            id
        ))),
        Some(current) => {
            // Only one batch can be active, so the id is not required to match.
            if current != id {
                warn!(active = %current, requested = %id, "Completing TxBatch under a different id");
            }
            Ok(())
        }
    }
}
