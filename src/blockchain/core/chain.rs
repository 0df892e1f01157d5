use crate::cache::BlockCache;
use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::ledger::BlockStore;
use crate::persistence::{Database, InMemoryPersistence, Persistence};
use crate::state::StateDelta;
use crate::transaction::Transaction;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::validation::validate_block;

pub type Sha256Hash = [u8; 32];

pub const ZERO_HASH: Sha256Hash = [0u8; 32];

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BlockHeader {
    pub height: u64,
    pub timestamp: u64,
    pub previous_hash: Sha256Hash,
    pub transactions_root: Sha256Hash,
    pub state_hash: Sha256Hash,
    pub proposer: String,
}

impl BlockHeader {
    pub fn hash(&self) -> Sha256Hash {
        let mut hasher = Sha256::new();
        hasher.update(self.height.to_le_bytes());
        hasher.update(self.timestamp.to_le_bytes());
        hasher.update(self.previous_hash);
        hasher.update(self.transactions_root);
        hasher.update(self.state_hash);
        hasher.update((self.proposer.len() as u64).to_le_bytes());
        hasher.update(self.proposer.as_bytes());
        hasher.finalize().into()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
    /// Consensus evidence attached at commit time; not covered by the header hash.
    #[serde(with = "serde_bytes")]
    pub proof: Vec<u8>,
}

impl Block {
    /// Build an unlinked block. Height and previous hash are assigned when
    /// the block is appended to a chain.
    pub fn new(proposer: &str, transactions: Vec<Transaction>) -> Self {
        let timestamp = u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0);
        let transactions_root = Block::calculate_transactions_root(&transactions);

        Block {
            header: BlockHeader {
                height: 0,
                timestamp,
                previous_hash: ZERO_HASH,
                transactions_root,
                state_hash: ZERO_HASH,
                proposer: proposer.to_string(),
            },
            transactions,
            proof: Vec::new(),
        }
    }

    pub fn with_proof(mut self, proof: Vec<u8>) -> Self {
        self.proof = proof;
        self
    }

    pub fn with_state_hash(mut self, state_hash: Sha256Hash) -> Self {
        self.header.state_hash = state_hash;
        self
    }

    pub fn hash(&self) -> Sha256Hash {
        self.header.hash()
    }

    pub fn calculate_transactions_root(transactions: &[Transaction]) -> Sha256Hash {
        let mut hasher = Sha256::new();
        for tx in transactions {
            hasher.update(tx.hash());
        }
        hasher.finalize().into()
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct ChainTip {
    /// Number of blocks in the chain, which is also the next block's height.
    height: u64,
    last_hash: Option<Sha256Hash>,
}

pub const DEFAULT_MAX_BLOCK_TRANSACTIONS: usize = 10_000;

/// Append-only chain of blocks over a persistence backend.
pub struct Blockchain {
    persistence: Box<dyn Persistence>,
    tip: Mutex<ChainTip>,
    cache: BlockCache,
    max_block_transactions: usize,
}

impl Blockchain {
    /// Create a new `Blockchain` using an in-memory persistence backend.
    pub fn new() -> Result<Self, LedgerError> {
        Self::new_with_persistence(
            Box::new(InMemoryPersistence::new()),
            BlockCache::DEFAULT_CAPACITY,
            DEFAULT_MAX_BLOCK_TRANSACTIONS,
        )
    }

    /// Create a `Blockchain` with the provided persistence backend, resuming
    /// from the last stored block.
    pub fn new_with_persistence(
        persistence: Box<dyn Persistence>,
        cache_capacity: usize,
        max_block_transactions: usize,
    ) -> Result<Self, LedgerError> {
        let tip = match persistence.load_last_block()? {
            Some(last) => ChainTip {
                height: last.header.height + 1,
                last_hash: Some(last.hash()),
            },
            None => ChainTip::default(),
        };

        Ok(Blockchain {
            persistence,
            tip: Mutex::new(tip),
            cache: BlockCache::new(cache_capacity),
            max_block_transactions,
        })
    }

    /// Open the persistence backend named by the config.
    pub fn open_persistence(config: &LedgerConfig) -> Result<Box<dyn Persistence>, LedgerError> {
        if config.database.in_memory {
            return Ok(Box::new(InMemoryPersistence::new()));
        }
        Ok(Box::new(Database::open(&config.database.path)?))
    }

    pub fn height(&self) -> u64 {
        self.tip.lock().height
    }

    /// Link `block` to the current tip, validate it and persist it together
    /// with `delta`. Returns the height assigned to the block. The tip only
    /// advances once the backend has committed the write.
    pub fn add_block(&self, mut block: Block, delta: &StateDelta) -> Result<u64, LedgerError> {
        let mut tip = self.tip.lock();

        block.header.height = tip.height;
        block.header.previous_hash = tip.last_hash.unwrap_or(ZERO_HASH);

        validate_block(&block, self.max_block_transactions)?;

        self.persistence.save_block_with_state(&block, delta)?;

        let height = block.header.height;
        let hash = block.hash();
        tip.height = height + 1;
        tip.last_hash = Some(hash);
        self.cache.put(height, block);

        info!(height, hash = %hex::encode(hash), state_changes = delta.len(), "Block appended");
        Ok(height)
    }

    pub fn get_block(&self, height: u64) -> Result<Option<Block>, LedgerError> {
        if let Some(block) = self.cache.get(&height) {
            return Ok(Some(block));
        }
        debug!(height, cached = self.cache.len(), capacity = self.cache.capacity(), "Block cache miss");
        let block = self.persistence.load_block(height)?;
        if let Some(ref b) = block {
            self.cache.put(height, b.clone());
        }
        Ok(block)
    }
}

impl BlockStore for Blockchain {
    fn new_block(&self, proposer: &str, transactions: Vec<Transaction>) -> Block {
        Block::new(proposer, transactions)
    }

    fn add_block(&self, block: Block, delta: &StateDelta) -> Result<u64, LedgerError> {
        Blockchain::add_block(self, block, delta)
    }

    fn height(&self) -> u64 {
        Blockchain::height(self)
    }

    fn get_block(&self, height: u64) -> Result<Option<Block>, LedgerError> {
        Blockchain::get_block(self, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(id: &str) -> Transaction {
        Transaction::new(id, id.as_bytes().to_vec())
    }

    #[test]
    fn test_new_block_is_unlinked() {
        let block = Block::new("peer", vec![tx("a"), tx("b")]);
        assert_eq!(block.header.height, 0);
        assert_eq!(block.header.previous_hash, ZERO_HASH);
        assert_eq!(
            block.header.transactions_root,
            Block::calculate_transactions_root(&block.transactions)
        );
        assert!(block.proof.is_empty());
    }

    #[test]
    fn test_new_block_timestamp_is_current_millis() {
        let before = chrono::Utc::now().timestamp_millis();
        let block = Block::new("peer", vec![]);
        let after = chrono::Utc::now().timestamp_millis();

        let stamp = block.header.timestamp as i64;
        assert!(before > 0);
        assert!(stamp >= before && stamp <= after);
    }

    #[test]
    fn test_proof_not_in_header_hash() {
        let block = Block::new("peer", vec![tx("a")]);
        let with_proof = block.clone().with_proof(b"sig".to_vec());
        assert_eq!(block.hash(), with_proof.hash());

        let with_state = block.clone().with_state_hash([7u8; 32]);
        assert_ne!(block.hash(), with_state.hash());
    }

    #[test]
    fn test_add_block_links_to_tip() {
        let chain = Blockchain::new().unwrap();
        assert_eq!(chain.height(), 0);

        let first = chain.add_block(Block::new("peer", vec![tx("a")]), &StateDelta::new()).unwrap();
        let second = chain.add_block(Block::new("peer", vec![tx("b")]), &StateDelta::new()).unwrap();
        assert_eq!((first, second), (0, 1));
        assert_eq!(chain.height(), 2);

        let b0 = chain.get_block(0).unwrap().unwrap();
        let b1 = chain.get_block(1).unwrap().unwrap();
        assert_eq!(b0.header.previous_hash, ZERO_HASH);
        assert_eq!(b1.header.previous_hash, b0.hash());
        assert_eq!(chain.tip.lock().last_hash, Some(b1.hash()));
    }

    #[test]
    fn test_invalid_block_does_not_advance_tip() {
        let chain = Blockchain::new().unwrap();
        let result = chain.add_block(Block::new("peer", vec![tx("dup"), tx("dup")]), &StateDelta::new());
        assert!(matches!(result, Err(LedgerError::InvalidTransaction(_))));
        assert_eq!(chain.height(), 0);
        assert!(chain.get_block(0).unwrap().is_none());
    }

    #[test]
    fn test_resume_from_persistence() {
        let persistence = InMemoryPersistence::new();
        let chain = Blockchain::new_with_persistence(Box::new(persistence.clone()), 4, 10).unwrap();
        chain.add_block(Block::new("peer", vec![tx("a")]), &StateDelta::new()).unwrap();
        let tip_hash = chain.tip.lock().last_hash;
        drop(chain);

        let reopened = Blockchain::new_with_persistence(Box::new(persistence), 4, 10).unwrap();
        assert_eq!(reopened.height(), 1);
        assert_eq!(reopened.tip.lock().last_hash, tip_hash);
        assert!(reopened.get_block(0).unwrap().is_some());
    }
}
