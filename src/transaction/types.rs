/// Transaction record carried by OpenLedger blocks
use crate::blockchain::Sha256Hash;
use sha2::{Digest, Sha256};

/// Maximum transaction size in bytes (100KB) to prevent DoS
pub const MAX_TRANSACTION_SIZE: usize = 100_000;

/// A transaction executed inside a batch and recorded in a block.
///
/// The ledger never interprets `payload`; it is hashed into the block's
/// transactions root and stored verbatim.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Transaction {
    pub txid: String,
    #[serde(with = "serde_bytes")]
    pub payload: Vec<u8>,
    pub timestamp: i64,
}

impl Transaction {
    pub fn new(txid: impl Into<String>, payload: Vec<u8>) -> Self {
        Transaction {
            txid: txid.into(),
            payload,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Calculate the hash of this transaction
    pub fn hash(&self) -> Sha256Hash {
        let mut hasher = Sha256::new();
        hasher.update((self.txid.len() as u64).to_le_bytes());
        hasher.update(self.txid.as_bytes());
        hasher.update((self.payload.len() as u64).to_le_bytes());
        hasher.update(&self.payload);
        hasher.update(self.timestamp.to_le_bytes());
        hasher.finalize().into()
    }

    pub fn hash_str(&self) -> String {
        hex::encode(self.hash())
    }
}
