use crate::error::LedgerError;
use crate::transaction::types::{Transaction, MAX_TRANSACTION_SIZE};

impl Transaction {
    /// Validate transaction size to prevent DoS attacks
    pub fn validate_size(&self) -> Result<(), LedgerError> {
        let serialized = bincode::serialize(self)
            .map_err(|e| LedgerError::InvalidTransaction(format!("Serialization failed: {}", e)))?;

        if serialized.len() > MAX_TRANSACTION_SIZE {
            return Err(LedgerError::InvalidTransaction(format!(
                "Transaction {} too large: {} bytes (max: {})",
                self.txid,
                serialized.len(),
                MAX_TRANSACTION_SIZE
            )));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.txid.is_empty() {
            return Err(LedgerError::InvalidTransaction("Transaction id must not be empty".to_string()));
        }
        self.validate_size()
    }
}
