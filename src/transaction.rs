//! Transaction module split into types and validation for better modularity

pub mod types;
pub mod validation;

pub use types::*;
// validation module kept internal; only types are re-exported publicly

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;

    #[test]
    fn test_hash_is_stable_and_content_sensitive() {
        let tx = Transaction {
            txid: "tx-1".to_string(),
            payload: b"transfer 10".to_vec(),
            timestamp: 1_700_000_000_000,
        };
        assert_eq!(tx.hash(), tx.clone().hash());

        let mut other = tx.clone();
        other.payload = b"transfer 11".to_vec();
        assert_ne!(tx.hash(), other.hash());
        assert_eq!(tx.hash_str().len(), 64);
    }

    #[test]
    fn test_hash_separates_fields() {
        let a = Transaction { txid: "ab".to_string(), payload: b"c".to_vec(), timestamp: 0 };
        let b = Transaction { txid: "a".to_string(), payload: b"bc".to_vec(), timestamp: 0 };
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn test_validate_empty_txid_fails() {
        let tx = Transaction::new("", vec![1, 2, 3]);
        assert!(matches!(tx.validate(), Err(LedgerError::InvalidTransaction(_))));
    }

    #[test]
    fn test_oversized_transaction_fails() {
        let tx = Transaction::new("big", vec![0u8; MAX_TRANSACTION_SIZE + 1]);
        assert!(matches!(tx.validate_size(), Err(LedgerError::InvalidTransaction(_))));
    }

    #[test]
    fn test_regular_transaction_is_valid() {
        let tx = Transaction::new("tx-ok", b"payload".to_vec());
        assert!(tx.validate().is_ok());
    }
}
