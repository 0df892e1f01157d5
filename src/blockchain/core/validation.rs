use crate::error::LedgerError;

use super::chain::Block;

pub fn validate_no_duplicate_transactions(block: &Block) -> Result<(), LedgerError> {
    let mut seen_ids = std::collections::HashMap::new();
    for (index, tx) in block.transactions.iter().enumerate() {
        if let Some(first_index) = seen_ids.insert(tx.txid.as_str(), index) {
            return Err(LedgerError::InvalidTransaction(format!(
                "Duplicate transaction {} in block at positions {} and {}",
                tx.txid, first_index, index
            )));
        }
    }
    Ok(())
}

/// Checks a linked block before it is persisted.
pub fn validate_block(block: &Block, max_transactions: usize) -> Result<(), LedgerError> {
    if block.transactions.len() > max_transactions {
        return Err(LedgerError::InvalidBlock(format!(
            "Block carries {} transactions (max: {})",
            block.transactions.len(),
            max_transactions
        )));
    }

    for tx in &block.transactions {
        tx.validate()?;
    }

    validate_no_duplicate_transactions(block)?;

    let expected_root = Block::calculate_transactions_root(&block.transactions);
    if expected_root != block.header.transactions_root {
        return Err(LedgerError::InvalidBlock(format!(
            "Transactions root mismatch. Expected {}, but got {}.",
            hex::encode(expected_root),
            hex::encode(block.header.transactions_root)
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::Transaction;

    #[test]
    fn test_too_many_transactions() {
        let block = Block::new("p", vec![Transaction::new("a", vec![]), Transaction::new("b", vec![])]);
        assert!(matches!(validate_block(&block, 1), Err(LedgerError::InvalidBlock(_))));
        assert!(validate_block(&block, 2).is_ok());
    }

    #[test]
    fn test_tampered_transactions_root() {
        let mut block = Block::new("p", vec![Transaction::new("a", vec![1])]);
        block.transactions.push(Transaction::new("b", vec![2]));
        assert!(matches!(validate_block(&block, 10), Err(LedgerError::InvalidBlock(_))));
    }

    #[test]
    fn test_empty_block_is_valid() {
        let block = Block::new("p", vec![]);
        assert!(validate_block(&block, 10).is_ok());
    }
}
