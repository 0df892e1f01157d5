//! World state: committed key/value pairs plus the in-memory overlay of the
//! batch currently executing.

use crate::blockchain::Sha256Hash;
use crate::error::LedgerError;
use crate::ledger::StateStore;
use crate::persistence::Persistence;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

pub type StateHash = Sha256Hash;

/// Uncommitted changes keyed by state key. `None` marks a deletion.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StateDelta {
    pub changes: BTreeMap<String, Option<Vec<u8>>>,
}

impl StateDelta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: Vec<u8>) {
        self.changes.insert(key.into(), Some(value));
    }

    pub fn delete(&mut self, key: impl Into<String>) {
        self.changes.insert(key.into(), None);
    }

    pub fn get(&self, key: &str) -> Option<&Option<Vec<u8>>> {
        self.changes.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Option<Vec<u8>>)> {
        self.changes.iter()
    }

    pub fn apply_to(&self, state: &mut BTreeMap<String, Vec<u8>>) {
        for (key, value) in &self.changes {
            match value {
                Some(v) => {
                    state.insert(key.clone(), v.clone());
                }
                None => {
                    state.remove(key);
                }
            }
        }
    }
}

#[derive(Debug, Default)]
struct StateInner {
    committed: BTreeMap<String, Vec<u8>>,
    overlay: StateDelta,
}

#[derive(Debug, Default)]
pub struct State {
    inner: RwLock<StateInner>,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_committed(committed: BTreeMap<String, Vec<u8>>) -> Self {
        Self {
            inner: RwLock::new(StateInner {
                committed,
                overlay: StateDelta::new(),
            }),
        }
    }

    /// Load the committed view from a persistence backend.
    pub fn from_persistence(persistence: &dyn Persistence) -> Result<Self, LedgerError> {
        Ok(Self::from_committed(persistence.load_state()?))
    }

    pub fn get(&self, key: &str, committed: bool) -> Option<Vec<u8>> {
        let inner = self.inner.read();
        if !committed {
            if let Some(value) = inner.overlay.get(key) {
                return value.clone();
            }
        }
        inner.committed.get(key).cloned()
    }

    pub fn set(&self, key: &str, value: Vec<u8>) -> Result<(), LedgerError> {
        validate_key(key)?;
        self.inner.write().overlay.set(key, value);
        Ok(())
    }

    pub fn delete(&self, key: &str) -> Result<(), LedgerError> {
        validate_key(key)?;
        self.inner.write().overlay.delete(key);
        Ok(())
    }

    /// Hash over committed state only.
    pub fn committed_hash(&self) -> StateHash {
        let inner = self.inner.read();
        hash_entries(inner.committed.iter().map(|(k, v)| (k.as_str(), v.as_slice())))
    }

    /// Hash over committed state with the overlay applied.
    pub fn temp_hash(&self) -> StateHash {
        let inner = self.inner.read();
        if inner.overlay.is_empty() {
            return hash_entries(inner.committed.iter().map(|(k, v)| (k.as_str(), v.as_slice())));
        }

        let mut merged: BTreeMap<&str, &[u8]> = inner
            .committed
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
            .collect();
        for (key, value) in inner.overlay.iter() {
            match value {
                Some(v) => {
                    merged.insert(key.as_str(), v.as_slice());
                }
                None => {
                    merged.remove(key.as_str());
                }
            }
        }
        hash_entries(merged.into_iter())
    }

    pub fn delta(&self) -> StateDelta {
        self.inner.read().overlay.clone()
    }

    /// Drop the overlay. When the changes were persisted they are folded
    /// into the committed view first.
    pub fn clear(&self, changes_persisted: bool) {
        let mut inner = self.inner.write();
        let overlay = std::mem::take(&mut inner.overlay);
        if changes_persisted {
            overlay.apply_to(&mut inner.committed);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().committed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn validate_key(key: &str) -> Result<(), LedgerError> {
    if key.is_empty() {
        return Err(LedgerError::InvalidTransaction("State key must not be empty".to_string()));
    }
    Ok(())
}

fn hash_entries<'a>(entries: impl Iterator<Item = (&'a str, &'a [u8])>) -> StateHash {
    let mut hasher = Sha256::new();
    for (key, value) in entries {
        hasher.update((key.len() as u64).to_le_bytes());
        hasher.update(key.as_bytes());
        hasher.update((value.len() as u64).to_le_bytes());
        hasher.update(value);
    }
    hasher.finalize().into()
}

impl StateStore for State {
    fn get_state(&self, key: &str, committed: bool) -> Result<Option<Vec<u8>>, LedgerError> {
        Ok(self.get(key, committed))
    }

    fn set_state(&self, key: &str, value: Vec<u8>) -> Result<(), LedgerError> {
        self.set(key, value)
    }

    fn delete_state(&self, key: &str) -> Result<(), LedgerError> {
        self.delete(key)
    }

    fn get_state_hash(&self) -> Result<StateHash, LedgerError> {
        Ok(self.committed_hash())
    }

    fn get_temp_state_hash(&self) -> Result<StateHash, LedgerError> {
        Ok(self.temp_hash())
    }

    fn state_delta(&self) -> StateDelta {
        self.delta()
    }

    fn clear_in_memory_changes(&self, changes_persisted: bool) {
        self.clear(changes_persisted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_shadows_committed() {
        let mut committed = BTreeMap::new();
        committed.insert("a".to_string(), b"1".to_vec());
        let state = State::from_committed(committed);

        state.set("a", b"2".to_vec()).unwrap();
        assert_eq!(state.get("a", false), Some(b"2".to_vec()));
        assert_eq!(state.get("a", true), Some(b"1".to_vec()));

        state.delete("a").unwrap();
        assert_eq!(state.get("a", false), None);
        assert_eq!(state.get("a", true), Some(b"1".to_vec()));
    }

    #[test]
    fn test_temp_hash_tracks_overlay() {
        let state = State::new();
        let empty = state.temp_hash();
        assert_eq!(empty, state.committed_hash());

        state.set("k", b"v".to_vec()).unwrap();
        assert_ne!(state.temp_hash(), empty);
        assert_eq!(state.committed_hash(), empty);
    }

    #[test]
    fn test_delete_then_hash_matches_absent_key() {
        let mut committed = BTreeMap::new();
        committed.insert("a".to_string(), b"1".to_vec());
        committed.insert("b".to_string(), b"2".to_vec());
        let state = State::from_committed(committed);

        let mut only_b = BTreeMap::new();
        only_b.insert("b".to_string(), b"2".to_vec());
        let expected = State::from_committed(only_b).committed_hash();

        state.delete("a").unwrap();
        assert_eq!(state.temp_hash(), expected);
    }

    #[test]
    fn test_clear_discards_overlay() {
        let state = State::new();
        let before = state.temp_hash();
        state.set("k", b"v".to_vec()).unwrap();

        state.clear(false);
        assert!(state.delta().is_empty());
        assert_eq!(state.get("k", false), None);
        assert_eq!(state.temp_hash(), before);
    }

    #[test]
    fn test_clear_persisted_folds_overlay() {
        let state = State::new();
        state.set("k", b"v".to_vec()).unwrap();
        let temp = state.temp_hash();

        state.clear(true);
        assert!(state.delta().is_empty());
        assert_eq!(state.get("k", true), Some(b"v".to_vec()));
        assert_eq!(state.committed_hash(), temp);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let state = State::new();
        state.clear(false);
        state.clear(true);
        assert!(state.is_empty());
    }

    #[test]
    fn test_empty_key_rejected() {
        let state = State::new();
        assert!(matches!(state.set("", vec![1]), Err(LedgerError::InvalidTransaction(_))));
        assert!(matches!(state.delete(""), Err(LedgerError::InvalidTransaction(_))));
    }
}
