use std::fmt;

/// Identifier of a transaction batch.
///
/// "No batch in progress" is expressed as `Option<BatchId>::None`, never as a
/// sentinel id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct BatchId(String);

impl BatchId {
    pub fn new(id: impl Into<String>) -> Self {
        BatchId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BatchId {
    fn from(id: &str) -> Self {
        BatchId(id.to_string())
    }
}

impl From<String> for BatchId {
    fn from(id: String) -> Self {
        BatchId(id)
    }
}

impl From<u64> for BatchId {
    fn from(id: u64) -> Self {
        BatchId(id.to_string())
    }
}

impl From<&BatchId> for BatchId {
    fn from(id: &BatchId) -> Self {
        id.clone()
    }
}
