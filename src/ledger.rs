//! Transaction-batch lifecycle: a batch is begun, its transactions execute
//! against the world state, and it is either committed as a block or rolled
//! back.

pub mod batch;
pub mod collaborators;
pub mod coordinator;
pub mod instance;

pub use batch::BatchId;
pub use collaborators::{BlockStore, StateStore};
pub use coordinator::Ledger;
pub use instance::{get_ledger, get_ledger_with_config};
