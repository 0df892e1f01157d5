// Thin re-export module: implementation is in `blockchain/core.rs` so block
// construction, validation and chain management stay in separate files.

pub mod core;
pub use self::core::*;
