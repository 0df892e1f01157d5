//! Process-wide access to a single [`Ledger`].
//!
//! Prefer constructing a [`Ledger`] explicitly and passing it around; the
//! accessor exists for callers that need one ledger shared by the whole
//! process.

use crate::config::{load_config, LedgerConfig};
use crate::error::{LedgerError, Result};
use once_cell::sync::OnceCell;

use super::coordinator::Ledger;

static LEDGER: OnceCell<Ledger> = OnceCell::new();

/// Return the process ledger, creating it from `load_config()` on first use.
pub fn get_ledger() -> Result<&'static Ledger> {
    if let Some(ledger) = LEDGER.get() {
        return Ok(ledger);
    }
    let config = load_config().map_err(|e| LedgerError::Initialization(e.to_string()))?;
    get_ledger_with_config(&config)
}

/// Return the process ledger, creating it from `config` on first use.
///
/// Construction runs at most once even under concurrent first access. If it
/// fails the cell stays empty and a later call tries again. Once the ledger
/// exists, `config` is ignored.
pub fn get_ledger_with_config(config: &LedgerConfig) -> Result<&'static Ledger> {
    LEDGER.get_or_try_init(|| Ledger::open(config))
}

/// Whether the process ledger has been constructed.
pub fn is_initialized() -> bool {
    LEDGER.get().is_some()
}
