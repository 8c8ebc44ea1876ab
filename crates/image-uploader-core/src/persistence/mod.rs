mod error;
mod ledger;

pub use error::{LedgerError, LedgerResult};
pub use ledger::{ledger_key, ledger_path, UploadLedger, LEDGER_BASE_FILENAME};
