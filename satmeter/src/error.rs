//! Unified error type for satmeter.
//!
//! Module errors fold into [`Error`] through `#[from]`, so callers can use `?`
//! across wallet, ledger and configuration calls.

use crate::config::ConfigError;
use crate::ledger::LedgerError;
use crate::mint::MintError;
use crate::provider::RunSettlement;
use crate::wallet::WalletError;

/// Result type alias for satmeter operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Wallet operation failed.
    #[error("wallet error: {0}")]
    Wallet(#[from] WalletError),

    /// Ledger or spend log storage failed.
    #[error("storage error: {0}")]
    Ledger(#[from] LedgerError),

    /// Mint call failed outside a wallet operation.
    #[error("mint error: {0}")]
    Mint(#[from] MintError),

    /// Configuration could not be loaded or is invalid.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// HTTP client could not be constructed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A run was settled but its spend log row could not be written.
    ///
    /// The wallet already reflects the settlement, including any refund.
    #[error(
        "run settled ({} of {} sats spent) but not recorded in the spend log: {source}",
        settlement.spent_sats,
        settlement.budget_sats
    )]
    SpendLogUnrecorded {
        /// The settlement that was applied to the wallet.
        settlement: Box<RunSettlement>,
        /// Why the append failed.
        source: LedgerError,
    },
}

impl Error {
    /// `(available, required)` if the wallet could not cover a request.
    #[must_use]
    pub const fn insufficient_funds(&self) -> Option<(u64, u64)> {
        match self {
            Self::Wallet(e) => e.insufficient_funds(),
            _ => None,
        }
    }

    /// The applied settlement, if a run was settled but went unrecorded.
    #[must_use]
    pub fn unrecorded_settlement(&self) -> Option<&RunSettlement> {
        match self {
            Self::SpendLogUnrecorded { settlement, .. } => Some(settlement),
            _ => None,
        }
    }
}
