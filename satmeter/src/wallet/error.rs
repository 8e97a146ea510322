//! Error types for wallet operations.

use crate::ledger::LedgerError;
use crate::mint::MintError;
use crate::token::TokenError;

/// Error type for wallet operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum WalletError {
    /// The ledger holds less than the requested amount. Nothing was changed.
    #[error("insufficient funds: {available} sats available, {required} required")]
    InsufficientFunds {
        /// Spendable balance at the time of the call.
        available: u64,
        /// Amount requested.
        required: u64,
    },

    /// Amounts must be positive.
    #[error("amount must be greater than zero")]
    InvalidAmount,

    /// The token could not be decoded. Nothing was changed.
    #[error("invalid token: {0}")]
    InvalidToken(#[from] TokenError),

    /// The mint could not be reached or rejected the request.
    #[error("mint: {0}")]
    Mint(#[from] MintError),

    /// The ledger backend failed.
    #[error("ledger: {0}")]
    Ledger(#[from] LedgerError),
}

impl WalletError {
    /// `(available, required)` if this is an insufficient-funds error.
    #[must_use]
    pub const fn insufficient_funds(&self) -> Option<(u64, u64)> {
        match self {
            Self::InsufficientFunds {
                available,
                required,
            } => Some((*available, *required)),
            _ => None,
        }
    }
}

/// Result type for wallet operations.
pub type WalletResult<T> = Result<T, WalletError>;
