//! Common imports for satmeter users.

pub use crate::config::{MeterConfig, ProviderKind, load_config};
pub use crate::error::{Error, Result};
pub use crate::gateway::{HttpRefundGateway, RefundGateway, RefundOutcome};
pub use crate::ledger::{MemoryLedger, ProofLedger, ProofRecord, SharedLedger};
pub use crate::mint::{HttpMint, MintClient, SharedMint};
pub use crate::provider::{
    PaymentProvider, Reconciliation, RunOutcome, RunReservation, RunSettlement, SharedProvider,
    build_provider,
};
pub use crate::spend_log::{MemorySpendLog, SharedSpendLog, SpendLog, SpendLogEntry};
pub use crate::token::{Proof, Token};
pub use crate::wallet::{ReceiveSummary, Wallet, WalletError};

#[cfg(feature = "sqlite")]
pub use crate::db::Database;
#[cfg(feature = "sqlite")]
pub use crate::ledger::SqliteLedger;
#[cfg(feature = "sqlite")]
pub use crate::spend_log::SqliteSpendLog;
