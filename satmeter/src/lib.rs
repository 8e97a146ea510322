#![cfg_attr(docsrs, feature(doc_cfg))]
//! Satmeter pays for metered agent runs with prepaid e-cash budgets.
//!
//! A run is bracketed by a single debit and a single reconciliation:
//!
//! ```text
//! provider.prepare_run(budget) ─► wallet.send_token(budget) ─► bearer token
//!                                                                 │
//!                                                     (metered run spends it)
//!                                                                 │
//! provider.finalize_run ─► gateway refund ─► wallet.receive_token(change)
//!                       └─► spend log row
//! ```
//!
//! The [`ledger`] stores proofs and applies every wallet mutation atomically.
//! The [`wallet`] selects, splits and receives proofs against a [`mint`].
//! The [`provider`] runs the lifecycle above and writes the [`spend_log`].

pub mod config;
#[cfg(feature = "sqlite")]
#[cfg_attr(docsrs, doc(cfg(feature = "sqlite")))]
pub mod db;
pub mod error;
pub mod gateway;
pub mod http;
pub mod ledger;
pub mod mint;
pub mod prelude;
pub mod provider;
pub mod spend_log;
pub mod token;
pub mod util;
pub mod wallet;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, Result};
