//! E-cash wallet built on a [`ProofLedger`](crate::ledger::ProofLedger) and a
//! [`MintClient`](crate::mint::MintClient).
//!
//! # Architecture
//!
//! ```text
//! Wallet (ledger handle + mint capability + home mint URL)
//!   ├── info()           → balance, proof count
//!   ├── send_token()     → select, split if needed, debit, encode
//!   ├── receive_token()  → decode, check with mint, credit valid proofs
//!   ├── request_top_up() → lightning quote from the mint
//!   └── claim_top_up()   → mint proofs for a paid quote and credit them
//! ```
//!
//! # Failure atomicity
//!
//! Every network call happens before the ledger is touched, and each
//! operation commits its ledger change with a single `replace`/`save_many`.
//! A failed mint call therefore leaves the balance exactly as it was, and the
//! caller may retry.
//!
//! # Examples
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use satmeter::ledger::SqliteLedger;
//! use satmeter::mint::HttpMint;
//! use satmeter::wallet::Wallet;
//!
//! let wallet = Wallet::new(
//!     Arc::new(SqliteLedger::open("wallet.db")?),
//!     Arc::new(HttpMint::new()?),
//!     "https://mint.minibits.cash/Bitcoin",
//! );
//! let token = wallet.send_token(2_000).await?;
//! ```

mod error;

pub use error::{WalletError, WalletResult};

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::ledger::{ProofRecord, SharedLedger, balance};
use crate::mint::{MintQuote, SharedMint, SplitOutcome};
use crate::token::{Proof, Token};

/// Read-only wallet summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletInfo {
    /// Total value of stored proofs.
    pub balance_sats: u64,
    /// Number of stored proofs.
    pub proof_count: usize,
}

/// Result of crediting a token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveSummary {
    /// Value credited to the ledger.
    pub received_sats: u64,
    /// Proofs accepted and stored.
    pub accepted: usize,
    /// Proofs the mint did not confirm (invalid, spent, or mint unreachable).
    pub rejected: usize,
    /// Proofs already held by this ledger, skipped.
    pub duplicates: usize,
}

/// Greedy smallest-first selection.
///
/// Returns the chosen records and their total, or `None` if the records are
/// worth less than `amount`. Ties on amount are broken by key so selection
/// is deterministic.
fn select_proofs(
    mut records: Vec<ProofRecord>,
    amount: u64,
) -> Option<(Vec<ProofRecord>, u64)> {
    records.sort_by(|a, b| {
        a.amount()
            .cmp(&b.amount())
            .then_with(|| a.key().cmp(b.key()))
    });

    let mut selected = Vec::new();
    let mut total = 0u64;
    for record in records {
        if total >= amount {
            break;
        }
        total = total.saturating_add(record.amount());
        selected.push(record);
    }

    (total >= amount).then_some((selected, total))
}

fn same_mint(a: &str, b: &str) -> bool {
    a.trim_end_matches('/') == b.trim_end_matches('/')
}

/// E-cash wallet bound to a home mint.
///
/// The ledger and mint are injected handles. The wallet holds no state of
/// its own beyond them, so it is cheap to share behind an `Arc`.
pub struct Wallet {
    ledger: SharedLedger,
    mint: SharedMint,
    mint_url: String,
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("ledger", &self.ledger.backend())
            .field("mint_url", &self.mint_url)
            .finish_non_exhaustive()
    }
}

impl Wallet {
    /// Create a wallet over an open ledger and a mint client.
    pub fn new(ledger: SharedLedger, mint: SharedMint, mint_url: impl Into<String>) -> Self {
        Self {
            ledger,
            mint,
            mint_url: mint_url.into(),
        }
    }

    /// Home mint base URL.
    #[must_use]
    pub fn mint_url(&self) -> &str {
        &self.mint_url
    }

    /// The underlying ledger handle.
    #[must_use]
    pub const fn ledger(&self) -> &SharedLedger {
        &self.ledger
    }

    /// Balance and proof count.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read.
    pub async fn info(&self) -> WalletResult<WalletInfo> {
        let records = self.ledger.load_all().await?;
        Ok(WalletInfo {
            balance_sats: balance(&records),
            proof_count: records.len(),
        })
    }

    /// Active keyset of the home mint.
    ///
    /// # Errors
    ///
    /// Returns an error if the mint cannot be reached.
    pub async fn keyset_id(&self) -> WalletResult<String> {
        Ok(self.mint.keyset_id(&self.mint_url).await?)
    }

    /// Debit `amount_sats` from the ledger and return it as an encoded token.
    ///
    /// Proofs are selected smallest-first until the running total covers the
    /// amount. An exact match is sent as-is; otherwise the mint splits the
    /// selection into an exact send set and change. Selected proofs are
    /// removed from the ledger and any change is stored in the same step.
    ///
    /// # Errors
    ///
    /// - [`WalletError::InvalidAmount`] if `amount_sats` is zero
    /// - [`WalletError::InsufficientFunds`] if the home-mint balance is short
    /// - [`WalletError::Mint`] if the split fails; the ledger is untouched
    /// - [`WalletError::Ledger`] if the ledger cannot be read or written
    pub async fn send_token(&self, amount_sats: u64) -> WalletResult<String> {
        if amount_sats == 0 {
            return Err(WalletError::InvalidAmount);
        }

        let spendable: Vec<ProofRecord> = self
            .ledger
            .load_all()
            .await?
            .into_iter()
            .filter(|r| same_mint(&r.mint, &self.mint_url))
            .collect();
        let available = balance(&spendable);

        let Some((selected, selected_total)) = select_proofs(spendable, amount_sats) else {
            return Err(WalletError::InsufficientFunds {
                available,
                required: amount_sats,
            });
        };

        let (keep, send) = if selected_total == amount_sats {
            debug!(amount = amount_sats, proofs = selected.len(), "exact match, no split");
            let send: Vec<Proof> = selected.iter().map(|r| r.proof.clone()).collect();
            (Vec::new(), send)
        } else {
            let inputs: Vec<Proof> = selected.iter().map(|r| r.proof.clone()).collect();
            debug!(
                amount = amount_sats,
                inputs = inputs.len(),
                input_total = selected_total,
                "splitting proofs at mint"
            );
            let result = self.mint.split(&self.mint_url, &inputs, amount_sats).await;
            match SplitOutcome::from_response(result, amount_sats, selected_total) {
                SplitOutcome::Succeeded { keep, send } => (keep, send),
                SplitOutcome::Failed(e) => {
                    warn!(amount = amount_sats, error = %e, "split failed, ledger unchanged");
                    return Err(e.into());
                }
            }
        };

        // Encode before mutating so a serialization failure cannot strand funds.
        let token = Token::new(self.mint_url.clone(), send).encode()?;

        let keep_records: Vec<ProofRecord> = keep
            .into_iter()
            .map(|p| ProofRecord::new(p, self.mint_url.clone()))
            .collect();
        self.ledger.replace(&selected, &keep_records).await?;

        info!(
            amount = amount_sats,
            spent_proofs = selected.len(),
            change = balance(&keep_records),
            "token sent"
        );
        Ok(token)
    }

    /// Credit a token to the ledger.
    ///
    /// Each mint group is checked with its mint and only confirmed proofs
    /// are stored. A group whose mint cannot be reached counts as rejected.
    /// Partial acceptance is not an error, and a token with nothing valid
    /// returns a zero summary.
    ///
    /// # Errors
    ///
    /// - [`WalletError::InvalidToken`] if the token cannot be decoded
    /// - [`WalletError::Ledger`] if the ledger cannot be read or written
    pub async fn receive_token(&self, encoded: &str) -> WalletResult<ReceiveSummary> {
        let token = Token::decode(encoded)?;

        let held: HashSet<String> = self
            .ledger
            .load_all()
            .await?
            .into_iter()
            .map(|r| r.proof.secret)
            .collect();

        let mut summary = ReceiveSummary::default();
        let mut accepted: Vec<ProofRecord> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for group in token.groups() {
            let mut candidates: Vec<Proof> = Vec::with_capacity(group.proofs.len());
            for proof in &group.proofs {
                if held.contains(&proof.secret) || !seen.insert(proof.secret.clone()) {
                    summary.duplicates += 1;
                } else {
                    candidates.push(proof.clone());
                }
            }
            if candidates.is_empty() {
                continue;
            }

            let valid = match self.mint.check(&group.mint, &candidates).await {
                Ok(valid) => valid,
                Err(e) => {
                    warn!(
                        mint = %group.mint,
                        error = %e,
                        "mint check failed, group not credited"
                    );
                    summary.rejected += candidates.len();
                    continue;
                }
            };

            // Only trust the mint to confirm proofs we actually submitted.
            let confirmed: HashSet<&str> = valid.iter().map(|p| p.secret.as_str()).collect();
            for proof in candidates {
                if confirmed.contains(proof.secret.as_str()) {
                    accepted.push(ProofRecord::new(proof, group.mint.clone()));
                } else {
                    summary.rejected += 1;
                }
            }
        }

        if !accepted.is_empty() {
            self.ledger.save_many(&accepted).await?;
        }

        summary.accepted = accepted.len();
        summary.received_sats = balance(&accepted);

        if summary.received_sats == 0 {
            warn!(
                rejected = summary.rejected,
                duplicates = summary.duplicates,
                "token credited nothing"
            );
        } else {
            info!(
                received = summary.received_sats,
                accepted = summary.accepted,
                rejected = summary.rejected,
                "token received"
            );
        }
        Ok(summary)
    }

    /// Ask the home mint for an invoice to top up `amount_sats`.
    ///
    /// # Errors
    ///
    /// Returns an error if the amount is zero or the mint call fails.
    pub async fn request_top_up(&self, amount_sats: u64) -> WalletResult<MintQuote> {
        if amount_sats == 0 {
            return Err(WalletError::InvalidAmount);
        }
        let quote = self.mint.mint_quote(&self.mint_url, amount_sats).await?;
        info!(amount = amount_sats, quote = %quote.quote, "top-up quote issued");
        Ok(quote)
    }

    /// Claim the proofs for a paid top-up quote and store them.
    ///
    /// Returns the credited amount.
    ///
    /// # Errors
    ///
    /// Returns an error if the mint refuses the claim or the ledger write
    /// fails.
    pub async fn claim_top_up(&self, quote: &str) -> WalletResult<u64> {
        let proofs = self.mint.mint(&self.mint_url, quote).await?;
        let records: Vec<ProofRecord> = proofs
            .into_iter()
            .filter(|p| p.amount > 0)
            .map(|p| ProofRecord::new(p, self.mint_url.clone()))
            .collect();
        if !records.is_empty() {
            self.ledger.save_many(&records).await?;
        }
        let minted = balance(&records);
        info!(quote = %quote, minted, "top-up claimed");
        Ok(minted)
    }
}
