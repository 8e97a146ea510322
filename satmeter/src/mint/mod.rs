//! The remote mint, consumed through its network contract.
//!
//! The wallet never touches blind-signature cryptography directly. Everything
//! it needs from a mint is expressed by the [`MintClient`] capability:
//!
//! ```text
//! GET  /keys        → active keyset id
//! POST /split       {proofs, amount} → {keep, send}
//! POST /check       {proofs}         → {valid}
//! POST /mint/quote  {amount}         → {quote, request}
//! POST /mint        {quote}          → {proofs}
//! ```
//!
//! [`HttpMint`] speaks this contract over HTTP; tests substitute an
//! in-process fake. Responses are decoded into typed values at the boundary,
//! and split responses are further checked by [`SplitOutcome::from_response`]
//! before the wallet is allowed to touch the ledger.

mod error;
mod http;

pub use error::{MintError, MintResult};
pub use http::HttpMint;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::token::{Proof, proof_sum};

/// Raw response of the split endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitResponse {
    /// Change proofs, returned to the wallet.
    pub keep: Vec<Proof>,
    /// Proofs worth exactly the requested amount.
    pub send: Vec<Proof>,
}

/// A lightning invoice quote for topping up the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintQuote {
    /// Quote identifier, presented back to the mint when claiming.
    pub quote: String,
    /// Payment request (bolt11 invoice) to pay.
    pub request: String,
    /// Quoted amount in sats.
    #[serde(default)]
    pub amount: u64,
    /// Whether the mint has seen the invoice paid.
    #[serde(default)]
    pub paid: bool,
    /// Quote expiry (Unix seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<u64>,
}

/// Validated result of a split call.
#[derive(Debug)]
pub enum SplitOutcome {
    /// The mint returned fresh proofs and the send side is worth exactly the
    /// requested amount.
    Succeeded {
        /// Change proofs.
        keep: Vec<Proof>,
        /// Exact-amount proofs.
        send: Vec<Proof>,
    },
    /// The call failed or the response did not honor the contract.
    Failed(MintError),
}

impl SplitOutcome {
    /// Classify a split result for a request of `amount` sats drawn from
    /// inputs worth `input_total` sats.
    #[must_use]
    pub fn from_response(
        result: MintResult<SplitResponse>,
        amount: u64,
        input_total: u64,
    ) -> Self {
        let response = match result {
            Ok(response) => response,
            Err(e) => return Self::Failed(e),
        };

        let send_total = proof_sum(&response.send);
        if send_total != amount {
            return Self::Failed(MintError::SplitRejected(format!(
                "send side worth {send_total} sats, requested {amount}"
            )));
        }

        let keep_total = proof_sum(&response.keep);
        if keep_total.saturating_add(send_total) > input_total {
            return Self::Failed(MintError::SplitRejected(format!(
                "outputs worth {} sats exceed inputs worth {input_total}",
                keep_total.saturating_add(send_total)
            )));
        }
        if response.keep.iter().chain(&response.send).any(|p| p.amount == 0) {
            return Self::Failed(MintError::SplitRejected("zero-amount output".into()));
        }

        Self::Succeeded {
            keep: response.keep,
            send: response.send,
        }
    }
}

/// Capability interface to a remote mint.
///
/// Every method takes the mint base URL, so one client can serve proofs from
/// several mints (a received token may span more than one).
#[async_trait]
pub trait MintClient: Send + Sync {
    /// Active keyset identifier.
    async fn keyset_id(&self, mint_url: &str) -> MintResult<String>;

    /// Exchange `proofs` for a `send` set worth exactly `amount` plus change.
    async fn split(
        &self,
        mint_url: &str,
        proofs: &[Proof],
        amount: u64,
    ) -> MintResult<SplitResponse>;

    /// Return the subset of `proofs` the mint considers valid and unspent.
    async fn check(&self, mint_url: &str, proofs: &[Proof]) -> MintResult<Vec<Proof>>;

    /// Request an invoice for minting `amount` sats.
    async fn mint_quote(&self, mint_url: &str, amount: u64) -> MintResult<MintQuote>;

    /// Claim the proofs for a paid quote.
    async fn mint(&self, mint_url: &str, quote: &str) -> MintResult<Vec<Proof>>;
}

/// A shared, reference-counted mint client.
pub type SharedMint = std::sync::Arc<dyn MintClient>;

#[cfg(test)]
mod tests {
    use super::*;

    fn p(secret: &str, amount: u64) -> Proof {
        Proof::new("00", amount, secret, "02")
    }

    #[test]
    fn test_split_outcome_accepts_exact_send() {
        let response = SplitResponse {
            keep: vec![p("k1", 32), p("k2", 8)],
            send: vec![p("s1", 32), p("s2", 16), p("s3", 8), p("s4", 4)],
        };
        match SplitOutcome::from_response(Ok(response), 60, 100) {
            SplitOutcome::Succeeded { keep, send } => {
                assert_eq!(proof_sum(&keep), 40);
                assert_eq!(proof_sum(&send), 60);
            }
            SplitOutcome::Failed(e) => panic!("unexpected failure: {e}"),
        }
    }

    #[test]
    fn test_split_outcome_rejects_wrong_send_total() {
        let response = SplitResponse {
            keep: vec![p("k1", 50)],
            send: vec![p("s1", 50)],
        };
        assert!(matches!(
            SplitOutcome::from_response(Ok(response), 60, 100),
            SplitOutcome::Failed(MintError::SplitRejected(_))
        ));
    }

    #[test]
    fn test_split_outcome_rejects_inflated_outputs() {
        let response = SplitResponse {
            keep: vec![p("k1", 64)],
            send: vec![p("s1", 60)],
        };
        assert!(matches!(
            SplitOutcome::from_response(Ok(response), 60, 100),
            SplitOutcome::Failed(MintError::SplitRejected(_))
        ));
    }

    #[test]
    fn test_split_outcome_passes_through_errors() {
        let result = Err(MintError::Network("connection refused".into()));
        assert!(matches!(
            SplitOutcome::from_response(result, 60, 100),
            SplitOutcome::Failed(MintError::Network(_))
        ));
    }
}
