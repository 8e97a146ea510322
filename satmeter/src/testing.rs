//! In-process fakes for the mint, gateway and spend log contracts.
//!
//! The fake mint tracks which secrets it issued and which are spent; it has
//! no cryptography. Amounts are issued as power-of-two denominations like a
//! real mint would.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::gateway::{RefundGateway, RefundOutcome};
use crate::ledger::{LedgerError, LedgerResult, ProofRecord};
use crate::mint::{MintClient, MintError, MintQuote, MintResult, SplitResponse};
use crate::spend_log::{SpendLog, SpendLogEntry};
use crate::token::{Proof, Token, TokenGroup, proof_sum};

pub(crate) const MINT_URL: &str = "https://mint.test";
pub(crate) const OTHER_MINT_URL: &str = "https://other-mint.test";
pub(crate) const KEYSET_ID: &str = "00fa4e5e2d1a8c3b";

/// Split `amount` into power-of-two denominations, smallest first.
pub(crate) fn denominations(amount: u64) -> Vec<u64> {
    (0..64)
        .map(|bit| 1u64 << bit)
        .filter(|d| amount & d != 0)
        .collect()
}

#[derive(Debug, Default)]
struct FakeMintState {
    issued: HashSet<String>,
    spent: HashSet<String>,
    quotes: HashMap<String, u64>,
    fail_split: bool,
    fail_check: bool,
    unreachable: HashSet<String>,
    bogus_split: bool,
    split_calls: usize,
    check_calls: usize,
}

#[derive(Debug, Default)]
pub(crate) struct FakeMint {
    state: Mutex<FakeMintState>,
}

impl FakeMint {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn fresh(state: &mut FakeMintState, amount: u64) -> Proof {
        let secret = uuid::Uuid::new_v4().to_string();
        state.issued.insert(secret.clone());
        Proof::new(KEYSET_ID, amount, secret, format!("02{:064x}", state.issued.len()))
    }

    /// Issue exactly one proof of `amount`.
    pub(crate) fn issue(&self, amount: u64) -> Proof {
        let mut state = self.state.lock().unwrap();
        Self::fresh(&mut state, amount)
    }

    /// Issue ledger records with the given amounts.
    pub(crate) fn issue_records(&self, amounts: &[u64]) -> Vec<ProofRecord> {
        amounts
            .iter()
            .map(|&a| ProofRecord::new(self.issue(a), MINT_URL))
            .collect()
    }

    /// Issue a token worth `amount` in power-of-two denominations.
    pub(crate) fn issue_token(&self, amount: u64) -> String {
        let proofs = denominations(amount)
            .into_iter()
            .map(|d| self.issue(d))
            .collect();
        Token::new(MINT_URL, proofs).encode().unwrap()
    }

    /// A token group worth `amount`, attributed to `mint_url`.
    pub(crate) fn issue_group(&self, mint_url: &str, amount: u64) -> TokenGroup {
        TokenGroup {
            mint: mint_url.to_owned(),
            proofs: denominations(amount)
                .into_iter()
                .map(|d| self.issue(d))
                .collect(),
        }
    }

    /// A proof the mint never signed.
    pub(crate) fn forged(amount: u64) -> Proof {
        Proof::new(KEYSET_ID, amount, uuid::Uuid::new_v4().to_string(), "02dead")
    }

    pub(crate) fn mark_spent(&self, proofs: &[Proof]) {
        let mut state = self.state.lock().unwrap();
        for p in proofs {
            state.spent.insert(p.secret.clone());
        }
    }

    pub(crate) fn is_spent(&self, secret: &str) -> bool {
        self.state.lock().unwrap().spent.contains(secret)
    }

    pub(crate) fn set_fail_split(&self, fail: bool) {
        self.state.lock().unwrap().fail_split = fail;
    }

    pub(crate) fn set_fail_check(&self, fail: bool) {
        self.state.lock().unwrap().fail_check = fail;
    }

    /// Fail `check` calls addressed to `mint_url` only.
    pub(crate) fn set_unreachable(&self, mint_url: &str) {
        self.state
            .lock()
            .unwrap()
            .unreachable
            .insert(mint_url.to_owned());
    }

    /// Make split return a send side worth one sat less than requested.
    pub(crate) fn set_bogus_split(&self, bogus: bool) {
        self.state.lock().unwrap().bogus_split = bogus;
    }

    pub(crate) fn split_calls(&self) -> usize {
        self.state.lock().unwrap().split_calls
    }

    pub(crate) fn check_calls(&self) -> usize {
        self.state.lock().unwrap().check_calls
    }
}

#[async_trait]
impl MintClient for FakeMint {
    async fn keyset_id(&self, _mint_url: &str) -> MintResult<String> {
        Ok(KEYSET_ID.to_owned())
    }

    async fn split(
        &self,
        _mint_url: &str,
        proofs: &[Proof],
        amount: u64,
    ) -> MintResult<SplitResponse> {
        let mut state = self.state.lock().unwrap();
        state.split_calls += 1;
        if state.fail_split {
            return Err(MintError::Network("connection refused".into()));
        }
        for p in proofs {
            if !state.issued.contains(&p.secret) || state.spent.contains(&p.secret) {
                return Err(MintError::Status {
                    status: 400,
                    body: "proofs already spent or unknown".into(),
                });
            }
        }
        let total = proof_sum(proofs);
        if amount > total {
            return Err(MintError::Status {
                status: 400,
                body: "split amount exceeds inputs".into(),
            });
        }
        for p in proofs {
            state.spent.insert(p.secret.clone());
        }

        let send_amount = if state.bogus_split { amount - 1 } else { amount };
        let send = denominations(send_amount)
            .into_iter()
            .map(|d| Self::fresh(&mut state, d))
            .collect();
        let keep = denominations(total - amount)
            .into_iter()
            .map(|d| Self::fresh(&mut state, d))
            .collect();
        Ok(SplitResponse { keep, send })
    }

    async fn check(&self, mint_url: &str, proofs: &[Proof]) -> MintResult<Vec<Proof>> {
        let mut state = self.state.lock().unwrap();
        state.check_calls += 1;
        if state.fail_check || state.unreachable.contains(mint_url) {
            return Err(MintError::Network("request timed out".into()));
        }
        Ok(proofs
            .iter()
            .filter(|p| state.issued.contains(&p.secret) && !state.spent.contains(&p.secret))
            .cloned()
            .collect())
    }

    async fn mint_quote(&self, _mint_url: &str, amount: u64) -> MintResult<MintQuote> {
        let mut state = self.state.lock().unwrap();
        let quote = format!("quote-{}", state.quotes.len() + 1);
        state.quotes.insert(quote.clone(), amount);
        Ok(MintQuote {
            quote,
            request: format!("lnbc{amount}n1fake"),
            amount,
            paid: false,
            expiry: None,
        })
    }

    async fn mint(&self, _mint_url: &str, quote: &str) -> MintResult<Vec<Proof>> {
        let mut state = self.state.lock().unwrap();
        let Some(amount) = state.quotes.remove(quote) else {
            return Err(MintError::Status {
                status: 400,
                body: "unknown or already claimed quote".into(),
            });
        };
        Ok(denominations(amount)
            .into_iter()
            .map(|d| Self::fresh(&mut state, d))
            .collect())
    }
}

/// What the fake gateway does with the next refund call.
#[derive(Debug, Clone)]
pub(crate) enum GatewayBehavior {
    /// Redeem the bearer token and return change worth this many sats.
    Refund(u64),
    /// Redeem the bearer token and report the budget exhausted.
    Exhausted,
    /// Fail without touching the token.
    Fail(String),
    /// Return a change token that does not decode.
    Garbage,
}

#[derive(Debug)]
pub(crate) struct FakeGateway {
    mint: std::sync::Arc<FakeMint>,
    behavior: Mutex<GatewayBehavior>,
    bearers: Mutex<Vec<String>>,
}

impl FakeGateway {
    pub(crate) fn new(mint: std::sync::Arc<FakeMint>, behavior: GatewayBehavior) -> Self {
        Self {
            mint,
            behavior: Mutex::new(behavior),
            bearers: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn set_behavior(&self, behavior: GatewayBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub(crate) fn bearers(&self) -> Vec<String> {
        self.bearers.lock().unwrap().clone()
    }

    fn redeem(&self, bearer: &str) {
        if let Ok(token) = Token::decode(bearer) {
            for group in token.groups() {
                self.mint.mark_spent(&group.proofs);
            }
        }
    }
}

#[async_trait]
impl RefundGateway for FakeGateway {
    fn base_url(&self) -> &str {
        "https://gateway.test"
    }

    async fn refund(&self, bearer_token: &str) -> RefundOutcome {
        self.bearers.lock().unwrap().push(bearer_token.to_owned());
        let behavior = self.behavior.lock().unwrap().clone();
        match behavior {
            GatewayBehavior::Refund(amount) => {
                self.redeem(bearer_token);
                RefundOutcome::Received(self.mint.issue_token(amount))
            }
            GatewayBehavior::Exhausted => {
                self.redeem(bearer_token);
                RefundOutcome::Exhausted
            }
            GatewayBehavior::Fail(reason) => RefundOutcome::Failed(reason),
            GatewayBehavior::Garbage => RefundOutcome::Received("cashuAnot-a-token".into()),
        }
    }
}

/// Spend log whose writes always fail.
#[derive(Debug, Default)]
pub(crate) struct FailingSpendLog;

#[async_trait]
impl SpendLog for FailingSpendLog {
    async fn append(&self, _entry: &SpendLogEntry) -> LedgerResult<()> {
        Err(LedgerError::storage("memory", "disk full"))
    }

    async fn entries(&self, _limit: Option<usize>) -> LedgerResult<Vec<SpendLogEntry>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denominations() {
        assert_eq!(denominations(40), vec![8, 32]);
        assert_eq!(denominations(60), vec![4, 8, 16, 32]);
        assert_eq!(denominations(1), vec![1]);
        assert!(denominations(0).is_empty());
    }
}
