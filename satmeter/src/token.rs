//! Portable e-cash token encoding.
//!
//! A token is a list of per-mint proof groups serialized as JSON and wrapped
//! in URL-safe base64 behind a version prefix:
//!
//! ```text
//! cashuA<base64url({"token":[{"mint":"https://mint.example","proofs":[...]}]})>
//! ```
//!
//! Decoding is lenient about padding and about the standard vs URL-safe
//! alphabet; encoding always emits padded URL-safe base64.

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, URL_SAFE};
use base64::engine::DecodePaddingMode;
use serde::{Deserialize, Serialize};

/// Version prefix of the supported token format.
pub const TOKEN_PREFIX: &str = "cashuA";

const LENIENT_URL_SAFE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// A spendable e-cash fragment as it travels on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Proof {
    /// Keyset identifier.
    pub id: String,
    /// Amount in sats.
    pub amount: u64,
    /// Secret message; the double-spend key.
    pub secret: String,
    /// Unblinded signature (hex).
    #[serde(rename = "C")]
    pub c: String,
}

impl Proof {
    /// Create a new proof.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        amount: u64,
        secret: impl Into<String>,
        c: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            amount,
            secret: secret.into(),
            c: c.into(),
        }
    }
}

/// Sum of proof amounts.
#[must_use]
pub fn proof_sum(proofs: &[Proof]) -> u64 {
    proofs
        .iter()
        .fold(0u64, |acc, p| acc.saturating_add(p.amount))
}

/// Proofs issued by a single mint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGroup {
    /// Base URL of the issuing mint.
    pub mint: String,
    /// Proofs in this group.
    pub proofs: Vec<Proof>,
}

/// A decoded token: one or more per-mint proof groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Proof groups, one per mint.
    pub token: Vec<TokenGroup>,
    /// Optional free-form memo.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

/// Errors produced while decoding a token.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TokenError {
    /// The token does not carry the supported version prefix.
    #[error("unsupported token version (expected '{TOKEN_PREFIX}' prefix)")]
    UnsupportedVersion,

    /// The payload is not valid base64.
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The payload is not the expected JSON document.
    #[error("invalid token payload: {0}")]
    Json(#[from] serde_json::Error),

    /// The token contains no proofs.
    #[error("token contains no proofs")]
    Empty,

    /// A proof carries a zero amount.
    #[error("proof with zero amount in token")]
    ZeroAmount,
}

impl Token {
    /// Create a single-mint token.
    #[must_use]
    pub fn new(mint: impl Into<String>, proofs: Vec<Proof>) -> Self {
        Self {
            token: vec![TokenGroup {
                mint: mint.into(),
                proofs,
            }],
            memo: None,
        }
    }

    /// Attach a memo.
    #[must_use]
    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    /// Per-mint proof groups.
    #[must_use]
    pub fn groups(&self) -> &[TokenGroup] {
        &self.token
    }

    /// Total value across all groups.
    #[must_use]
    pub fn total_amount(&self) -> u64 {
        self.token
            .iter()
            .fold(0u64, |acc, g| acc.saturating_add(proof_sum(&g.proofs)))
    }

    /// Number of proofs across all groups.
    #[must_use]
    pub fn proof_count(&self) -> usize {
        self.token.iter().map(|g| g.proofs.len()).sum()
    }

    /// Encode into the portable string form.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn encode(&self) -> Result<String, TokenError> {
        let json = serde_json::to_vec(self)?;
        Ok(format!("{TOKEN_PREFIX}{}", URL_SAFE.encode(json)))
    }

    /// Decode from the portable string form.
    ///
    /// # Errors
    ///
    /// Returns a [`TokenError`] if the prefix, base64 payload or JSON body is
    /// malformed, if the token holds no proofs, or if any proof has a zero
    /// amount.
    pub fn decode(encoded: &str) -> Result<Self, TokenError> {
        let payload = encoded
            .trim()
            .strip_prefix(TOKEN_PREFIX)
            .ok_or(TokenError::UnsupportedVersion)?;

        // Tolerate tokens produced with the standard alphabet.
        let normalized: String = payload
            .chars()
            .map(|c| match c {
                '+' => '-',
                '/' => '_',
                other => other,
            })
            .collect();

        let bytes = LENIENT_URL_SAFE.decode(normalized.as_bytes())?;
        let token: Self = serde_json::from_slice(&bytes)?;

        if token.proof_count() == 0 {
            return Err(TokenError::Empty);
        }
        if token
            .token
            .iter()
            .flat_map(|g| g.proofs.iter())
            .any(|p| p.amount == 0)
        {
            return Err(TokenError::ZeroAmount);
        }

        Ok(token)
    }
}

impl FromStr for Token {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.encode() {
            Ok(s) => f.write_str(&s),
            Err(_) => Err(fmt::Error),
        }
    }
}
