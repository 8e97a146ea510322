//! HTTP implementation of the mint contract.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{MintClient, MintError, MintQuote, MintResult, SplitResponse};
use crate::http::{HttpClientConfig, join_url};
use crate::token::Proof;
use crate::util::truncate_str;

/// Longest response body kept in an error message.
const MAX_ERROR_BODY: usize = 512;

/// Mint client over HTTP/JSON.
///
/// # Example
///
/// ```rust,ignore
/// use satmeter::mint::{HttpMint, MintClient};
///
/// let mint = HttpMint::new()?;
/// let keyset = mint.keyset_id("https://mint.minibits.cash/Bitcoin").await?;
/// ```
#[derive(Clone)]
pub struct HttpMint {
    http_client: reqwest::Client,
}

impl std::fmt::Debug for HttpMint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpMint").finish_non_exhaustive()
    }
}

impl HttpMint {
    /// Create a client with the default HTTP configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new() -> MintResult<Self> {
        Self::with_config(&HttpClientConfig::default())
    }

    /// Create a client with a custom HTTP configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_config(config: &HttpClientConfig) -> MintResult<Self> {
        let http_client = config
            .build_client()
            .map_err(|e| MintError::Client(e.to_string()))?;
        Ok(Self { http_client })
    }

    /// Wrap an existing reqwest client.
    #[must_use]
    pub const fn from_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> MintResult<T> {
        debug!(url = %url, "mint GET");
        let response = self.http_client.get(url).send().await?;
        read_json(response).await
    }

    async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> MintResult<T> {
        debug!(url = %url, "mint POST");
        let response = self.http_client.post(url).json(body).send().await?;
        read_json(response).await
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> MintResult<T> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(MintError::Status {
            status: status.as_u16(),
            body: truncate_str(&body, MAX_ERROR_BODY).to_owned(),
        });
    }
    serde_json::from_str(&body).map_err(|e| MintError::InvalidResponse(e.to_string()))
}

#[derive(Debug, Deserialize)]
struct KeysetsResponse {
    keysets: Vec<KeysetInfo>,
}

#[derive(Debug, Deserialize)]
struct KeysetInfo {
    id: String,
    #[serde(default)]
    unit: Option<String>,
    #[serde(default = "default_active")]
    active: bool,
}

const fn default_active() -> bool {
    true
}

impl KeysetsResponse {
    /// First active keyset denominated in sats (or with no unit given).
    fn active_sat_keyset(self) -> Option<String> {
        self.keysets
            .into_iter()
            .find(|k| k.active && k.unit.as_deref().is_none_or(|u| u == "sat"))
            .map(|k| k.id)
    }
}

#[derive(Serialize)]
struct SplitRequest<'a> {
    proofs: &'a [Proof],
    amount: u64,
}

#[derive(Serialize)]
struct CheckRequest<'a> {
    proofs: &'a [Proof],
}

#[derive(Deserialize)]
struct CheckResponse {
    valid: Vec<Proof>,
}

#[derive(Serialize)]
struct QuoteRequest {
    amount: u64,
    unit: &'static str,
}

#[derive(Serialize)]
struct MintRequest<'a> {
    quote: &'a str,
}

#[derive(Deserialize)]
struct MintResponse {
    proofs: Vec<Proof>,
}

#[async_trait]
impl MintClient for HttpMint {
    async fn keyset_id(&self, mint_url: &str) -> MintResult<String> {
        let keys: KeysetsResponse = self.get_json(&join_url(mint_url, "keys")).await?;
        keys.active_sat_keyset()
            .ok_or_else(|| MintError::InvalidResponse("no active sat keyset".into()))
    }

    async fn split(
        &self,
        mint_url: &str,
        proofs: &[Proof],
        amount: u64,
    ) -> MintResult<SplitResponse> {
        self.post_json(&join_url(mint_url, "split"), &SplitRequest { proofs, amount })
            .await
    }

    async fn check(&self, mint_url: &str, proofs: &[Proof]) -> MintResult<Vec<Proof>> {
        let response: CheckResponse = self
            .post_json(&join_url(mint_url, "check"), &CheckRequest { proofs })
            .await?;
        Ok(response.valid)
    }

    async fn mint_quote(&self, mint_url: &str, amount: u64) -> MintResult<MintQuote> {
        let mut quote: MintQuote = self
            .post_json(
                &join_url(mint_url, "mint/quote"),
                &QuoteRequest { amount, unit: "sat" },
            )
            .await?;
        if quote.amount == 0 {
            quote.amount = amount;
        }
        Ok(quote)
    }

    async fn mint(&self, mint_url: &str, quote: &str) -> MintResult<Vec<Proof>> {
        let response: MintResponse = self
            .post_json(&join_url(mint_url, "mint"), &MintRequest { quote })
            .await?;
        Ok(response.proofs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_sat_keyset_selection() {
        let keys: KeysetsResponse = serde_json::from_str(
            r#"{"keysets":[
                {"id":"00aa","unit":"usd","active":true},
                {"id":"00bb","unit":"sat","active":false},
                {"id":"00cc","unit":"sat","active":true}
            ]}"#,
        )
        .unwrap();
        assert_eq!(keys.active_sat_keyset().as_deref(), Some("00cc"));

        let bare: KeysetsResponse =
            serde_json::from_str(r#"{"keysets":[{"id":"00dd"}]}"#).unwrap();
        assert_eq!(bare.active_sat_keyset().as_deref(), Some("00dd"));
    }

    #[test]
    fn test_split_request_shape() {
        let proofs = vec![Proof::new("00", 100, "s", "02")];
        let body = serde_json::to_value(SplitRequest {
            proofs: &proofs,
            amount: 60,
        })
        .unwrap();
        assert_eq!(body["amount"], 60);
        assert_eq!(body["proofs"][0]["C"], "02");
    }

    #[tokio::test]
    async fn test_unreachable_mint_is_network_error() {
        let mint = HttpMint::with_config(&HttpClientConfig::with_timeout(2)).unwrap();
        // Port 9 (discard) on localhost is almost never listening.
        let err = mint.keyset_id("http://127.0.0.1:9").await.unwrap_err();
        assert!(matches!(err, MintError::Network(_)));
    }
}
