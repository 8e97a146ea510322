//! The metering gateway's refund contract.
//!
//! After a run, the spent token is presented back to the gateway as a bearer
//! credential and the gateway returns whatever it did not consume:
//!
//! ```text
//! POST /balance/refund
//! Authorization: Bearer <spent-token>
//!
//! 200 {"token" | "cashu_token" | "cashu": "<change token>"}  → Received
//! 402                                                       → Exhausted
//! anything else, or no answer                               → Failed
//! ```
//!
//! The outcome is infallible by construction: transport errors become
//! [`RefundOutcome::Failed`] so the provider can account for them instead of
//! propagating them.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::http::{HttpClientConfig, join_url};
use crate::util::truncate_str;

/// Response fields that may carry the change token, in lookup order.
const CHANGE_TOKEN_FIELDS: [&str; 3] = ["token", "cashu_token", "cashu"];

/// Operator-facing reason for a refund request that got no response.
fn transport_failure(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "refund request timed out".to_owned()
    } else if err.is_connect() {
        format!("refund request failed: gateway unreachable ({err})")
    } else {
        format!("refund request failed: {err}")
    }
}

/// Validated result of a refund request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefundOutcome {
    /// The gateway returned a change token.
    Received(String),
    /// The budget was fully consumed; nothing is owed.
    Exhausted,
    /// The refund could not be confirmed.
    Failed(String),
}

impl RefundOutcome {
    /// Classify a gateway response.
    #[must_use]
    pub fn from_response(status: u16, body: &str) -> Self {
        match status {
            200..=299 => {
                let Ok(json) = serde_json::from_str::<Value>(body) else {
                    return Self::Failed("refund response is not JSON".into());
                };
                CHANGE_TOKEN_FIELDS
                    .iter()
                    .find_map(|field| json.get(*field).and_then(Value::as_str))
                    .filter(|token| !token.trim().is_empty())
                    .map_or_else(
                        || Self::Failed("refund response carried no change token".into()),
                        |token| Self::Received(token.trim().to_owned()),
                    )
            }
            402 => Self::Exhausted,
            other => Self::Failed(format!(
                "unexpected status {other}: {}",
                truncate_str(body, 200)
            )),
        }
    }
}

/// Capability interface to the refund endpoint.
#[async_trait]
pub trait RefundGateway: Send + Sync {
    /// Gateway base URL, reported in provider status.
    fn base_url(&self) -> &str;

    /// Present a spent token and collect any change.
    async fn refund(&self, bearer_token: &str) -> RefundOutcome;
}

/// A shared, reference-counted gateway handle.
pub type SharedGateway = std::sync::Arc<dyn RefundGateway>;

/// Refund gateway over HTTP.
#[derive(Clone)]
pub struct HttpRefundGateway {
    http_client: reqwest::Client,
    base_url: String,
}

impl std::fmt::Debug for HttpRefundGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRefundGateway")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpRefundGateway {
    /// Create a gateway client for `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        config: &HttpClientConfig,
    ) -> Result<Self, reqwest::Error> {
        let http_client = config.build_client()?;
        Ok(Self {
            http_client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl RefundGateway for HttpRefundGateway {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn refund(&self, bearer_token: &str) -> RefundOutcome {
        let url = join_url(&self.base_url, "balance/refund");
        debug!(url = %url, "requesting refund");

        let response = match self
            .http_client
            .post(&url)
            .bearer_auth(bearer_token)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return RefundOutcome::Failed(transport_failure(&e)),
        };

        let status = response.status().as_u16();
        match response.text().await {
            Ok(body) => RefundOutcome::from_response(status, &body),
            Err(e) => RefundOutcome::Failed(format!("failed to read refund body: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refund_token_field_variants() {
        for field in CHANGE_TOKEN_FIELDS {
            let body = format!(r#"{{"{field}":"cashuAabc","msats":1700000}}"#);
            assert_eq!(
                RefundOutcome::from_response(200, &body),
                RefundOutcome::Received("cashuAabc".into())
            );
        }
    }

    #[test]
    fn test_refund_exhausted() {
        assert_eq!(
            RefundOutcome::from_response(402, r#"{"detail":"no balance"}"#),
            RefundOutcome::Exhausted
        );
    }

    #[test]
    fn test_refund_failures() {
        assert!(matches!(
            RefundOutcome::from_response(500, "boom"),
            RefundOutcome::Failed(_)
        ));
        assert!(matches!(
            RefundOutcome::from_response(401, ""),
            RefundOutcome::Failed(_)
        ));
        assert!(matches!(
            RefundOutcome::from_response(200, "<html>"),
            RefundOutcome::Failed(_)
        ));
        assert!(matches!(
            RefundOutcome::from_response(200, r#"{"token":""}"#),
            RefundOutcome::Failed(_)
        ));
        assert!(matches!(
            RefundOutcome::from_response(200, r#"{"ok":true}"#),
            RefundOutcome::Failed(_)
        ));
    }

    #[tokio::test]
    async fn test_unreachable_gateway_fails_softly() {
        let config = HttpClientConfig::with_timeout(2);
        let gateway = HttpRefundGateway::new("http://127.0.0.1:9", &config).unwrap();
        match gateway.refund("cashuAxyz").await {
            RefundOutcome::Failed(reason) => assert!(reason.starts_with("refund request")),
            other => panic!("expected a failed refund, got {other:?}"),
        }
        assert_eq!(gateway.base_url(), "http://127.0.0.1:9");
    }
}
