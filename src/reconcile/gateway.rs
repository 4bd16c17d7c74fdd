//! Payment gateway verification seam
//!
//! [`PaymentGateway`] abstracts the external processor so the reconciliation
//! job can be exercised against a mock. [`PaystackClient`] is the production
//! implementation, hitting the transaction-verify endpoint over HTTPS.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::WalletError;

/// Outcome of asking the gateway about one transaction reference.
///
/// `Unknown` covers "still processing" and references the gateway has no
/// verdict for yet; the caller leaves those pending and asks again on the
/// next cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayVerdict {
    Confirmed,
    Failed,
    Unknown,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Look up the gateway's verdict for a transaction reference.
    async fn verify(&self, reference: &str) -> Result<GatewayVerdict, WalletError>;
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    status: bool,
    #[serde(default)]
    message: String,
    data: Option<VerifyData>,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    status: String,
}

/// Paystack REST client.
pub struct PaystackClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl PaystackClient {
    pub fn new(base_url: String, secret_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key,
        }
    }
}

#[async_trait]
impl PaymentGateway for PaystackClient {
    async fn verify(&self, reference: &str) -> Result<GatewayVerdict, WalletError> {
        let url = format!("{}/transaction/verify/{}", self.base_url, reference);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    WalletError::GatewayTimeout
                } else {
                    WalletError::Gateway(e.to_string())
                }
            })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            // Reference not known to the gateway (yet).
            return Ok(GatewayVerdict::Unknown);
        }
        if !response.status().is_success() {
            return Err(WalletError::Gateway(format!(
                "verify returned HTTP {}",
                response.status()
            )));
        }

        let body: VerifyResponse = response
            .json()
            .await
            .map_err(|e| WalletError::Gateway(e.to_string()))?;

        if !body.status {
            return Err(WalletError::Gateway(body.message));
        }

        let verdict = match body.data.as_ref().map(|d| d.status.as_str()) {
            Some("success") => GatewayVerdict::Confirmed,
            Some("failed") | Some("abandoned") | Some("reversed") => GatewayVerdict::Failed,
            other => {
                debug!(reference, status = ?other, "gateway verdict not terminal");
                GatewayVerdict::Unknown
            }
        };
        Ok(verdict)
    }
}
