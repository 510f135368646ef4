//! HTTP client for a remote facilitator's `/settle` endpoint.
//!
//! The facilitator verifies the authorization and settles it on-chain. Its
//! raw reply is handed back untouched; [`crate::settlement::classify`] decides
//! what it means.

use std::time::Duration;

use crate::hmac::{compute_hmac, FACILITATOR_AUTH_HEADER};
use crate::scheme::SettlementService;
use crate::settlement::SettlementRequest;
use crate::{FacilitatorReply, X402Error};

/// Upper bound on one facilitator round trip. The gate's per-route timeout
/// is usually tighter.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// [`SettlementService`] backed by a facilitator reachable over HTTP.
#[derive(Clone)]
pub struct HttpSettlementService {
    http: reqwest::Client,
    facilitator_url: String,
    hmac_secret: Option<Vec<u8>>,
}

impl HttpSettlementService {
    pub fn new(http: reqwest::Client, facilitator_url: &str) -> Self {
        Self {
            http,
            facilitator_url: facilitator_url.trim_end_matches('/').to_string(),
            hmac_secret: None,
        }
    }

    /// Sign each request body with HMAC-SHA256 in the `X-Facilitator-Auth` header.
    pub fn with_hmac_secret(mut self, secret: impl Into<Vec<u8>>) -> Self {
        self.hmac_secret = Some(secret.into());
        self
    }

    pub fn facilitator_url(&self) -> &str {
        &self.facilitator_url
    }

    pub fn settle_url(&self) -> String {
        format!("{}/settle", self.facilitator_url)
    }
}

impl SettlementService for HttpSettlementService {
    async fn settle(&self, request: &SettlementRequest) -> Result<FacilitatorReply, X402Error> {
        let body = serde_json::to_vec(request)?;

        let mut builder = self
            .http
            .post(self.settle_url())
            .header("Content-Type", "application/json")
            .timeout(REQUEST_TIMEOUT);

        if let Some(secret) = &self.hmac_secret {
            builder = builder.header(FACILITATOR_AUTH_HEADER, compute_hmac(secret, &body));
        }

        let resp = builder
            .body(body)
            .send()
            .await
            .map_err(|e| X402Error::HttpError(format!("facilitator request failed: {e}")))?;

        let status = resp.status().as_u16();
        if status == 401 {
            tracing::error!(url = %self.facilitator_url, "facilitator rejected request authentication");
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| X402Error::HttpError(format!("facilitator response read failed: {e}")))?;

        Ok(FacilitatorReply::new(status, body.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settle_url_trims_trailing_slash() {
        let service = HttpSettlementService::new(reqwest::Client::new(), "http://localhost:4022/");
        assert_eq!(service.settle_url(), "http://localhost:4022/settle");
    }

    #[tokio::test]
    async fn test_unreachable_facilitator_is_transport_error() {
        // port 9 (discard) is not listening in test environments
        let service = HttpSettlementService::new(reqwest::Client::new(), "http://127.0.0.1:9")
            .with_hmac_secret(b"secret".to_vec());
        let request: SettlementRequest = serde_json::from_value(serde_json::json!({
            "resourceUrl": "http://localhost:3001/api/paid-data",
            "method": "GET",
            "scheme": "exact",
            "network": "base-sepolia",
            "price": 10000,
            "asset": "0x036CbD53842c5426634e7929541eC2318f3dCF7e",
            "payTo": "0x1111111111111111111111111111111111111111",
            "maxTimeoutSeconds": 300,
            "authorizationPayload": {
                "x402Version": 1,
                "scheme": "exact",
                "network": "base-sepolia",
                "payload": {
                    "from": "0x2222222222222222222222222222222222222222",
                    "to": "0x1111111111111111111111111111111111111111",
                    "value": "10000",
                    "validAfter": 0,
                    "validBefore": 4000000000u64,
                    "nonce": "0x0101010101010101010101010101010101010101010101010101010101010101",
                    "signature": "0xdead"
                }
            }
        }))
        .unwrap();

        assert!(matches!(
            service.settle(&request).await,
            Err(X402Error::HttpError(_))
        ));
    }
}
