//! Settlement client: one bounded call to the settlement service per payment.
//!
//! The client never retries. A retried settlement could move funds twice, so
//! retry policy belongs to whoever drives the whole exchange.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

use crate::route::RouteDescriptor;
use crate::scheme::SettlementService;
use crate::{FacilitatorReply, PaymentAuthorization, SettlementReceipt, SettlementResult};

/// Reason code used when a facilitator rejects without naming a reason.
pub const DEFAULT_REJECTION_REASON: &str = "payment_rejected";

/// Body sent to the settlement service.
///
/// Price, asset, recipient and network are copied from the server's
/// [`RouteDescriptor`]; the authorization travels alongside but never
/// overrides them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementRequest {
    pub resource_url: String,
    pub method: String,
    pub scheme: String,
    pub network: String,
    /// Route price in token minor units.
    pub price: u64,
    pub asset: Address,
    pub pay_to: Address,
    pub max_timeout_seconds: u64,
    pub authorization_payload: PaymentAuthorization,
}

impl SettlementRequest {
    pub fn bind(route: &RouteDescriptor, authorization: &PaymentAuthorization) -> Self {
        Self {
            resource_url: route.resource_url.clone(),
            method: route.method.clone(),
            scheme: authorization.scheme.clone(),
            network: route.network.clone(),
            price: route.price_minor_units,
            asset: route.asset,
            pay_to: route.pay_to,
            max_timeout_seconds: route.max_timeout_seconds,
            authorization_payload: authorization.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RejectionBody {
    reason_code: Option<String>,
    error_reason: Option<String>,
}

/// Map a raw facilitator reply onto a [`SettlementResult`].
///
/// - 200: settled, unless the receipt says `success: false`
/// - 402 with a JSON body: rejected with the body's reason
/// - anything else: the facilitator is treated as unavailable
pub fn classify(reply: &FacilitatorReply) -> SettlementResult {
    match reply.status {
        200 => {
            let receipt = if reply.body.is_empty() {
                SettlementReceipt::default()
            } else {
                match serde_json::from_slice::<SettlementReceipt>(&reply.body) {
                    Ok(receipt) => receipt,
                    Err(e) => {
                        tracing::warn!(error = %e, "unreadable settlement receipt, settling with empty receipt");
                        SettlementReceipt::default()
                    }
                }
            };

            if receipt.success == Some(false) {
                return SettlementResult::Rejected {
                    reason_code: receipt
                        .error_reason
                        .unwrap_or_else(|| DEFAULT_REJECTION_REASON.to_string()),
                };
            }

            SettlementResult::Settled {
                receipt,
                timestamp: chrono::Utc::now(),
            }
        }
        402 => match serde_json::from_slice::<RejectionBody>(&reply.body) {
            Ok(body) => SettlementResult::Rejected {
                reason_code: body
                    .reason_code
                    .or(body.error_reason)
                    .unwrap_or_else(|| DEFAULT_REJECTION_REASON.to_string()),
            },
            Err(e) => SettlementResult::FacilitatorUnavailable {
                cause: format!("facilitator returned 402 without a readable body: {e}"),
            },
        },
        status => SettlementResult::FacilitatorUnavailable {
            cause: format!("facilitator returned status {status}"),
        },
    }
}

/// Wraps a [`SettlementService`] with the timeout and classification rules.
pub struct SettlementClient<S> {
    service: Arc<S>,
}

impl<S> Clone for SettlementClient<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
        }
    }
}

impl<S: SettlementService + 'static> SettlementClient<S> {
    pub fn new(service: S) -> Self {
        Self {
            service: Arc::new(service),
        }
    }

    pub fn from_arc(service: Arc<S>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Verify and settle `authorization` for `route`.
    ///
    /// Exactly one service call is made, bounded by the route's
    /// `max_timeout_seconds`. The call runs on its own task: if it times out,
    /// or the caller's future is dropped, it still runs to completion and its
    /// late result is only logged.
    pub async fn settle(
        &self,
        route: &RouteDescriptor,
        authorization: &PaymentAuthorization,
    ) -> SettlementResult {
        let request = SettlementRequest::bind(route, authorization);
        let limit = Duration::from_secs(route.max_timeout_seconds);
        let service = Arc::clone(&self.service);
        let resource = route.resource_url.clone();

        let mut task = tokio::spawn(async move {
            let reply = service.settle(&request).await;
            tracing::debug!(
                resource = %request.resource_url,
                status = ?reply.as_ref().map(|r| r.status).ok(),
                "settlement service call finished"
            );
            reply
        });

        match tokio::time::timeout(limit, &mut task).await {
            Ok(Ok(Ok(reply))) => classify(&reply),
            Ok(Ok(Err(e))) => SettlementResult::FacilitatorUnavailable {
                cause: e.to_string(),
            },
            Ok(Err(e)) => SettlementResult::FacilitatorUnavailable {
                cause: format!("settlement task failed: {e}"),
            },
            Err(_) => {
                tracing::warn!(
                    resource = %resource,
                    timeout_secs = route.max_timeout_seconds,
                    "settlement timed out, call left to finish in the background"
                );
                SettlementResult::FacilitatorUnavailable {
                    cause: format!(
                        "settlement timed out after {}s",
                        route.max_timeout_seconds
                    ),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NetworkConfig, SignedTransfer, X402Error, SCHEME_EXACT};
    use alloy::primitives::FixedBytes;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct ScriptedService {
        reply: Result<FacilitatorReply, String>,
        delay: Option<Duration>,
        calls: AtomicUsize,
        seen: Mutex<Vec<SettlementRequest>>,
    }

    impl ScriptedService {
        fn replying(reply: FacilitatorReply) -> Self {
            Self {
                reply: Ok(reply),
                delay: None,
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl SettlementService for ScriptedService {
        async fn settle(&self, request: &SettlementRequest) -> Result<FacilitatorReply, X402Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(request.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.reply.clone().map_err(X402Error::HttpError)
        }
    }

    fn route() -> RouteDescriptor {
        RouteDescriptor::new(
            "http://localhost:3001/api/paid-data",
            "GET",
            10_000,
            Address::repeat_byte(0x11),
            &NetworkConfig::base_sepolia(),
        )
    }

    fn authorization(value: &str, to: Address) -> PaymentAuthorization {
        PaymentAuthorization {
            x402_version: 1,
            scheme: SCHEME_EXACT.to_string(),
            network: "base-sepolia".to_string(),
            payload: SignedTransfer {
                from: Address::repeat_byte(0x22),
                to,
                value: value.to_string(),
                valid_after: 0,
                valid_before: u64::MAX,
                nonce: FixedBytes::repeat_byte(0x01),
                signature: "0xdead".to_string(),
            },
        }
    }

    #[test]
    fn test_classify_settled() {
        let reply = FacilitatorReply::json(
            200,
            &serde_json::json!({"success": true, "transaction": "0xabc", "network": "base-sepolia"}),
        );
        match classify(&reply) {
            SettlementResult::Settled { receipt, .. } => {
                assert_eq!(receipt.transaction.as_deref(), Some("0xabc"));
            }
            other => panic!("expected settled, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_empty_200_still_settles() {
        assert!(classify(&FacilitatorReply::new(200, Vec::new())).is_settled());
    }

    #[test]
    fn test_classify_200_with_failed_receipt_is_rejected() {
        let reply = FacilitatorReply::json(
            200,
            &serde_json::json!({"success": false, "errorReason": "invalid_signature"}),
        );
        assert_eq!(
            classify(&reply),
            SettlementResult::Rejected {
                reason_code: "invalid_signature".to_string()
            }
        );
    }

    #[test]
    fn test_classify_402_reason() {
        let reply = FacilitatorReply::json(402, &serde_json::json!({"reasonCode": "insufficient_funds"}));
        assert_eq!(
            classify(&reply),
            SettlementResult::Rejected {
                reason_code: "insufficient_funds".to_string()
            }
        );

        let fallback = FacilitatorReply::json(402, &serde_json::json!({}));
        assert_eq!(
            classify(&fallback),
            SettlementResult::Rejected {
                reason_code: DEFAULT_REJECTION_REASON.to_string()
            }
        );
    }

    #[test]
    fn test_classify_402_without_body_is_unavailable() {
        assert!(matches!(
            classify(&FacilitatorReply::new(402, Vec::new())),
            SettlementResult::FacilitatorUnavailable { .. }
        ));
    }

    #[test]
    fn test_classify_other_status_is_unavailable() {
        for status in [401, 404, 500, 503] {
            assert!(matches!(
                classify(&FacilitatorReply::new(status, "oops")),
                SettlementResult::FacilitatorUnavailable { .. }
            ));
        }
    }

    #[tokio::test]
    async fn test_binds_route_price_and_recipient_not_authorization() {
        let service = Arc::new(ScriptedService::replying(FacilitatorReply::new(200, "{}")));
        let client = SettlementClient::from_arc(service.clone());

        // Client claims a larger amount to a different recipient.
        let auth = authorization("99999999", Address::repeat_byte(0x99));
        let result = client.settle(&route(), &auth).await;
        assert!(result.is_settled());

        let seen = service.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].price, 10_000);
        assert_eq!(seen[0].pay_to, Address::repeat_byte(0x11));
        assert_eq!(seen[0].network, "base-sepolia");
        assert_eq!(seen[0].authorization_payload, auth);
    }

    #[tokio::test]
    async fn test_transport_error_is_unavailable_and_not_retried() {
        let service = Arc::new(ScriptedService {
            reply: Err("connection refused".to_string()),
            delay: None,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        });
        let client = SettlementClient::from_arc(service.clone());

        let result = client
            .settle(&route(), &authorization("10000", Address::repeat_byte(0x11)))
            .await;
        assert!(matches!(
            result,
            SettlementResult::FacilitatorUnavailable { ref cause } if cause.contains("connection refused")
        ));
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_is_unavailable() {
        let service = ScriptedService {
            reply: Ok(FacilitatorReply::new(200, "{}")),
            delay: Some(Duration::from_secs(5)),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        };
        let client = SettlementClient::new(service);
        let route = route().with_max_timeout_seconds(1);

        let started = std::time::Instant::now();
        let result = client
            .settle(&route, &authorization("10000", Address::repeat_byte(0x11)))
            .await;
        assert!(matches!(
            result,
            SettlementResult::FacilitatorUnavailable { ref cause } if cause.contains("timed out")
        ));
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
