use actix_web::{HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use x402::{
    codec, GateOutcome, PaymentChallenge, PaymentGate, RouteDescriptor, SettlementReceipt,
    SettlementService, PAYMENT_HEADER, PAYMENT_RESPONSE_HEADER,
};

use crate::config::PaymentConfig;
use crate::metrics::REQUESTS;

/// Proof that a request was paid for. Only produced for a settled payment.
#[derive(Debug, Clone)]
pub struct PaidAccess {
    pub receipt: SettlementReceipt,
    pub settled_at: DateTime<Utc>,
}

impl PaidAccess {
    /// Encoded receipt for the `X-PAYMENT-RESPONSE` header.
    pub fn receipt_header(&self) -> Option<(&'static str, String)> {
        match codec::encode_receipt(&self.receipt) {
            Ok(encoded) => Some((PAYMENT_RESPONSE_HEADER, encoded)),
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode settlement receipt header");
                None
            }
        }
    }
}

/// Look up the descriptor for a payment-gated request.
pub fn check_payment_gate<'a>(
    req: &HttpRequest,
    config: &'a PaymentConfig,
) -> Option<&'a RouteDescriptor> {
    config.get_route(req.method().as_str(), req.path())
}

/// 402 response carrying a challenge body.
pub fn payment_required_response(challenge: &PaymentChallenge) -> HttpResponse {
    HttpResponse::PaymentRequired().json(challenge)
}

/// Run the payment gate for `req`.
///
/// Returns `Ok(PaidAccess)` only after settlement; any other outcome is the
/// response to send as-is.
pub async fn require_payment<S: SettlementService + 'static>(
    req: &HttpRequest,
    config: &PaymentConfig,
    gate: &PaymentGate<S>,
) -> Result<PaidAccess, HttpResponse> {
    // Use the matched route pattern (not raw path) to prevent cardinality bombs
    let endpoint_label = req.match_pattern().unwrap_or_else(|| "unknown".to_string());

    let Some(route) = check_payment_gate(req, config) else {
        tracing::error!(
            method = %req.method(),
            path = %req.path(),
            "no payment route configured for gated handler"
        );
        REQUESTS
            .with_label_values(&[endpoint_label.as_str(), "500"])
            .inc();
        return Err(HttpResponse::InternalServerError().json(serde_json::json!({
            "error": "payment route not configured"
        })));
    };

    // A header that is not valid UTF-8 is present but undecodable, not absent.
    let payment_header = req
        .headers()
        .get(PAYMENT_HEADER)
        .map(|v| v.to_str().unwrap_or_default());

    let outcome = gate.process(route, payment_header).await;
    let status = outcome.status_code().to_string();
    REQUESTS
        .with_label_values(&[endpoint_label.as_str(), status.as_str()])
        .inc();

    match outcome {
        GateOutcome::Settled { receipt, timestamp } => Ok(PaidAccess {
            receipt,
            settled_at: timestamp,
        }),
        GateOutcome::PaymentRequired(challenge)
        | GateOutcome::Malformed(challenge)
        | GateOutcome::Rejected(challenge) => Err(payment_required_response(&challenge)),
        GateOutcome::Unavailable { .. } => Err(HttpResponse::BadGateway().json(serde_json::json!({
            "error": "payment processing failed"
        }))),
    }
}
