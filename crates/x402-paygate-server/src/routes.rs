use actix_web::{web, HttpRequest, HttpResponse};
use x402::security::bearer_token_matches;
use x402::{PaymentGate, SettlementService};

use crate::config::{PaymentConfig, PAID_DATA_PATH};
use crate::metrics::{metrics_output, REQUESTS};
use crate::middleware::require_payment;

/// Who may read `/metrics`.
#[derive(Debug, Clone, Default)]
pub struct MetricsAccess {
    /// Bearer token required when set.
    pub token: Option<String>,
    /// Serve metrics unauthenticated when no token is configured.
    pub public: bool,
}

/// Shared, read-only state for every worker.
pub struct AppState<S> {
    pub payment: PaymentConfig,
    pub gate: PaymentGate<S>,
    pub metrics: MetricsAccess,
}

/// Register every endpoint on an actix `App`.
pub fn configure<S: SettlementService + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/free", web::get().to(free))
        .route(PAID_DATA_PATH, web::get().to(paid_data::<S>))
        .route("/health", web::get().to(health))
        .route("/metrics", web::get().to(metrics_endpoint::<S>));
}

pub async fn free() -> HttpResponse {
    REQUESTS.with_label_values(&["/api/free", "200"]).inc();
    HttpResponse::Ok().json(serde_json::json!({
        "message": "This is a free endpoint, no payment required!"
    }))
}

pub async fn paid_data<S: SettlementService + 'static>(
    req: HttpRequest,
    state: web::Data<AppState<S>>,
) -> HttpResponse {
    let access = match require_payment(&req, &state.payment, &state.gate).await {
        Ok(access) => access,
        Err(resp) => return resp,
    };

    let mut resp = HttpResponse::Ok();
    if let Some(header) = access.receipt_header() {
        resp.insert_header(header);
    }
    resp.json(serde_json::json!({
        "message": "Payment successful! Here is your premium data.",
        "data": {
            "premium": true,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "info": "This is exclusive paid content accessible only after payment.",
        },
        "payment": {
            "settled": true,
            "transaction": access.receipt.transaction,
            "network": access.receipt.network,
        },
    }))
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": "x402-paygate-server",
    }))
}

pub async fn metrics_endpoint<S: SettlementService + 'static>(
    req: HttpRequest,
    state: web::Data<AppState<S>>,
) -> HttpResponse {
    match &state.metrics.token {
        Some(expected) => {
            let presented = req
                .headers()
                .get("authorization")
                .and_then(|v| v.to_str().ok());
            if !bearer_token_matches(presented, expected) {
                return HttpResponse::Unauthorized().json(serde_json::json!({
                    "error": "unauthorized",
                    "message": "Valid Bearer token required for /metrics"
                }));
            }
        }
        None => {
            // No token configured: metrics are protected by default.
            if !state.metrics.public {
                return HttpResponse::Forbidden().json(serde_json::json!({
                    "error": "forbidden",
                    "message": "Set METRICS_TOKEN or X402_PUBLIC_METRICS=true to access /metrics"
                }));
            }
        }
    }

    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(metrics_output())
}
