use actix_cors::Cors;
use actix_governor::{Governor, GovernorConfigBuilder};
use actix_web::{web, App, HttpServer};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use x402::{
    codec, CompositeObserver, HttpSettlementService, InMemoryNonceStore, NonceStore, PaymentGate,
    SettlementClient, TracingObserver,
};
use x402_server::config::{PaymentConfig, ServerConfig};
use x402_server::metrics::MetricsObserver;
use x402_server::{configure, AppState, MetricsAccess};

/// How often claimed nonces are swept when the replay guard is on.
const NONCE_PURGE_INTERVAL: Duration = Duration::from_secs(60);

fn build_cors(origins: &[String]) -> Cors {
    if origins.is_empty() {
        Cors::default()
            .allowed_origin_fn(|origin, _| {
                origin
                    .to_str()
                    .map(|o| o == "http://localhost" || o.starts_with("http://localhost:"))
                    .unwrap_or(false)
            })
            .allow_any_method()
            .allow_any_header()
            .expose_headers(["X-PAYMENT-RESPONSE"])
            .max_age(3600)
    } else {
        let mut cors = Cors::default();
        for origin in origins {
            cors = cors.allowed_origin(origin);
        }
        cors.allow_any_method()
            .allow_any_header()
            .expose_headers(["X-PAYMENT-RESPONSE"])
            .max_age(3600)
    }
}

fn invalid_config(e: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };
    let payment = PaymentConfig::from_server_config(&config).map_err(invalid_config)?;

    let http = reqwest::Client::builder()
        .build()
        .map_err(invalid_config)?;
    let mut service = HttpSettlementService::new(http, &config.facilitator_url);
    if let Some(secret) = &config.hmac_secret {
        service = service.with_hmac_secret(secret.clone());
    }

    let mut observer = CompositeObserver::default();
    observer.push(Arc::new(TracingObserver));
    observer.push(Arc::new(MetricsObserver));
    let mut gate =
        PaymentGate::new(SettlementClient::new(service)).with_observer(Arc::new(observer));

    if config.replay_guard {
        let store = Arc::new(InMemoryNonceStore::new());
        gate = gate.with_replay_guard(store.clone());

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(NONCE_PURGE_INTERVAL);
            loop {
                interval.tick().await;
                store.purge_expired(codec::unix_now());
            }
        });
        tracing::info!(
            sweep_secs = NONCE_PURGE_INTERVAL.as_secs(),
            "replay guard enabled"
        );
    }

    let state = web::Data::new(AppState {
        payment,
        gate,
        metrics: MetricsAccess {
            token: config.metrics_token.clone(),
            public: config.public_metrics,
        },
    });

    let port = config.port;
    let cors_origins = config.allowed_origins.clone();

    tracing::info!("x402 server listening at http://localhost:{port}");
    tracing::info!(
        network = %config.network.network,
        price = %config.paid_price,
        pay_to = %config.pay_to,
        facilitator = %config.facilitator_url,
        "Endpoints: GET /api/free, GET /api/paid-data, GET /health, GET /metrics"
    );
    tracing::info!("Rate limit: {} req/min per IP", config.rate_limit_rpm);

    let governor_conf = GovernorConfigBuilder::default()
        .requests_per_minute(config.rate_limit_rpm)
        .finish()
        .ok_or_else(|| invalid_config("failed to build rate limiter config"))?;

    HttpServer::new(move || {
        App::new()
            .wrap(build_cors(&cors_origins))
            .wrap(Governor::new(&governor_conf))
            .app_data(state.clone())
            .configure(configure::<HttpSettlementService>)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
