//! x402 resource server: gates HTTP endpoints behind 402 payments.
//!
//! Unpaid requests to a protected route get a 402 challenge. A request that
//! carries an `X-PAYMENT` authorization is settled through the facilitator,
//! and the resource is only served once settlement succeeds.
//!
//! # Modules
//!
//! - [`config`]: environment settings ([`ServerConfig`]) and route registration ([`PaymentConfigBuilder`])
//! - [`middleware`]: [`require_payment`], which maps gate outcomes onto HTTP responses
//! - [`metrics`]: Prometheus counters and the [`MetricsObserver`](metrics::MetricsObserver)
//! - [`routes`]: the free, paid, health and metrics endpoints

pub mod config;
pub mod metrics;
pub mod middleware;
pub mod routes;

pub use config::{PaymentConfig, PaymentConfigBuilder, ServerConfig};
pub use middleware::{require_payment, PaidAccess};
pub use routes::{configure, AppState, MetricsAccess};
