//! Fetch a paid resource, paying at most `MAX_PAYMENT` once.
//!
//! Environment:
//! - `EVM_PRIVATE_KEY` (required): 0x-prefixed hex key of the paying wallet
//! - `RESOURCE_URL`: defaults to `http://localhost:3001/api/paid-data`
//! - `MAX_PAYMENT`: spending ceiling, defaults to `$1`
//! - `NETWORK`: `base-sepolia` (default) or `base`

use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use x402::{
    FetchRequest, LocalSigner, NetworkConfig, PaymentFetcher, ReqwestTransport, SpendingCeiling,
    TracingObserver, X402Error,
};

const DEFAULT_RESOURCE_URL: &str = "http://localhost:3001/api/paid-data";

async fn run() -> Result<(), X402Error> {
    let key = std::env::var("EVM_PRIVATE_KEY")
        .map_err(|_| X402Error::ConfigError("EVM_PRIVATE_KEY must be set".to_string()))?;
    let url = std::env::var("RESOURCE_URL").unwrap_or_else(|_| DEFAULT_RESOURCE_URL.to_string());
    let network_name = std::env::var("NETWORK").unwrap_or_else(|_| x402::BASE_SEPOLIA.to_string());
    let network = NetworkConfig::by_name(&network_name)
        .ok_or_else(|| X402Error::ConfigError(format!("unknown network: {network_name}")))?;
    let max_payment = std::env::var("MAX_PAYMENT").unwrap_or_else(|_| "$1".to_string());
    let ceiling = SpendingCeiling::parse(&max_payment, network.token_decimals)?;

    let signer = LocalSigner::from_private_key(&key, network)?;
    tracing::info!(
        payer = %signer.address(),
        network = %signer.network().network,
        ceiling = ceiling.minor_units(),
        url = %url,
        "fetching resource"
    );

    let fetcher = PaymentFetcher::new(ReqwestTransport::new()?, signer, ceiling)
        .with_observer(Arc::new(TracingObserver));
    let (resp, receipt) = fetcher.fetch(&FetchRequest::get(&url)).await?;

    match &receipt {
        Some(receipt) => tracing::info!(
            transaction = receipt.transaction.as_deref().unwrap_or("-"),
            network = receipt.network.as_deref().unwrap_or("-"),
            "payment settled"
        ),
        None => tracing::info!(status = resp.status, "no settlement receipt"),
    }

    let body = match resp.json::<serde_json::Value>() {
        Ok(json) => serde_json::to_string_pretty(&json)?,
        Err(_) => resp.text(),
    };
    println!("HTTP {}\n{body}", resp.status);

    if resp.status >= 400 {
        return Err(X402Error::HttpError(format!(
            "server answered with status {}",
            resp.status
        )));
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "x402 client failed");
        std::process::exit(1);
    }
}
