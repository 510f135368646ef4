//! x402 pay-per-request over HTTP 402.
//!
//! A protected route answers an unpaid request with `402 Payment Required`
//! and a machine-readable challenge. The client signs an EIP-3009
//! `TransferWithAuthorization` for the quoted price and retries once with the
//! `X-PAYMENT` header. The server hands that authorization to a facilitator,
//! which verifies and settles it, and only then releases the resource.
//!
//! # Three-party model
//!
//! - **Client** ([`PaymentFetcher`] + [`LocalSigner`]): pays at most once per request
//! - **Server** ([`PaymentGate`]): builds challenges, decodes headers, releases on settlement
//! - **Facilitator** ([`HttpSettlementService`]): verifies signatures and settles on-chain
//!
//! # Quick example (client)
//!
//! ```no_run
//! use x402::{FetchRequest, LocalSigner, NetworkConfig, PaymentFetcher, ReqwestTransport, SpendingCeiling};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), x402::X402Error> {
//! let signer = LocalSigner::from_private_key("0xYOUR_KEY", NetworkConfig::base_sepolia())?;
//! let fetcher = PaymentFetcher::new(ReqwestTransport::new()?, signer, SpendingCeiling(1_000_000));
//!
//! let (resp, receipt) = fetcher
//!     .fetch(&FetchRequest::get("http://localhost:3001/api/paid-data"))
//!     .await?;
//! # Ok(())
//! # }
//! ```

// Core types and traits
pub mod constants;
pub mod error;
pub mod events;
pub mod payment;
pub mod response;
pub mod scheme;

// Server side
pub mod codec;
pub mod facilitator_client;
pub mod gate;
pub mod nonce_store;
pub mod route;
pub mod settlement;

// Client side
pub mod eip712;
pub mod http_client;
pub mod signer;

// Shared secrets
pub mod hmac;
pub mod security;

use alloy::sol;

// EIP-3009 authorization as signed under the token's EIP-712 domain.
// The sol! macro derives SolStruct, which provides eip712_signing_hash().
sol! {
    #[derive(Debug, PartialEq, Eq)]
    struct TransferWithAuthorization {
        address from;
        address to;
        uint256 value;
        uint256 validAfter;
        uint256 validBefore;
        bytes32 nonce;
    }
}

// Re-exports
pub use constants::*;
pub use error::X402Error;
pub use payment::*;
pub use response::*;
pub use scheme::{SettlementService, Signer, SigningRequest, Transport};

pub use codec::DecodeError;
pub use events::{
    CompositeObserver, FetchState, GateState, NoopObserver, PaymentEvent, PaymentObserver,
    RecordingObserver, TracingObserver,
};
pub use facilitator_client::HttpSettlementService;
pub use gate::{GateOutcome, PaymentGate};
pub use http_client::{FetchRequest, FetchResponse, PaymentFetcher, ReqwestTransport, SpendingCeiling};
pub use nonce_store::{InMemoryNonceStore, NonceStore};
pub use route::{describe, parse_price, RouteDescriptor};
pub use settlement::{classify, SettlementClient, SettlementRequest};
pub use signer::LocalSigner;
