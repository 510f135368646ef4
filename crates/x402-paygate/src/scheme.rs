//! Capability traits for the three-party payment model.
//!
//! - [`Signer`]: produces a signed payment authorization (client)
//! - [`Transport`]: sends one HTTP request (client)
//! - [`SettlementService`]: verifies and settles an authorization (server)
//!
//! See [`crate::signer::LocalSigner`], [`crate::http_client::ReqwestTransport`]
//! and [`crate::facilitator_client::HttpSettlementService`] for the concrete
//! implementations.

use alloy::primitives::Address;

use crate::error::X402Error;
use crate::http_client::{FetchRequest, FetchResponse};
use crate::payment::{PaymentAuthorization, PaymentRequirements};
use crate::response::FacilitatorReply;
use crate::settlement::SettlementRequest;

/// What the signer is asked to authorize. Built from the selected
/// challenge entry after the spending ceiling has been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningRequest {
    pub x402_version: u32,
    pub scheme: String,
    pub network: String,
    /// Price in token minor units.
    pub price: u64,
    pub recipient: Address,
    pub asset: Address,
    /// Caller's spending ceiling, in the same units as `price`.
    pub ceiling: u64,
    pub max_timeout_seconds: u64,
}

impl SigningRequest {
    pub fn from_requirements(
        x402_version: u32,
        requirements: &PaymentRequirements,
        ceiling: u64,
    ) -> Self {
        Self {
            x402_version,
            scheme: requirements.scheme.clone(),
            network: requirements.network.clone(),
            price: requirements.price_minor_units,
            recipient: requirements.pay_to,
            asset: requirements.asset,
            ceiling,
            max_timeout_seconds: requirements.max_timeout_seconds,
        }
    }
}

/// Client-side: creates signed payment authorizations.
///
/// May suspend for user interaction. Returning an error declines the payment.
pub trait Signer: Send + Sync {
    fn authorize(
        &self,
        request: &SigningRequest,
    ) -> impl std::future::Future<Output = Result<PaymentAuthorization, X402Error>> + Send;
}

/// Client-side: sends a single HTTP request and buffers the response.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        request: &FetchRequest,
    ) -> impl std::future::Future<Output = Result<FetchResponse, X402Error>> + Send;
}

/// Server-side: the external facilitator that verifies and settles.
///
/// `Err` means the service could not be reached or did not answer; any
/// HTTP-level answer, including failures, comes back as a [`FacilitatorReply`].
pub trait SettlementService: Send + Sync {
    fn settle(
        &self,
        request: &SettlementRequest,
    ) -> impl std::future::Future<Output = Result<FacilitatorReply, X402Error>> + Send;
}
