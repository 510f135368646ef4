use alloy::primitives::{Address, FixedBytes, U256};
use serde::{Deserialize, Serialize};

use crate::{TransferWithAuthorization, X402Error};

/// Signed transfer authorization (EIP-3009 `transferWithAuthorization` fields
/// plus the EIP-712 signature over them).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedTransfer {
    pub from: Address,
    pub to: Address,
    /// Amount in token minor units, as a decimal string.
    pub value: String,
    pub valid_after: u64,
    pub valid_before: u64,
    pub nonce: FixedBytes<32>,
    pub signature: String,
}

impl SignedTransfer {
    /// Rebuild the typed struct the signature was computed over.
    pub fn to_typed(&self) -> Result<TransferWithAuthorization, X402Error> {
        let value = self
            .value
            .parse::<U256>()
            .map_err(|e| X402Error::InvalidPayment(format!("invalid value '{}': {e}", self.value)))?;
        Ok(TransferWithAuthorization {
            from: self.from,
            to: self.to,
            value,
            validAfter: U256::from(self.valid_after),
            validBefore: U256::from(self.valid_before),
            nonce: self.nonce,
        })
    }
}

/// Wire-format payment authorization (sent in the `X-PAYMENT` header,
/// base64-encoded JSON).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentAuthorization {
    pub x402_version: u32,
    pub scheme: String,
    pub network: String,
    pub payload: SignedTransfer,
}

/// A single entry in the `accepts` array of a 402 challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    pub scheme: String,
    pub network: String,
    pub price_minor_units: u64,
    pub currency: String,
    pub asset: Address,
    pub pay_to: Address,
    pub resource: String,
    pub description: String,
    pub mime_type: String,
    pub max_timeout_seconds: u64,
}

/// The 402 response body returned by the resource server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentChallenge {
    pub x402_version: u32,
    pub accepts: Vec<PaymentRequirements>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<String>,
}
