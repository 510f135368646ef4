use alloy::primitives::{address, Address};

/// Protocol version carried in challenges and authorizations.
pub const X402_VERSION: u32 = 1;

/// Request header carrying the encoded [`PaymentAuthorization`](crate::PaymentAuthorization).
pub const PAYMENT_HEADER: &str = "X-PAYMENT";

/// Response header carrying the encoded settlement receipt on success.
pub const PAYMENT_RESPONSE_HEADER: &str = "X-PAYMENT-RESPONSE";

/// Signed-authorization-per-request scheme (EIP-3009 `transferWithAuthorization`).
pub const SCHEME_EXACT: &str = "exact";

/// Network identifier for Base Sepolia.
pub const BASE_SEPOLIA: &str = "base-sepolia";

/// Network identifier for Base mainnet.
pub const BASE_MAINNET: &str = "base";

/// USDC on Base Sepolia.
pub const BASE_SEPOLIA_USDC: Address = address!("0x036CbD53842c5426634e7929541eC2318f3dCF7e");

/// USDC on Base mainnet.
pub const BASE_MAINNET_USDC: Address = address!("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913");

/// USDC has 6 decimal places.
pub const USDC_DECIMALS: u32 = 6;

/// Runtime network configuration. Everything a route descriptor or a signer
/// needs to know about the chain a payment settles on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    pub network: String,
    pub chain_id: u64,
    pub currency: String,
    pub asset: Address,
    pub token_decimals: u32,
    pub eip712_domain_name: String,
    pub eip712_domain_version: String,
}

impl NetworkConfig {
    pub fn base_sepolia() -> Self {
        Self {
            network: BASE_SEPOLIA.to_string(),
            chain_id: 84532,
            currency: "USDC".to_string(),
            asset: BASE_SEPOLIA_USDC,
            token_decimals: USDC_DECIMALS,
            eip712_domain_name: "USDC".to_string(),
            eip712_domain_version: "2".to_string(),
        }
    }

    pub fn base() -> Self {
        Self {
            network: BASE_MAINNET.to_string(),
            chain_id: 8453,
            currency: "USDC".to_string(),
            asset: BASE_MAINNET_USDC,
            token_decimals: USDC_DECIMALS,
            eip712_domain_name: "USD Coin".to_string(),
            eip712_domain_version: "2".to_string(),
        }
    }

    /// Look up a known network by its identifier.
    pub fn by_name(network: &str) -> Option<Self> {
        match network {
            BASE_SEPOLIA => Some(Self::base_sepolia()),
            BASE_MAINNET => Some(Self::base()),
            _ => None,
        }
    }
}

impl Default for NetworkConfig {
    /// Defaults to Base Sepolia.
    fn default() -> Self {
        Self::base_sepolia()
    }
}
