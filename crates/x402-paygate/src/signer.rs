use alloy::primitives::{Address, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;

use crate::codec::unix_now;
use crate::eip712::{encode_signature_hex, random_nonce, signing_hash};
use crate::scheme::{Signer, SigningRequest};
use crate::{
    NetworkConfig, PaymentAuthorization, SignedTransfer, TransferWithAuthorization, X402Error,
    SCHEME_EXACT,
};

/// Seconds of clock skew tolerated on the `validAfter` side.
const VALID_AFTER_SKEW_SECS: u64 = 60;

/// Signs `exact` authorizations with a local private key.
///
/// Bound to one network: requests for any other network, asset, or scheme
/// are declined rather than signed under the wrong EIP-712 domain.
pub struct LocalSigner {
    signer: PrivateKeySigner,
    config: NetworkConfig,
}

impl LocalSigner {
    /// Signer for Base Sepolia.
    pub fn new(signer: PrivateKeySigner) -> Self {
        Self {
            signer,
            config: NetworkConfig::default(),
        }
    }

    pub fn with_network(signer: PrivateKeySigner, config: NetworkConfig) -> Self {
        Self { signer, config }
    }

    /// Parse a 0x-prefixed hex private key.
    pub fn from_private_key(key: &str, config: NetworkConfig) -> Result<Self, X402Error> {
        let signer: PrivateKeySigner = key
            .trim()
            .parse()
            .map_err(|e| X402Error::ConfigError(format!("invalid private key: {e}")))?;
        Ok(Self::with_network(signer, config))
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn network(&self) -> &NetworkConfig {
        &self.config
    }

    fn check(&self, request: &SigningRequest) -> Result<(), X402Error> {
        if request.scheme != SCHEME_EXACT {
            return Err(X402Error::UnsupportedScheme(request.scheme.clone()));
        }
        if request.network != self.config.network {
            return Err(X402Error::UnsupportedScheme(format!(
                "signer is bound to {}, challenge is for {}",
                self.config.network, request.network
            )));
        }
        if request.asset != self.config.asset {
            return Err(X402Error::InvalidPayment(format!(
                "unexpected asset {} on {}",
                request.asset, self.config.network
            )));
        }
        if request.price > request.ceiling {
            return Err(X402Error::SpendingCeilingExceeded {
                cheapest: request.price,
                ceiling: request.ceiling,
            });
        }
        Ok(())
    }
}

impl Signer for LocalSigner {
    async fn authorize(&self, request: &SigningRequest) -> Result<PaymentAuthorization, X402Error> {
        self.check(request)?;

        let now = unix_now();
        let valid_after = now.saturating_sub(VALID_AFTER_SKEW_SECS);
        let valid_before = now.saturating_add(request.max_timeout_seconds);
        let nonce = random_nonce();

        let transfer = TransferWithAuthorization {
            from: self.signer.address(),
            to: request.recipient,
            value: U256::from(request.price),
            validAfter: U256::from(valid_after),
            validBefore: U256::from(valid_before),
            nonce,
        };

        let sig = self
            .signer
            .sign_hash_sync(&signing_hash(&transfer, &self.config))
            .map_err(|e| X402Error::SignatureError(format!("signing failed: {e}")))?;

        tracing::debug!(
            payer = %self.signer.address(),
            recipient = %request.recipient,
            price = request.price,
            network = %request.network,
            "signed payment authorization"
        );

        Ok(PaymentAuthorization {
            x402_version: request.x402_version,
            scheme: request.scheme.clone(),
            network: request.network.clone(),
            payload: SignedTransfer {
                from: self.signer.address(),
                to: request.recipient,
                value: request.price.to_string(),
                valid_after,
                valid_before,
                nonce,
                signature: encode_signature_hex(&sig),
            },
        })
    }
}
