//! EIP-712 typed-data signing for EIP-3009 `TransferWithAuthorization`.
//!
//! - [`transfer_domain`]: the token contract's signing domain
//! - [`signing_hash`]: digest a signer signs over
//! - [`verify_signature`]: recover the signer, with EIP-2 malleability check
//! - [`random_nonce`] and [`encode_signature_hex`]: helpers for building payloads

use alloy::primitives::{keccak256, Address, FixedBytes, Signature, B256, U256};
use alloy::sol_types::{Eip712Domain, SolStruct};

use crate::{NetworkConfig, TransferWithAuthorization, X402Error};

/// EIP-712 domain of the network's payment token.
pub fn transfer_domain(config: &NetworkConfig) -> Eip712Domain {
    Eip712Domain {
        name: Some(std::borrow::Cow::Owned(config.eip712_domain_name.clone())),
        version: Some(std::borrow::Cow::Owned(
            config.eip712_domain_version.clone(),
        )),
        chain_id: Some(U256::from(config.chain_id)),
        verifying_contract: Some(config.asset),
        salt: None,
    }
}

pub fn signing_hash(transfer: &TransferWithAuthorization, config: &NetworkConfig) -> B256 {
    transfer.eip712_signing_hash(&transfer_domain(config))
}

/// secp256k1 curve order N / 2. Signatures with s above this are malleable (EIP-2).
const SECP256K1_N_DIV_2: U256 = U256::from_limbs([
    0xBFD25E8CD0364140,
    0xBAAEDCE6AF48A03B,
    0xFFFFFFFFFFFFFFFE,
    0x7FFFFFFFFFFFFFFF,
]);

/// Recover the address that signed `transfer`. Rejects high-s signatures.
pub fn verify_signature(
    transfer: &TransferWithAuthorization,
    signature_bytes: &[u8],
    config: &NetworkConfig,
) -> Result<Address, X402Error> {
    if signature_bytes.len() != 65 {
        return Err(X402Error::SignatureError(format!(
            "signature must be 65 bytes, got {}",
            signature_bytes.len()
        )));
    }

    let sig = Signature::from_raw(signature_bytes)
        .map_err(|e| X402Error::SignatureError(format!("invalid signature: {e}")))?;

    if sig.s() > SECP256K1_N_DIV_2 {
        return Err(X402Error::SignatureError(
            "high-s signature rejected (EIP-2 malleability)".to_string(),
        ));
    }

    sig.recover_address_from_prehash(&signing_hash(transfer, config))
        .map_err(|e| X402Error::SignatureError(format!("recovery failed: {e}")))
}

/// Random 32-byte authorization nonce (keccak256 of 32 CSPRNG bytes).
pub fn random_nonce() -> FixedBytes<32> {
    let mut bytes = [0u8; 32];
    rand::fill(&mut bytes);
    keccak256(bytes)
}

/// 0x-prefixed 65-byte hex, v as 27/28 in the last byte.
pub fn encode_signature_hex(sig: &Signature) -> String {
    format!("0x{}", alloy::hex::encode(sig.as_bytes()))
}

/// Parse a 0x-prefixed hex signature back to raw bytes.
pub fn decode_signature_hex(signature: &str) -> Result<Vec<u8>, X402Error> {
    alloy::hex::decode(signature.strip_prefix("0x").unwrap_or(signature))
        .map_err(|e| X402Error::SignatureError(format!("invalid signature hex: {e}")))
}
