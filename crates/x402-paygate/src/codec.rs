//! Payment header codec.
//!
//! `X-PAYMENT` carries a [`PaymentAuthorization`] as base64 (standard
//! alphabet) JSON. [`decode`] also runs the cheap pre-checks that do not need
//! the settlement service: supported scheme/network and expiry.

use base64::Engine;
use thiserror::Error;

use crate::route::RouteDescriptor;
use crate::{PaymentAuthorization, SettlementReceipt, X402Error, X402_VERSION};

/// Headers larger than this are rejected before base64 decoding.
pub const MAX_HEADER_BYTES: usize = 16 * 1024;

/// Why a payment header could not be accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("malformed payment header: {0}")]
    Malformed(String),

    #[error("unsupported scheme '{scheme}' on network '{network}'")]
    UnsupportedScheme { scheme: String, network: String },

    #[error("payment authorization expired at {valid_before} (now {now})")]
    Expired { valid_before: u64, now: u64 },
}

impl DecodeError {
    /// Stable machine-readable code, echoed as `reasonCode` in 402 bodies.
    pub fn code(&self) -> &'static str {
        match self {
            DecodeError::Malformed(_) => "malformed_payment",
            DecodeError::UnsupportedScheme { .. } => "unsupported_scheme",
            DecodeError::Expired { .. } => "authorization_expired",
        }
    }
}

/// Base64-encode a payment authorization for the `X-PAYMENT` header.
pub fn encode(authorization: &PaymentAuthorization) -> Result<String, X402Error> {
    let json = serde_json::to_vec(authorization)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(json))
}

/// Structural decode only: size, base64, JSON shape and protocol version.
pub fn decode_payload(header_value: &str) -> Result<PaymentAuthorization, DecodeError> {
    let trimmed = header_value.trim();
    if trimmed.is_empty() {
        return Err(DecodeError::Malformed("empty header".to_string()));
    }
    if trimmed.len() > MAX_HEADER_BYTES {
        return Err(DecodeError::Malformed(format!(
            "header is {} bytes, limit is {MAX_HEADER_BYTES}",
            trimmed.len()
        )));
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(trimmed)
        .map_err(|e| DecodeError::Malformed(format!("invalid base64: {e}")))?;
    let authorization: PaymentAuthorization = serde_json::from_slice(&bytes)
        .map_err(|e| DecodeError::Malformed(format!("invalid JSON payload: {e}")))?;

    if authorization.x402_version != X402_VERSION {
        return Err(DecodeError::Malformed(format!(
            "unsupported x402 version {}",
            authorization.x402_version
        )));
    }
    Ok(authorization)
}

/// Decode a payment header and check it against the route it was sent to.
///
/// `now` is unix seconds; an authorization is expired once `now >= validBefore`.
pub fn decode(
    header_value: &str,
    route: &RouteDescriptor,
    now: u64,
) -> Result<PaymentAuthorization, DecodeError> {
    let authorization = decode_payload(header_value)?;

    if !route.accepts(&authorization.scheme, &authorization.network) {
        return Err(DecodeError::UnsupportedScheme {
            scheme: authorization.scheme,
            network: authorization.network,
        });
    }

    let valid_before = authorization.payload.valid_before;
    if now >= valid_before {
        return Err(DecodeError::Expired { valid_before, now });
    }

    Ok(authorization)
}

/// Base64-encode a settlement receipt for the `X-PAYMENT-RESPONSE` header.
pub fn encode_receipt(receipt: &SettlementReceipt) -> Result<String, X402Error> {
    let json = serde_json::to_vec(receipt)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(json))
}

/// Decode an `X-PAYMENT-RESPONSE` header. Accepts base64 JSON or plain JSON.
pub fn decode_receipt(header_value: &str) -> Option<SettlementReceipt> {
    base64::engine::general_purpose::STANDARD
        .decode(header_value.trim())
        .ok()
        .and_then(|bytes| serde_json::from_slice::<SettlementReceipt>(&bytes).ok())
        .or_else(|| serde_json::from_str::<SettlementReceipt>(header_value).ok())
}

/// Current unix time in seconds.
pub fn unix_now() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::RouteDescriptor;
    use crate::{NetworkConfig, SignedTransfer, SCHEME_EXACT};
    use alloy::primitives::{Address, FixedBytes};

    fn route() -> RouteDescriptor {
        RouteDescriptor::new(
            "http://localhost:3001/api/paid-data",
            "GET",
            10_000,
            Address::repeat_byte(0x11),
            &NetworkConfig::base_sepolia(),
        )
    }

    fn sample(valid_before: u64) -> PaymentAuthorization {
        PaymentAuthorization {
            x402_version: 1,
            scheme: SCHEME_EXACT.to_string(),
            network: "base-sepolia".to_string(),
            payload: SignedTransfer {
                from: Address::repeat_byte(0x22),
                to: Address::repeat_byte(0x11),
                value: "10000".to_string(),
                valid_after: 0,
                valid_before,
                nonce: FixedBytes::repeat_byte(0x07),
                signature: "0xdead".to_string(),
            },
        }
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let auth = sample(2_000);
        let encoded = encode(&auth).unwrap();
        assert_eq!(decode(&encoded, &route(), 1_000).unwrap(), auth);
        assert_eq!(decode_payload(&encoded).unwrap(), auth);
    }

    #[test]
    fn test_decode_invalid_base64() {
        let err = decode("not-valid-base64!!!", &route(), 0).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(ref m) if m.contains("invalid base64")));
        assert_eq!(err.code(), "malformed_payment");
    }

    #[test]
    fn test_decode_invalid_json() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"this is not json");
        let err = decode(&encoded, &route(), 0).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(ref m) if m.contains("invalid JSON")));
    }

    #[test]
    fn test_decode_missing_fields() {
        let encoded = base64::engine::general_purpose::STANDARD
            .encode(br#"{"x402Version":1,"scheme":"exact","network":"base-sepolia"}"#);
        assert!(matches!(
            decode(&encoded, &route(), 0),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_empty_and_oversize() {
        assert!(matches!(decode("   ", &route(), 0), Err(DecodeError::Malformed(_))));
        let huge = "A".repeat(MAX_HEADER_BYTES + 4);
        assert!(matches!(decode(&huge, &route(), 0), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn test_decode_wrong_version() {
        let mut auth = sample(2_000);
        auth.x402_version = 2;
        let encoded = encode(&auth).unwrap();
        assert!(matches!(
            decode(&encoded, &route(), 0),
            Err(DecodeError::Malformed(ref m)) if m.contains("version")
        ));
    }

    #[test]
    fn test_decode_unsupported_scheme() {
        let mut auth = sample(2_000);
        auth.scheme = "upto".to_string();
        let encoded = encode(&auth).unwrap();
        let err = decode(&encoded, &route(), 0).unwrap_err();
        assert_eq!(
            err,
            DecodeError::UnsupportedScheme {
                scheme: "upto".to_string(),
                network: "base-sepolia".to_string()
            }
        );
        assert_eq!(err.code(), "unsupported_scheme");
    }

    #[test]
    fn test_decode_network_mismatch_is_unsupported() {
        let mut auth = sample(2_000);
        auth.network = "base".to_string();
        let encoded = encode(&auth).unwrap();
        assert!(matches!(
            decode(&encoded, &route(), 0),
            Err(DecodeError::UnsupportedScheme { .. })
        ));
    }

    #[test]
    fn test_decode_expired() {
        let encoded = encode(&sample(1_000)).unwrap();
        let err = decode(&encoded, &route(), 1_000).unwrap_err();
        assert_eq!(
            err,
            DecodeError::Expired {
                valid_before: 1_000,
                now: 1_000
            }
        );
        assert_eq!(err.code(), "authorization_expired");
        assert!(decode(&encoded, &route(), 999).is_ok());
    }

    #[test]
    fn test_receipt_header_roundtrip_and_plain_json() {
        let receipt = SettlementReceipt {
            success: Some(true),
            transaction: Some("0xabc".to_string()),
            network: Some("base-sepolia".to_string()),
            ..Default::default()
        };
        let encoded = encode_receipt(&receipt).unwrap();
        assert_eq!(decode_receipt(&encoded), Some(receipt));

        let plain = decode_receipt(r#"{"transaction":"0x1"}"#).unwrap();
        assert_eq!(plain.transaction.as_deref(), Some("0x1"));
        assert!(decode_receipt("%%%").is_none());
    }
}
