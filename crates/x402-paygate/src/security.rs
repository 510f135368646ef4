//! Secret comparison helpers.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Compare two secrets without leaking content or length through timing.
///
/// Both sides are hashed to fixed-length digests first.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let ha = Sha256::digest(a);
    let hb = Sha256::digest(b);
    ha.ct_eq(&hb).into()
}

/// Check an `Authorization` header value of the form `Bearer <token>`.
pub fn bearer_token_matches(authorization: Option<&str>, expected: &str) -> bool {
    let presented = authorization
        .and_then(|value| value.strip_prefix("Bearer "))
        .unwrap_or("");
    constant_time_eq(presented.as_bytes(), expected.as_bytes())
}
