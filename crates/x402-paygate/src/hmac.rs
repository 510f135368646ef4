//! HMAC-SHA256 request signing between the resource server and its facilitator.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the hex MAC of the request body.
pub const FACILITATOR_AUTH_HEADER: &str = "X-Facilitator-Auth";

/// Hex-encoded HMAC-SHA256 of `body` under `secret`.
pub fn compute_hmac(secret: &[u8], body: &[u8]) -> String {
    let mut mac = new_mac(secret);
    mac.update(body);
    alloy::hex::encode(mac.finalize().into_bytes())
}

fn new_mac(secret: &[u8]) -> HmacSha256 {
    // HMAC is defined for keys of any length
    match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC accepts any key length"),
    }
}
