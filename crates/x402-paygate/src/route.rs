//! Static description of a payment-gated resource and its 402 challenge.

use alloy::primitives::Address;

use crate::{
    NetworkConfig, PaymentChallenge, PaymentRequirements, X402Error, SCHEME_EXACT, X402_VERSION,
};

/// Default validity window offered to clients, in seconds.
pub const DEFAULT_MAX_TIMEOUT_SECONDS: u64 = 300;

/// Everything the server advertises and enforces for one protected route.
///
/// Built once at startup; the settlement client always takes price, asset and
/// recipient from here, never from client-supplied data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDescriptor {
    pub resource_url: String,
    pub method: String,
    pub price_minor_units: u64,
    pub currency: String,
    pub network: String,
    pub asset: Address,
    pub pay_to: Address,
    pub description: String,
    pub mime_type: String,
    pub max_timeout_seconds: u64,
    pub schemes: Vec<String>,
}

impl RouteDescriptor {
    /// Route priced in the network's settlement token, accepting the `exact` scheme.
    pub fn new(
        resource_url: &str,
        method: &str,
        price_minor_units: u64,
        pay_to: Address,
        network: &NetworkConfig,
    ) -> Self {
        Self {
            resource_url: resource_url.to_string(),
            method: method.to_ascii_uppercase(),
            price_minor_units,
            currency: network.currency.clone(),
            network: network.network.clone(),
            asset: network.asset,
            pay_to,
            description: String::new(),
            mime_type: "application/json".to_string(),
            max_timeout_seconds: DEFAULT_MAX_TIMEOUT_SECONDS,
            schemes: vec![SCHEME_EXACT.to_string()],
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_mime_type(mut self, mime_type: &str) -> Self {
        self.mime_type = mime_type.to_string();
        self
    }

    /// Zero is bumped to one second; a zero timeout could never settle.
    pub fn with_max_timeout_seconds(mut self, seconds: u64) -> Self {
        self.max_timeout_seconds = seconds.max(1);
        self
    }

    pub fn with_schemes(mut self, schemes: &[&str]) -> Self {
        self.schemes = schemes.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Whether this route honors the given scheme/network pair.
    pub fn accepts(&self, scheme: &str, network: &str) -> bool {
        network == self.network && self.schemes.iter().any(|s| s == scheme)
    }

    /// One `accepts` entry per scheme, in configuration order.
    pub fn requirements(&self) -> Vec<PaymentRequirements> {
        self.schemes
            .iter()
            .map(|scheme| PaymentRequirements {
                scheme: scheme.clone(),
                network: self.network.clone(),
                price_minor_units: self.price_minor_units,
                currency: self.currency.clone(),
                asset: self.asset,
                pay_to: self.pay_to,
                resource: self.resource_url.clone(),
                description: self.description.clone(),
                mime_type: self.mime_type.clone(),
                max_timeout_seconds: self.max_timeout_seconds,
            })
            .collect()
    }

    pub fn describe(&self) -> PaymentChallenge {
        describe(self)
    }
}

/// Project a route into the 402 challenge a client needs to pay for it.
/// Pure: no clock, no I/O, no randomness.
pub fn describe(route: &RouteDescriptor) -> PaymentChallenge {
    PaymentChallenge {
        x402_version: X402_VERSION,
        accepts: route.requirements(),
        error: None,
        reason_code: None,
    }
}

/// Parse a human-readable price (e.g. `"$0.01"`) into token minor units.
///
/// Integer-only: the fractional part is padded or truncated to `decimals`
/// digits. No f64 anywhere in the pipeline.
pub fn parse_price(price: &str, decimals: u32) -> Result<u64, X402Error> {
    let cleaned: String = price
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    if cleaned.is_empty() {
        return Err(X402Error::InvalidPayment(format!(
            "invalid price '{price}': no numeric content"
        )));
    }

    let overflow = || X402Error::InvalidPayment(format!("invalid price '{price}': overflow"));
    let multiplier = 10u64.checked_pow(decimals).ok_or_else(overflow)?;

    let (integer_part, fractional_part) = cleaned.split_once('.').unwrap_or((cleaned.as_str(), ""));

    let integer: u64 = if integer_part.is_empty() {
        0
    } else {
        integer_part.parse::<u64>().map_err(|e| {
            X402Error::InvalidPayment(format!("invalid price '{price}': integer part: {e}"))
        })?
    };

    let decimals = decimals as usize;
    let frac_str = if fractional_part.len() > decimals {
        &fractional_part[..decimals]
    } else {
        fractional_part
    };

    let fractional: u64 = if frac_str.is_empty() {
        0
    } else {
        frac_str.parse::<u64>().map_err(|e| {
            X402Error::InvalidPayment(format!("invalid price '{price}': fractional part: {e}"))
        })?
    };

    // "0.01" with 6 decimals is 01 scaled by 10^4
    let scale = 10u64.pow((decimals - frac_str.len()) as u32);

    let integer_units = integer.checked_mul(multiplier).ok_or_else(overflow)?;
    let fractional_units = fractional.checked_mul(scale).ok_or_else(overflow)?;
    integer_units.checked_add(fractional_units).ok_or_else(overflow)
}
