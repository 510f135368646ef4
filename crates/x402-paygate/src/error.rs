use thiserror::Error;

/// Errors returned by x402 operations.
#[derive(Debug, Error)]
pub enum X402Error {
    /// Every entry of a 402 challenge costs more than the caller allows.
    /// Raised before the signer is ever invoked.
    #[error("spending ceiling exceeded: cheapest option costs {cheapest}, ceiling is {ceiling}")]
    SpendingCeilingExceeded { cheapest: u64, ceiling: u64 },

    /// The signer refused or failed to produce an authorization.
    #[error("authorization declined: {0}")]
    AuthorizationDeclined(String),

    #[error("signature error: {0}")]
    SignatureError(String),

    #[error("invalid payment: {0}")]
    InvalidPayment(String),

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("config error: {0}")]
    ConfigError(String),

    #[error("http error: {0}")]
    HttpError(String),

    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}
