use alloy::primitives::Address;
use std::collections::HashMap;
use x402::route::DEFAULT_MAX_TIMEOUT_SECONDS;
use x402::{parse_price, NetworkConfig, RouteDescriptor, X402Error};

/// Price of `GET /api/paid-data` unless `PAID_PRICE` overrides it.
pub const DEFAULT_PAID_PRICE: &str = "$0.01";

/// Path of the paid demo resource.
pub const PAID_DATA_PATH: &str = "/api/paid-data";

/// Process-wide settings, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Absolute origin used to build each route's `resource` URL.
    pub public_base_url: String,
    pub pay_to: Address,
    pub network: NetworkConfig,
    pub paid_price: String,
    pub max_timeout_seconds: u64,
    pub facilitator_url: String,
    pub hmac_secret: Option<Vec<u8>>,
    pub rate_limit_rpm: u64,
    pub allowed_origins: Vec<String>,
    pub replay_guard: bool,
    pub metrics_token: Option<String>,
    pub public_metrics: bool,
}

fn flag(value: Option<String>) -> bool {
    value.map(|v| v == "true" || v == "1").unwrap_or(false)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, X402Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. `from_env` passes `std::env::var`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, X402Error> {
        let port: u16 = match non_empty(lookup("PORT")) {
            Some(p) => p
                .parse()
                .map_err(|e| X402Error::ConfigError(format!("invalid PORT '{p}': {e}")))?,
            None => 3001,
        };

        let public_base_url = non_empty(lookup("PUBLIC_BASE_URL"))
            .unwrap_or_else(|| format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_string();

        let wallet = non_empty(lookup("SERVER_WALLET_ADDRESS"))
            .ok_or_else(|| X402Error::ConfigError("SERVER_WALLET_ADDRESS must be set".to_string()))?;
        let pay_to: Address = wallet.parse().map_err(|e| {
            X402Error::ConfigError(format!("invalid SERVER_WALLET_ADDRESS '{wallet}': {e}"))
        })?;

        let network_name =
            non_empty(lookup("NETWORK")).unwrap_or_else(|| x402::BASE_SEPOLIA.to_string());
        let network = NetworkConfig::by_name(&network_name)
            .ok_or_else(|| X402Error::ConfigError(format!("unknown NETWORK '{network_name}'")))?;

        let paid_price =
            non_empty(lookup("PAID_PRICE")).unwrap_or_else(|| DEFAULT_PAID_PRICE.to_string());
        // fail at startup, not on the first request
        parse_price(&paid_price, network.token_decimals)?;

        let max_timeout_seconds = match non_empty(lookup("MAX_TIMEOUT_SECONDS")) {
            Some(t) => t.parse::<u64>().map_err(|e| {
                X402Error::ConfigError(format!("invalid MAX_TIMEOUT_SECONDS '{t}': {e}"))
            })?,
            None => DEFAULT_MAX_TIMEOUT_SECONDS,
        };

        let facilitator_url = non_empty(lookup("FACILITATOR_URL"))
            .unwrap_or_else(|| "http://localhost:4022".to_string());

        let hmac_secret = non_empty(lookup("FACILITATOR_SHARED_SECRET")).map(String::into_bytes);
        let insecure_no_hmac = flag(lookup("X402_INSECURE_NO_HMAC"));
        if hmac_secret.is_none() && !insecure_no_hmac {
            return Err(X402Error::ConfigError(
                "FACILITATOR_SHARED_SECRET is required. Set it to a secure random value \
                 (e.g. `openssl rand -hex 32`). For local development only, set \
                 X402_INSECURE_NO_HMAC=true to skip."
                    .to_string(),
            ));
        } else if hmac_secret.is_none() {
            tracing::warn!(
                "X402_INSECURE_NO_HMAC=true: facilitator requests will be UNAUTHENTICATED. \
                 DO NOT use this in production!"
            );
        }

        let rate_limit_rpm: u64 = lookup("RATE_LIMIT_RPM")
            .and_then(|r| r.trim().parse().ok())
            .unwrap_or(60);

        let allowed_origins: Vec<String> = lookup("ALLOWED_ORIGINS")
            .map(|origins| {
                origins
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            port,
            public_base_url,
            pay_to,
            network,
            paid_price,
            max_timeout_seconds,
            facilitator_url,
            hmac_secret,
            rate_limit_rpm,
            allowed_origins,
            replay_guard: flag(lookup("X402_REPLAY_GUARD")),
            metrics_token: non_empty(lookup("METRICS_TOKEN")),
            public_metrics: flag(lookup("X402_PUBLIC_METRICS")),
        })
    }
}

/// Route descriptors for every protected endpoint, keyed by `"METHOD /path"`.
#[derive(Debug, Clone, Default)]
pub struct PaymentConfig {
    pub routes: HashMap<String, RouteDescriptor>,
}

/// Builder for a [`PaymentConfig`] with several priced routes.
pub struct PaymentConfigBuilder {
    base_url: String,
    pay_to: Address,
    network: NetworkConfig,
    max_timeout_seconds: u64,
    routes: HashMap<String, RouteDescriptor>,
}

impl PaymentConfigBuilder {
    pub fn new(base_url: &str, pay_to: Address, network: NetworkConfig) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            pay_to,
            network,
            max_timeout_seconds: DEFAULT_MAX_TIMEOUT_SECONDS,
            routes: HashMap::new(),
        }
    }

    /// Settlement timeout applied to routes registered after this call.
    pub fn max_timeout_seconds(mut self, seconds: u64) -> Self {
        self.max_timeout_seconds = seconds;
        self
    }

    /// Register a priced route, e.g. `route("GET", "/api/paid-data", "$0.01", Some("..."))`.
    pub fn route(
        mut self,
        method: &str,
        path: &str,
        price: &str,
        description: Option<&str>,
    ) -> Result<Self, X402Error> {
        let amount = parse_price(price, self.network.token_decimals)?;
        let mut descriptor = RouteDescriptor::new(
            &format!("{}{path}", self.base_url),
            method,
            amount,
            self.pay_to,
            &self.network,
        )
        .with_max_timeout_seconds(self.max_timeout_seconds);
        if let Some(description) = description {
            descriptor = descriptor.with_description(description);
        }

        self.routes
            .insert(route_key(&descriptor.method, path), descriptor);
        Ok(self)
    }

    pub fn build(self) -> PaymentConfig {
        PaymentConfig {
            routes: self.routes,
        }
    }
}

fn route_key(method: &str, path: &str) -> String {
    format!("{} {path}", method.to_uppercase())
}

impl PaymentConfig {
    /// The server's single protected route, `GET /api/paid-data`.
    pub fn from_server_config(config: &ServerConfig) -> Result<Self, X402Error> {
        Ok(
            PaymentConfigBuilder::new(&config.public_base_url, config.pay_to, config.network.clone())
                .max_timeout_seconds(config.max_timeout_seconds)
                .route(
                    "GET",
                    PAID_DATA_PATH,
                    &config.paid_price,
                    Some("Access to premium API content"),
                )?
                .build(),
        )
    }

    /// Look up the descriptor for a request (e.g. `"GET"`, `"/api/paid-data"`).
    pub fn get_route(&self, method: &str, path: &str) -> Option<&RouteDescriptor> {
        self.routes.get(&route_key(method, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WALLET: &str = "0x1111111111111111111111111111111111111111";

    fn lookup(vars: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("SERVER_WALLET_ADDRESS", WALLET),
            ("FACILITATOR_SHARED_SECRET", "s3cret"),
        ]))
        .unwrap();

        assert_eq!(config.port, 3001);
        assert_eq!(config.public_base_url, "http://localhost:3001");
        assert_eq!(config.network, NetworkConfig::base_sepolia());
        assert_eq!(config.paid_price, "$0.01");
        assert_eq!(config.max_timeout_seconds, 300);
        assert_eq!(config.facilitator_url, "http://localhost:4022");
        assert_eq!(config.hmac_secret.as_deref(), Some(&b"s3cret"[..]));
        assert_eq!(config.rate_limit_rpm, 60);
        assert!(config.allowed_origins.is_empty());
        assert!(!config.replay_guard);
        assert!(config.metrics_token.is_none());
        assert!(!config.public_metrics);
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("SERVER_WALLET_ADDRESS", WALLET),
            ("X402_INSECURE_NO_HMAC", "true"),
            ("PORT", "8080"),
            ("PUBLIC_BASE_URL", "https://api.example.com/"),
            ("NETWORK", "base"),
            ("ALLOWED_ORIGINS", "https://a.example, ,https://b.example"),
            ("X402_REPLAY_GUARD", "1"),
            ("METRICS_TOKEN", "tok"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.public_base_url, "https://api.example.com");
        assert_eq!(config.network.chain_id, 8453);
        assert!(config.hmac_secret.is_none());
        assert_eq!(
            config.allowed_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
        assert!(config.replay_guard);
        assert_eq!(config.metrics_token.as_deref(), Some("tok"));
    }

    #[test]
    fn test_missing_wallet_is_error() {
        let err = ServerConfig::from_lookup(lookup(&[("X402_INSECURE_NO_HMAC", "true")])).unwrap_err();
        assert!(err.to_string().contains("SERVER_WALLET_ADDRESS"));
    }

    #[test]
    fn test_missing_hmac_secret_is_error() {
        let err = ServerConfig::from_lookup(lookup(&[("SERVER_WALLET_ADDRESS", WALLET)])).unwrap_err();
        assert!(err.to_string().contains("FACILITATOR_SHARED_SECRET"));
    }

    #[test]
    fn test_unknown_network_is_error() {
        assert!(ServerConfig::from_lookup(lookup(&[
            ("SERVER_WALLET_ADDRESS", WALLET),
            ("X402_INSECURE_NO_HMAC", "true"),
            ("NETWORK", "solana"),
        ]))
        .is_err());
    }

    #[test]
    fn test_payment_config_registers_paid_data() {
        let server = ServerConfig::from_lookup(lookup(&[
            ("SERVER_WALLET_ADDRESS", WALLET),
            ("X402_INSECURE_NO_HMAC", "true"),
        ]))
        .unwrap();
        let config = PaymentConfig::from_server_config(&server).unwrap();

        let route = config.get_route("GET", PAID_DATA_PATH).unwrap();
        assert_eq!(route.resource_url, "http://localhost:3001/api/paid-data");
        assert_eq!(route.price_minor_units, 10_000);
        assert_eq!(route.description, "Access to premium API content");
        assert_eq!(route.max_timeout_seconds, 300);
        assert!(config.get_route("POST", PAID_DATA_PATH).is_none());
        assert!(config.get_route("GET", "/api/free").is_none());
    }

    #[test]
    fn test_builder_multiple_routes() {
        let config = PaymentConfigBuilder::new("http://localhost:3001", Address::ZERO, NetworkConfig::default())
            .route("GET", "/a", "$0.001", Some("a"))
            .unwrap()
            .route("post", "/b", "$0.05", None)
            .unwrap()
            .build();

        assert_eq!(config.routes.len(), 2);
        assert_eq!(config.get_route("GET", "/a").unwrap().price_minor_units, 1_000);
        let b = config.get_route("POST", "/b").unwrap();
        assert_eq!(b.price_minor_units, 50_000);
        assert_eq!(b.method, "POST");
    }

    #[test]
    fn test_builder_rejects_bad_price() {
        assert!(PaymentConfigBuilder::new("http://x", Address::ZERO, NetworkConfig::default())
            .route("GET", "/a", "free", None)
            .is_err());
    }
}
