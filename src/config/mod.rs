use serde::Deserialize;
use config::{Config, ConfigError, Environment, File};

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub gateway: GatewaySettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Payment gateway credentials and endpoints. Constructed once at startup
/// and passed by value into the request builder and callback verifier;
/// the secret is never reassignable at runtime.
#[derive(Debug, Deserialize, Clone)]
pub struct GatewaySettings {
    pub merchant_code: String,
    pub hash_secret: String,
    pub pay_url: String,
    pub return_url: String,
    pub currency: String,
    pub locale: String,
    pub validity_minutes: i64,
}

/// Stand-in secret used by `Default` so seeding and tests can build a
/// context without a config file. The server refuses to start with it.
pub const PLACEHOLDER_SECRET: &str = "change-me-in-production";

impl GatewaySettings {
    /// A guessable signing secret defeats callback authentication
    /// entirely, so the placeholder (or an empty string) is not usable.
    pub fn has_usable_secret(&self) -> bool {
        !self.hash_secret.is_empty() && self.hash_secret != PLACEHOLDER_SECRET
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("database.max_connections", 10)?
            .set_default("gateway.currency", "VND")?
            .set_default("gateway.locale", "vn")?
            .set_default("gateway.validity_minutes", 15)?

            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))

            // Add environment variables (with SKYFARE__ prefix, double underscore separates levels)
            .add_source(Environment::with_prefix("SKYFARE").separator("__"))

            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                base_url: "http://localhost:8080".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite://skyfare.db".to_string(),
                max_connections: 10,
            },
            gateway: GatewaySettings::default(),
        }
    }
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            merchant_code: "SANDBOX01".to_string(),
            hash_secret: PLACEHOLDER_SECRET.to_string(),
            pay_url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".to_string(),
            return_url: "http://localhost:8080/payment/result".to_string(),
            currency: "VND".to_string(),
            locale: "vn".to_string(),
            validity_minutes: 15,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_and_empty_secrets_are_not_usable() {
        let mut gateway = GatewaySettings::default();
        assert!(!gateway.has_usable_secret());

        gateway.hash_secret = String::new();
        assert!(!gateway.has_usable_secret());

        gateway.hash_secret = "a-real-secret-from-the-gateway".to_string();
        assert!(gateway.has_usable_secret());
    }
}
