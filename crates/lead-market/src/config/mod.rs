use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::marketplace::MAX_APPLICATIONS_PER_LEAD;

const DEV_JWT_SECRET: &str = "dev-mode-session-secret-not-for-production-use";
const DEV_PAYMENT_SECRET: &str = "dev-mode-payment-secret";
const MIN_SECRET_LEN: usize = 32;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the marketplace service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub auth: AuthConfig,
    pub payments: PaymentConfig,
    pub market: MarketConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3001".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let format = LogFormat::from_str(&env::var("APP_LOG_FORMAT").unwrap_or_default());

        let jwt_secret = secret(environment, "AUTH_JWT_SECRET", DEV_JWT_SECRET)?;
        if environment == AppEnvironment::Production && jwt_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::WeakSecret {
                key: "AUTH_JWT_SECRET",
            });
        }
        let audience = env::var("AUTH_JWT_AUDIENCE")
            .ok()
            .filter(|value| !value.trim().is_empty());

        let key_secret = secret(environment, "PAYMENT_KEY_SECRET", DEV_PAYMENT_SECRET)?;

        let max_applications_per_lead = match env::var("MARKET_MAX_APPLICATIONS_PER_LEAD") {
            Ok(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|limit| *limit > 0)
                .ok_or(ConfigError::InvalidApplicationLimit)?,
            Err(_) => MAX_APPLICATIONS_PER_LEAD,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level, format },
            auth: AuthConfig {
                jwt_secret,
                audience,
            },
            payments: PaymentConfig { key_secret },
            market: MarketConfig {
                max_applications_per_lead,
            },
        })
    }
}

fn secret(
    environment: AppEnvironment,
    key: &'static str,
    dev_default: &str,
) -> Result<String, ConfigError> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ if environment == AppEnvironment::Production => Err(ConfigError::MissingSecret { key }),
        _ => Ok(dev_default.to_string()),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Full,
}

impl LogFormat {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "full" | "pretty" => Self::Full,
            _ => Self::Compact,
        }
    }
}

/// Session-token verification settings.
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub audience: Option<String>,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("audience", &self.audience)
            .finish()
    }
}

/// Payment gateway signing secret.
#[derive(Clone)]
pub struct PaymentConfig {
    pub key_secret: String,
}

impl fmt::Debug for PaymentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentConfig")
            .field("key_secret", &"<redacted>")
            .finish()
    }
}

/// Marketplace business limits.
#[derive(Debug, Clone, Copy)]
pub struct MarketConfig {
    pub max_applications_per_lead: usize,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    MissingSecret { key: &'static str },
    WeakSecret { key: &'static str },
    InvalidApplicationLimit,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::MissingSecret { key } => write!(f, "{key} is required in production"),
            ConfigError::WeakSecret { key } => {
                write!(f, "{key} must be at least {MIN_SECRET_LEN} characters")
            }
            ConfigError::InvalidApplicationLimit => write!(
                f,
                "MARKET_MAX_APPLICATIONS_PER_LEAD must be a positive integer"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
