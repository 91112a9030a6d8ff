//! services/api/src/config.rs
//!
//! Defines the service and kiosk configuration structures and their loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use axum::http::HeaderValue;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Credentials used to seed the in-memory store when no database is configured.
#[derive(Clone, Debug)]
pub struct SeedCredential {
    pub surname: String,
    pub password: String,
    pub passcode: String,
}

/// Holds all service configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// `None` runs against the in-memory store.
    pub database_url: Option<String>,
    pub seed: SeedCredential,
    pub log_level: Level,
    pub jwt_secret: String,
    pub actuator_url: String,
    /// Upstream status socket; `None` disables the feed.
    pub actuator_ws_url: Option<String>,
    pub actuator_timeout: Duration,
    pub secure_cookies: bool,
    pub cors_origin: HeaderValue,
    pub require_auth_for_admin: bool,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        load_dotenv();

        // --- Load Server and Database Settings ---
        let bind_address = parse_var("BIND_ADDRESS", "0.0.0.0:3000")?;
        let database_url = std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());
        let log_level = log_level()?;

        let seed = SeedCredential {
            surname: std::env::var("SEED_SURNAME").unwrap_or_else(|_| "Owner".to_string()),
            password: std::env::var("SEED_PASSWORD").unwrap_or_else(|_| "changeme".to_string()),
            passcode: std::env::var("SEED_PASSCODE").unwrap_or_else(|_| "123456".to_string()),
        };

        // --- Load Token Settings ---
        let jwt_secret = std::env::var("JWT_SECRET")
            .map_err(|_| ConfigError::MissingVar("JWT_SECRET".to_string()))?;
        if jwt_secret.len() < 16 {
            return Err(ConfigError::InvalidValue(
                "JWT_SECRET".to_string(),
                "must be at least 16 bytes".to_string(),
            ));
        }

        // --- Load Actuator Settings ---
        let actuator_url = std::env::var("ACTUATOR_URL")
            .unwrap_or_else(|_| "http://raspizero.local:8000".to_string());
        let actuator_ws_url = match std::env::var("ACTUATOR_WS_URL") {
            Ok(url) if url.is_empty() => None,
            Ok(url) => Some(url),
            Err(_) => Some("ws://raspizero.local:8000/ws/status".to_string()),
        };
        let actuator_timeout = Duration::from_secs(parse_var("ACTUATOR_TIMEOUT_SECS", "5")?);

        // --- Load HTTP Settings ---
        let secure_cookies = parse_var("SECURE_COOKIES", "false")?;
        let cors_origin_str = std::env::var("CORS_ORIGIN")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());
        let cors_origin = cors_origin_str.parse::<HeaderValue>().map_err(|e| {
            ConfigError::InvalidValue("CORS_ORIGIN".to_string(), e.to_string())
        })?;
        let require_auth_for_admin = parse_var("REQUIRE_AUTH_FOR_ADMIN", "false")?;

        Ok(Self {
            bind_address,
            database_url,
            seed,
            log_level,
            jwt_secret,
            actuator_url,
            actuator_ws_url,
            actuator_timeout,
            secure_cookies,
            cors_origin,
            require_auth_for_admin,
        })
    }
}

/// Configuration for the kiosk door unit.
#[derive(Clone, Debug)]
pub struct KioskConfig {
    pub api_url: String,
    pub ws_url: String,
    pub surname: String,
    pub password: String,
    pub log_level: Level,
    pub request_timeout: Duration,
    pub settle_window: Duration,
}

impl KioskConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        load_dotenv();

        let api_url =
            std::env::var("PANEL_API_URL").unwrap_or_else(|_| "http://127.0.0.1:3000".to_string());
        let ws_url = std::env::var("PANEL_WS_URL")
            .unwrap_or_else(|_| "ws://127.0.0.1:3000/ws/status".to_string());
        let surname = std::env::var("PANEL_SURNAME")
            .map_err(|_| ConfigError::MissingVar("PANEL_SURNAME".to_string()))?;
        let password = std::env::var("PANEL_PASSWORD")
            .map_err(|_| ConfigError::MissingVar("PANEL_PASSWORD".to_string()))?;
        let request_timeout = Duration::from_secs(parse_var("PANEL_TIMEOUT_SECS", "5")?);

        let settle_ms: u64 = parse_var("PANEL_SETTLE_MS", "2000")?;
        if !(1500..=3000).contains(&settle_ms) {
            return Err(ConfigError::InvalidValue(
                "PANEL_SETTLE_MS".to_string(),
                "must be between 1500 and 3000".to_string(),
            ));
        }

        Ok(Self {
            api_url,
            ws_url,
            surname,
            password,
            log_level: log_level()?,
            request_timeout,
            settle_window: Duration::from_millis(settle_ms),
        })
    }
}

fn load_dotenv() {
    // Only load from .env in non-test mode to avoid contamination.
    if !cfg!(test) {
        dotenvy::dotenv().ok();
    }
}

fn log_level() -> Result<Level, ConfigError> {
    let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
    log_level_str.parse::<Level>().map_err(|_| {
        ConfigError::InvalidValue(
            "RUST_LOG".to_string(),
            format!("'{}' is not a valid log level", log_level_str),
        )
    })
}

fn parse_var<T>(name: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))
}
