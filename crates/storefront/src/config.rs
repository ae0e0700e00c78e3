//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CARTWHEEL_API_URL` - Base URL of the storefront REST API (e.g. `https://shop.example.com/api`)
//!
//! ## Optional
//! - `CARTWHEEL_TOKEN_PATH` - File holding the persisted auth token
//!   (default: `<config dir>/cartwheel/token`)
//! - `CARTWHEEL_HTTP_TIMEOUT_SECS` - Per-request timeout in seconds (default: 15)
//! - `CARTWHEEL_USER_AGENT` - User agent sent with every request

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL every API path is joined onto. Always ends with `/`.
    pub api_url: Url,
    /// Where the auth token is persisted between runs.
    pub token_path: PathBuf,
    /// Per-request timeout.
    pub timeout: Duration,
    /// User agent header value.
    pub user_agent: String,
}

impl ClientConfig {
    /// Build a configuration for `api_url` with default settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if `api_url` is not an absolute
    /// http(s) URL.
    pub fn new(api_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            api_url: parse_api_url("CARTWHEEL_API_URL", api_url)?,
            token_path: default_token_path(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: default_user_agent(),
        })
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_url = parse_api_url("CARTWHEEL_API_URL", &get_required_env("CARTWHEEL_API_URL")?)?;

        let token_path = get_optional_env("CARTWHEEL_TOKEN_PATH")
            .map_or_else(default_token_path, PathBuf::from);

        let timeout_secs = get_env_or_default(
            "CARTWHEEL_HTTP_TIMEOUT_SECS",
            &DEFAULT_TIMEOUT_SECS.to_string(),
        )
        .parse::<u64>()
        .map_err(|e| {
            ConfigError::InvalidEnvVar("CARTWHEEL_HTTP_TIMEOUT_SECS".to_string(), e.to_string())
        })?;

        let user_agent =
            get_optional_env("CARTWHEEL_USER_AGENT").unwrap_or_else(default_user_agent);

        Ok(Self {
            api_url,
            token_path,
            timeout: Duration::from_secs(timeout_secs),
            user_agent,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse the API base URL. The result always ends in `/`, so endpoint
/// segments land below the configured path.
fn parse_api_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let mut normalized = raw.trim().to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }

    let url = Url::parse(&normalized)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }

    Ok(url)
}

fn default_token_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("cartwheel")
        .join("token")
}

fn default_user_agent() -> String {
    format!("cartwheel/{}", env!("CARGO_PKG_VERSION"))
}

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
