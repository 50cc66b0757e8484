//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional.
//!
//! - `RENOMARKET_API_URL` - Backend REST base URL. Falls back to
//!   `NEXT_PUBLIC_API_URL` (shared with the web front end's `.env`), then to
//!   `http://localhost:5000/api`
//! - `RENOMARKET_TOKEN_FILE` - Where the CLI persists the token pair
//!   (default: `.renomarket/tokens.json`)
//! - `RENOMARKET_HTTP_TIMEOUT_SECS` - Per-request timeout (default: 30)
//! - `RENOMARKET_CONVERSATIONS_POLL_SECS` - Conversation list poll period (default: 15)
//! - `RENOMARKET_MESSAGES_POLL_SECS` - Open conversation poll period (default: 5)
//! - `RENOMARKET_OFFLINE_FALLBACK` - Serve demo fixtures when the backend is
//!   unreachable (default: true)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Default backend base URL.
pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";

const DEFAULT_TOKEN_FILE: &str = ".renomarket/tokens.json";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CONVERSATIONS_POLL_SECS: u64 = 15;
const DEFAULT_MESSAGES_POLL_SECS: u64 = 5;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Invalid API base URL {0}: {1}")]
    InvalidApiUrl(String, String),
}

/// Renomarket client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend REST base URL (always ends without a trailing slash)
    pub api_url: Url,
    /// Token persistence file used by file-backed token stores
    pub token_file: PathBuf,
    /// Timeout applied to every HTTP request
    pub http_timeout: Duration,
    /// Polling periods for messaging
    pub polling: PollingConfig,
    /// Serve static fixtures when catalog calls fail
    pub offline_fallback: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

/// Messaging poll periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingConfig {
    /// How often the conversation list is refetched
    pub conversations: Duration,
    /// How often the open conversation's messages are refetched
    pub messages: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            conversations: Duration::from_secs(DEFAULT_CONVERSATIONS_POLL_SECS),
            messages: Duration::from_secs(DEFAULT_MESSAGES_POLL_SECS),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_url = parse_api_url(&get_api_url("RENOMARKET_API_URL"))?;
        let token_file = PathBuf::from(get_env_or_default(
            "RENOMARKET_TOKEN_FILE",
            DEFAULT_TOKEN_FILE,
        ));
        let http_timeout = get_env_period("RENOMARKET_HTTP_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;
        let polling = PollingConfig {
            conversations: get_env_period(
                "RENOMARKET_CONVERSATIONS_POLL_SECS",
                DEFAULT_CONVERSATIONS_POLL_SECS,
            )?,
            messages: get_env_period("RENOMARKET_MESSAGES_POLL_SECS", DEFAULT_MESSAGES_POLL_SECS)?,
        };
        let offline_fallback = get_env_parsed("RENOMARKET_OFFLINE_FALLBACK", true)?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");

        Ok(Self {
            api_url,
            token_file,
            http_timeout,
            polling,
            offline_fallback,
            sentry_dsn,
        })
    }

    /// Configuration pointing at the given backend with every other setting
    /// at its default.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidApiUrl` if `api_url` is not an absolute
    /// http(s) URL.
    pub fn for_api_url(api_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            api_url: parse_api_url(api_url)?,
            token_file: PathBuf::from(DEFAULT_TOKEN_FILE),
            http_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            polling: PollingConfig::default(),
            offline_fallback: true,
            sentry_dsn: None,
        })
    }

    /// Full URL for an endpoint path such as `/cart/items/42`.
    #[must_use]
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.api_url.as_str().trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get the API URL with fallback to the web front end's `NEXT_PUBLIC_API_URL`.
fn get_api_url(primary_key: &str) -> String {
    if let Ok(value) = std::env::var(primary_key) {
        return value;
    }
    if let Ok(value) = std::env::var("NEXT_PUBLIC_API_URL") {
        return value;
    }
    DEFAULT_API_URL.to_string()
}

/// Validate the base URL and strip any trailing slash.
fn parse_api_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim_end_matches('/'))
        .map_err(|e| ConfigError::InvalidApiUrl(raw.to_string(), e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidApiUrl(
            raw.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }

    Ok(url)
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an optional environment variable, using `default` when unset.
fn get_env_parsed<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

/// Read a duration in whole seconds; zero is rejected.
fn get_env_period(key: &str, default_secs: u64) -> Result<Duration, ConfigError> {
    parse_period(key, std::env::var(key).ok().as_deref(), default_secs)
}

fn parse_period(key: &str, raw: Option<&str>, default_secs: u64) -> Result<Duration, ConfigError> {
    let secs = match raw {
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?,
        None => default_secs,
    };
    if secs == 0 {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be greater than zero".to_string(),
        ));
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_api_url_strips_trailing_slash() {
        let url = parse_api_url("http://localhost:5000/api/").unwrap();
        assert_eq!(url.as_str(), "http://localhost:5000/api");
    }

    #[test]
    fn test_parse_api_url_rejects_relative_and_other_schemes() {
        assert!(matches!(
            parse_api_url("/api"),
            Err(ConfigError::InvalidApiUrl(_, _))
        ));
        assert!(matches!(
            parse_api_url("ftp://example.com/api"),
            Err(ConfigError::InvalidApiUrl(_, _))
        ));
    }

    #[test]
    fn test_endpoint_url_joins_paths() {
        let config = ClientConfig::for_api_url("http://localhost:5000/api").unwrap();
        assert_eq!(
            config.endpoint_url("/cart/items/p1"),
            "http://localhost:5000/api/cart/items/p1"
        );
        assert_eq!(
            config.endpoint_url("products"),
            "http://localhost:5000/api/products"
        );
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::for_api_url(DEFAULT_API_URL).unwrap();
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.polling.conversations, Duration::from_secs(15));
        assert_eq!(config.polling.messages, Duration::from_secs(5));
        assert!(config.offline_fallback);
        assert!(config.sentry_dsn.is_none());
    }

    #[test]
    fn test_parse_period_rejects_zero() {
        let err = parse_period("RENOMARKET_MESSAGES_POLL_SECS", Some("0"), 5).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnvVar(ref key, _) if key == "RENOMARKET_MESSAGES_POLL_SECS"
        ));
        assert!(parse_period("RENOMARKET_HTTP_TIMEOUT_SECS", Some(" 0 "), 30).is_err());
    }

    #[test]
    fn test_parse_period_values_and_default() {
        assert_eq!(
            parse_period("RENOMARKET_CONVERSATIONS_POLL_SECS", Some(" 20 "), 15).unwrap(),
            Duration::from_secs(20)
        );
        assert_eq!(
            parse_period("RENOMARKET_CONVERSATIONS_POLL_SECS", None, 15).unwrap(),
            Duration::from_secs(15)
        );
        assert!(parse_period("RENOMARKET_MESSAGES_POLL_SECS", Some("soon"), 5).is_err());
    }
}
