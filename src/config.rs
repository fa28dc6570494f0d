//! Configuration management with environment variable support.
//!
//! This module provides centralized configuration for Web Vision, supporting:
//! - Environment variables for all configurable values
//! - Sensible defaults for local development
//! - Grouped settings structs for programmatic configuration
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `WEB_VISION_SERVER_URL` | Comparison service base URL | `http://127.0.0.1:9090` |
//! | `WEB_VISION_API_KEY` | API key sent to the comparison service | (empty) |
//! | `WEB_VISION_AGENT_ID` | Agent identifier reported at session open | `web-vision/0.1.0` |
//! | `WEB_VISION_CONNECT_TIMEOUT` | Connection timeout in seconds | `10` |
//! | `WEB_VISION_REQUEST_TIMEOUT` | Whole-request timeout in seconds | `120` |
//! | `WEB_VISION_MATCH_TIMEOUT_MS` | Default checkpoint match timeout (ms) | `2000` |
//! | `WEB_VISION_STITCH_MODE` | Full-page stitch strategy (`Scroll`/`CSS`) | `Scroll` |
//! | `WEB_VISION_DISABLED` | Disable all visual checks (`1`/`true`) | unset |
//!
//! # Example
//!
//! ```bash
//! # Point at a self-hosted comparison service
//! export WEB_VISION_SERVER_URL="https://vision.internal:9443"
//! export WEB_VISION_API_KEY="team-token"
//!
//! # Turn the whole layer off for a plain functional run
//! export WEB_VISION_DISABLED=1
//! ```

use std::env;
use std::sync::OnceLock;

// ============================================================================
// Default Values
// ============================================================================

/// Default comparison service base URL
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:9090";

/// Default agent identifier reported to the comparison service
pub const DEFAULT_AGENT_ID: &str = "web-vision/0.1.0";

/// Default connection timeout (seconds)
pub const DEFAULT_CONNECT_TIMEOUT: u64 = 10;

/// Default whole-request timeout (seconds)
pub const DEFAULT_REQUEST_TIMEOUT: u64 = 120;

/// Default checkpoint match timeout (milliseconds)
pub const DEFAULT_MATCH_TIMEOUT_MS: u64 = 2000;

// ============================================================================
// Environment Variable Names
// ============================================================================

/// Environment variable for the comparison service URL
pub const ENV_SERVER_URL: &str = "WEB_VISION_SERVER_URL";

/// Environment variable for the API key
pub const ENV_API_KEY: &str = "WEB_VISION_API_KEY";

/// Environment variable for the agent identifier
pub const ENV_AGENT_ID: &str = "WEB_VISION_AGENT_ID";

/// Environment variable for the connection timeout
pub const ENV_CONNECT_TIMEOUT: &str = "WEB_VISION_CONNECT_TIMEOUT";

/// Environment variable for the whole-request timeout
pub const ENV_REQUEST_TIMEOUT: &str = "WEB_VISION_REQUEST_TIMEOUT";

/// Environment variable for the default match timeout
pub const ENV_MATCH_TIMEOUT_MS: &str = "WEB_VISION_MATCH_TIMEOUT_MS";

/// Environment variable for the default stitch mode
pub const ENV_STITCH_MODE: &str = "WEB_VISION_STITCH_MODE";

/// Environment variable that disables all visual checks
pub const ENV_DISABLED: &str = "WEB_VISION_DISABLED";

// ============================================================================
// Configuration Getters (with caching)
// ============================================================================

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration (initialized from environment on first access)
pub fn get() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

/// Centralized configuration for Web Vision
#[derive(Debug, Clone)]
pub struct Config {
    /// Comparison service settings
    pub server: ServerSettings,
    /// Checkpoint defaults
    pub checks: CheckSettings,
}

/// Comparison-service settings
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Base URL of the comparison service
    pub url: String,
    /// API key sent with every request (empty when unset)
    pub api_key: String,
    /// Agent identifier reported at session open
    pub agent_id: String,
    /// Connection timeout (seconds)
    pub connect_timeout: u64,
    /// Whole-request timeout (seconds)
    pub request_timeout: u64,
}

/// Checkpoint defaults
#[derive(Debug, Clone)]
pub struct CheckSettings {
    /// Default match timeout (milliseconds) applied when a check passes none
    pub match_timeout_ms: u64,
    /// Default full-page stitch strategy, as configured text
    pub stitch_mode: String,
    /// Whether visual checking is disabled process-wide
    pub disabled: bool,
}

impl Config {
    /// Create configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self {
            server: ServerSettings::from_env(),
            checks: CheckSettings::from_env(),
        }
    }

    /// Create configuration with all defaults (ignoring environment)
    pub fn defaults() -> Self {
        Self {
            server: ServerSettings::defaults(),
            checks: CheckSettings::defaults(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

impl ServerSettings {
    /// Create server settings from environment variables
    pub fn from_env() -> Self {
        Self {
            url: env::var(ENV_SERVER_URL).unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string()),
            api_key: env::var(ENV_API_KEY).unwrap_or_default(),
            agent_id: env::var(ENV_AGENT_ID).unwrap_or_else(|_| DEFAULT_AGENT_ID.to_string()),
            connect_timeout: env::var(ENV_CONNECT_TIMEOUT)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            request_timeout: env::var(ENV_REQUEST_TIMEOUT)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT),
        }
    }

    /// Create server settings with defaults
    pub fn defaults() -> Self {
        Self {
            url: DEFAULT_SERVER_URL.to_string(),
            api_key: String::new(),
            agent_id: DEFAULT_AGENT_ID.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl CheckSettings {
    /// Create checkpoint defaults from environment variables
    pub fn from_env() -> Self {
        Self {
            match_timeout_ms: env::var(ENV_MATCH_TIMEOUT_MS)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MATCH_TIMEOUT_MS),
            stitch_mode: env::var(ENV_STITCH_MODE).unwrap_or_default(),
            disabled: env::var(ENV_DISABLED)
                .map(|v| parse_bool(&v))
                .unwrap_or(false),
        }
    }

    /// Create checkpoint defaults with hardcoded values
    pub fn defaults() -> Self {
        Self {
            match_timeout_ms: DEFAULT_MATCH_TIMEOUT_MS,
            stitch_mode: String::new(),
            disabled: false,
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Parse a boolean-ish environment value ("1", "true", "yes", "on")
fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Get the comparison service URL (convenience function)
pub fn server_url() -> String {
    get().server.url.clone()
}

/// Get the API key (convenience function)
pub fn api_key() -> String {
    get().server.api_key.clone()
}

/// Get the agent identifier (convenience function)
pub fn agent_id() -> String {
    get().server.agent_id.clone()
}

/// Get the default match timeout in milliseconds (convenience function)
pub fn default_match_timeout_ms() -> u64 {
    get().checks.match_timeout_ms
}

/// Whether visual checking is disabled process-wide (convenience function)
pub fn disabled() -> bool {
    get().checks.disabled
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("1"));
        assert!(parse_bool("true"));
        assert!(parse_bool("YES"));
        assert!(parse_bool(" on "));
        assert!(!parse_bool("0"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool(""));
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::defaults();
        assert_eq!(config.server.url, DEFAULT_SERVER_URL);
        assert_eq!(config.server.agent_id, DEFAULT_AGENT_ID);
        assert_eq!(config.checks.match_timeout_ms, DEFAULT_MATCH_TIMEOUT_MS);
        assert!(!config.checks.disabled);
    }
}
