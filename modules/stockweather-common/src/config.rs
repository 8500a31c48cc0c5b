use std::env;

use tracing::warn;

/// Application configuration loaded from environment variables.
///
/// Provider credentials are optional: a provider with missing keys is
/// skipped at startup with a single warning, never per call. The AI key
/// and the relay URL are required.
#[derive(Debug, Clone)]
pub struct Config {
    // Document providers
    pub naver_client_id: String,
    pub naver_client_secret: String,
    pub google_cse_api_key: String,
    pub google_cse_id: String,
    pub dart_api_key: String,

    // AI provider
    pub anthropic_api_key: String,

    // Connection-holder process (relay push target)
    pub relay_base_url: String,

    // Listen addresses
    pub api_host: String,
    pub api_port: u16,
    pub gateway_host: String,
    pub gateway_port: u16,
}

impl Config {
    /// Load configuration for the analysis engine / request handler.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            naver_client_id: optional_env("NAVER_CLIENT_ID"),
            naver_client_secret: optional_env("NAVER_CLIENT_SECRET"),
            google_cse_api_key: optional_env("GOOGLE_CSE_API_KEY"),
            google_cse_id: optional_env("GOOGLE_CSE_ID"),
            dart_api_key: optional_env("DART_OPENAPI_KEY"),
            anthropic_api_key: required_env("ANTHROPIC_API_KEY"),
            relay_base_url: required_env("RELAY_BASE_URL"),
            api_host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            api_port: port_env("API_PORT", 3000),
            gateway_host: env::var("GATEWAY_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            gateway_port: port_env("GATEWAY_PORT", 3001),
        }
    }

    /// Load a minimal config for the gateway (connection holder). The
    /// gateway never calls providers or the AI service, so no keys.
    pub fn gateway_from_env() -> Self {
        Self {
            naver_client_id: String::new(),
            naver_client_secret: String::new(),
            google_cse_api_key: String::new(),
            google_cse_id: String::new(),
            dart_api_key: String::new(),
            anthropic_api_key: String::new(),
            relay_base_url: String::new(),
            api_host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            api_port: port_env("API_PORT", 3000),
            gateway_host: env::var("GATEWAY_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            gateway_port: port_env("GATEWAY_PORT", 3001),
        }
    }

    pub fn has_naver_credentials(&self) -> bool {
        !self.naver_client_id.is_empty() && !self.naver_client_secret.is_empty()
    }

    pub fn has_google_credentials(&self) -> bool {
        !self.google_cse_api_key.is_empty() && !self.google_cse_id.is_empty()
    }

    pub fn has_dart_credentials(&self) -> bool {
        !self.dart_api_key.is_empty()
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn optional_env(key: &str) -> String {
    match env::var(key) {
        Ok(v) => v,
        Err(_) => {
            warn!("{key} not set, dependent provider will be disabled");
            String::new()
        }
    }
}

fn port_env(key: &str, default: u16) -> u16 {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .unwrap_or_else(|_| panic!("{key} must be a number"))
}
