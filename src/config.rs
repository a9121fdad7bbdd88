//! Process configuration, read once at startup.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8081;
pub const DEFAULT_ORIGINS: &[&str] = &["http://localhost:8080", "http://localhost:3000"];

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

/// Configuration shared (read-only) by every handler.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Supabase project URL.
    pub supabase_url: Option<String>,
    /// Supabase secret key. Without it the API runs degraded.
    pub supabase_key: Option<String>,
    /// Accept the hardcoded demo credentials without calling Supabase.
    pub demo_mode: bool,
    /// CORS origins allowed to call the API with credentials.
    pub allowed_origins: Vec<String>,
    /// Per-request timeout for Supabase calls.
    pub request_timeout: Duration,
    /// Retries after a transient network failure.
    pub max_retries: u32,
}

impl ApiConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            supabase_url: None,
            supabase_key: None,
            demo_mode: false,
            allowed_origins: DEFAULT_ORIGINS.iter().map(|o| o.to_string()).collect(),
            request_timeout: Duration::from_secs(10),
            max_retries: 1,
        }
    }

    /// Reads `SUPABASE_URL`, `SUPABASE_KEY_SECRET` and the `MOKART_*` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mut config = Self::default();
        config.supabase_url = var("SUPABASE_URL");
        config.supabase_key = var("SUPABASE_KEY_SECRET");

        if let Some(value) = var("MOKART_DEMO_MODE") {
            config.demo_mode = parse_flag("MOKART_DEMO_MODE", &value)?;
        }
        if let Some(value) = var("MOKART_ALLOWED_ORIGINS") {
            config.allowed_origins = value
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(value) = var("MOKART_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = Duration::from_secs(parse("MOKART_REQUEST_TIMEOUT_SECS", &value)?);
        }
        if let Some(value) = var("MOKART_MAX_RETRIES") {
            config.max_retries = parse("MOKART_MAX_RETRIES", &value)?;
        }

        Ok(config)
    }

    /// Sets the bind address.
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Sets the Supabase project URL and secret key.
    pub fn with_supabase(mut self, url: &str, key: &str) -> Self {
        self.supabase_url = Some(url.to_string());
        self.supabase_key = Some(key.to_string());
        self
    }

    /// Enables or disables the demo credentials.
    pub fn with_demo_mode(mut self, enabled: bool) -> Self {
        self.demo_mode = enabled;
        self
    }

    /// Sets the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// URL and key, when both are set.
    pub fn supabase_credentials(&self) -> Option<(&str, &str)> {
        match (&self.supabase_url, &self.supabase_key) {
            (Some(url), Some(key)) => Some((url.as_str(), key.as_str())),
            _ => None,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)))
    }
}

fn parse<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}
