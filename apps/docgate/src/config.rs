use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use docgate_upstream::DEFAULT_TIMEOUT_MS;
use thiserror::Error;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5000";
const DEFAULT_LOG_FILTER: &str = "info";
const DEFAULT_UPSTREAM_VERIFY_TLS: bool = true;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub log_filter: String,
    pub log_format: LogFormat,
    pub upstream_base_url: String,
    pub upstream_verify_tls: bool,
    pub upstream_timeout_ms: u64,
    pub upload_root: Option<PathBuf>,
}

/// Values supplied on the command line. Each one set here replaces the
/// environment variable outright, so the environment need not carry it.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub bind_addr: Option<SocketAddr>,
    pub upstream_base_url: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid DOCGATE_BIND_ADDR value '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        source: std::net::AddrParseError,
    },
    #[error("DOCGATE_UPSTREAM_BASE_URL (or BASE_URL) must be set")]
    MissingUpstreamBaseUrl,
    #[error("invalid boolean for {key}: '{value}'")]
    InvalidBool { key: &'static str, value: String },
    #[error("invalid integer for {key}: '{value}'")]
    InvalidInteger { key: &'static str, value: String },
    #[error("invalid DOCGATE_LOG_FORMAT value '{0}' (expected text or json)")]
    InvalidLogFormat(String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with_overrides(ConfigOverrides::default())
    }

    pub fn from_env_with_overrides(overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        Self::from_lookup_with_overrides(|key| env::var(key).ok(), overrides)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::from_lookup_with_overrides(lookup, ConfigOverrides::default())
    }

    pub fn from_lookup_with_overrides<F>(
        lookup: F,
        overrides: ConfigOverrides,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let bind_addr = match overrides.bind_addr {
            Some(bind_addr) => bind_addr,
            None => {
                let raw = non_empty("DOCGATE_BIND_ADDR")
                    .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
                raw.parse()
                    .map_err(|source| ConfigError::InvalidBindAddr { value: raw, source })?
            }
        };

        let log_filter =
            non_empty("DOCGATE_LOG_FILTER").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        let log_format = match non_empty("DOCGATE_LOG_FORMAT") {
            None => LogFormat::Text,
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "text" | "plain" => LogFormat::Text,
                "json" => LogFormat::Json,
                _ => return Err(ConfigError::InvalidLogFormat(value)),
            },
        };

        let upstream_base_url = overrides
            .upstream_base_url
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .or_else(|| non_empty("DOCGATE_UPSTREAM_BASE_URL"))
            .or_else(|| non_empty("BASE_URL"))
            .ok_or(ConfigError::MissingUpstreamBaseUrl)?;

        let upstream_verify_tls = match non_empty("DOCGATE_UPSTREAM_VERIFY_TLS") {
            None => DEFAULT_UPSTREAM_VERIFY_TLS,
            Some(value) => parse_bool(&value).ok_or(ConfigError::InvalidBool {
                key: "DOCGATE_UPSTREAM_VERIFY_TLS",
                value,
            })?,
        };

        let upstream_timeout_ms = match non_empty("DOCGATE_UPSTREAM_TIMEOUT_MS") {
            None => DEFAULT_TIMEOUT_MS,
            Some(value) => value
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidInteger {
                    key: "DOCGATE_UPSTREAM_TIMEOUT_MS",
                    value,
                })?,
        };

        let upload_root = non_empty("DOCGATE_UPLOAD_ROOT").map(PathBuf::from);

        Ok(Self {
            bind_addr,
            log_filter,
            log_format,
            upstream_base_url,
            upstream_verify_tls,
            upstream_timeout_ms,
            upload_root,
        })
    }

    /// True when `documents.upload_file` may read any path the process can
    /// open, because no `DOCGATE_UPLOAD_ROOT` confines it.
    #[must_use]
    pub fn uploads_unrestricted(&self) -> bool {
        self.upload_root.is_none()
    }

    pub fn for_tests(upstream_base_url: impl Into<String>) -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            log_filter: "debug".to_string(),
            log_format: LogFormat::Text,
            upstream_base_url: upstream_base_url.into(),
            upstream_verify_tls: true,
            upstream_timeout_ms: 5_000,
            upload_root: None,
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
