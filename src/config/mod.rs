//! Configuration loading and management
//!
//! A YAML file provides the base configuration; `ERP_GATEWAY_*` environment
//! variables override individual keys. Everything is validated once at
//! startup.

use crate::core::error::{ConfigError, GatewayResult};
use crate::core::query::PageLimits;
use crate::core::resource::ResourceSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;

/// Environment variable naming the YAML configuration file
pub const CONFIG_PATH_ENV: &str = "ERP_GATEWAY_CONFIG";

/// Upper bound accepted for `limits.max_fetch_rows`
pub const MAX_FETCH_ROWS_LIMIT: usize = 100_000;

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
        }
    }
}

/// Upstream query endpoint settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub base_url: String,

    /// Path of the query endpoint, appended to `base_url`
    pub query_path: String,

    /// Deadline of each upstream call
    pub timeout_ms: u64,

    /// Retry once when no response was received at all
    pub retry_transient: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            query_path: "/inspection/query".to_string(),
            timeout_ms: 30_000,
            retry_transient: true,
        }
    }
}

impl UpstreamConfig {
    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.query_path.trim_start_matches('/')
        )
    }
}

/// Page and fetch bounds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub default_per_page: usize,
    pub max_per_page: usize,

    /// Largest "top N" any single query may request
    pub max_fetch_rows: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            default_per_page: 20,
            max_per_page: 100,
            max_fetch_rows: 5_000,
        }
    }
}

impl LimitsConfig {
    pub fn page_limits(&self) -> PageLimits {
        PageLimits {
            default_per_page: self.default_per_page,
            max_per_page: self.max_per_page,
        }
    }
}

/// Complete gateway configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub limits: LimitsConfig,

    /// Resources declared in configuration, served as JSON records
    pub resources: Vec<ResourceSchema>,
}

impl GatewayConfig {
    /// Load from the file named by `ERP_GATEWAY_CONFIG` (if any), apply the
    /// process environment and validate
    pub fn load() -> GatewayResult<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_yaml_file(path.trim())?,
            _ => Self::default(),
        };
        let env: HashMap<String, String> = std::env::vars().collect();
        config.apply_env(&env)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> GatewayResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;
        serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                file: Some(path.display().to_string()),
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> GatewayResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Override keys from `ERP_GATEWAY_*` variables
    pub fn apply_env(&mut self, env: &HashMap<String, String>) -> GatewayResult<()> {
        let get = |key: &str| env.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

        if let Some(addr) = get("ERP_GATEWAY_BIND_ADDR") {
            self.server.bind_addr = parse_env("ERP_GATEWAY_BIND_ADDR", addr)?;
        }
        if let Some(url) = get("ERP_GATEWAY_UPSTREAM_URL") {
            self.upstream.base_url = url.to_string();
        }
        if let Some(timeout) = get("ERP_GATEWAY_UPSTREAM_TIMEOUT_MS") {
            self.upstream.timeout_ms = parse_env("ERP_GATEWAY_UPSTREAM_TIMEOUT_MS", timeout)?;
        }
        if let Some(max) = get("ERP_GATEWAY_MAX_PER_PAGE") {
            self.limits.max_per_page = parse_env("ERP_GATEWAY_MAX_PER_PAGE", max)?;
        }
        if let Some(max) = get("ERP_GATEWAY_MAX_FETCH_ROWS") {
            self.limits.max_fetch_rows = parse_env("ERP_GATEWAY_MAX_FETCH_ROWS", max)?;
        }
        Ok(())
    }

    /// Reject configurations the gateway cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, message: &str| ConfigError::Invalid {
            key: key.to_string(),
            message: message.to_string(),
        };

        let base_url = self.upstream.base_url.trim();
        if base_url.is_empty() {
            return Err(invalid("upstream.base_url", "cannot be empty"));
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(invalid("upstream.base_url", "must be an http(s) URL"));
        }
        if self.upstream.timeout_ms == 0 {
            return Err(invalid("upstream.timeout_ms", "must be positive"));
        }
        self.validate_limits()?;
        for resource in &self.resources {
            resource.validate()?;
        }
        Ok(())
    }

    /// Page and fetch bounds only; used when no upstream URL is involved
    pub fn validate_limits(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, message: &str| ConfigError::Invalid {
            key: key.to_string(),
            message: message.to_string(),
        };
        let limits = &self.limits;
        if limits.max_per_page == 0 {
            return Err(invalid("limits.max_per_page", "must be at least 1"));
        }
        if limits.default_per_page == 0 || limits.default_per_page > limits.max_per_page {
            return Err(invalid(
                "limits.default_per_page",
                "must be between 1 and limits.max_per_page",
            ));
        }
        if limits.max_fetch_rows < limits.max_per_page {
            return Err(invalid(
                "limits.max_fetch_rows",
                "must be at least limits.max_per_page",
            ));
        }
        if limits.max_fetch_rows > MAX_FETCH_ROWS_LIMIT {
            return Err(ConfigError::Invalid {
                key: "limits.max_fetch_rows".to_string(),
                message: format!("must not exceed {}", MAX_FETCH_ROWS_LIMIT),
            });
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key: key.to_string(),
        message: format!("'{}': {}", value, e),
    })
}
