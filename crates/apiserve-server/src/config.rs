//! Configuration for the server.
//!
//! Settings come from an optional TOML file and are then overridden by the
//! `SERVE_ADDR`, `SERVE_HOMEPATH` and `SERVE_CROSSDOMAIN` environment
//! variables.

use crate::error::ConfigError;
use serde::Deserialize;
use std::path::Path;

/// Environment variable overriding [`ServeConfig::addr`]
pub const ENV_ADDR: &str = "SERVE_ADDR";
/// Environment variable overriding [`ServeConfig::home_path`]
pub const ENV_HOME_PATH: &str = "SERVE_HOMEPATH";
/// Environment variable overriding [`ServeConfig::cross_domain`]
pub const ENV_CROSS_DOMAIN: &str = "SERVE_CROSSDOMAIN";

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    /// Listen address (e.g., "127.0.0.1:8081")
    pub addr: String,

    /// Prefix of every method path and of the documentation pages.
    /// Always starts and ends with `/`.
    pub home_path: String,

    /// Add permissive cross-origin headers and answer `OPTIONS` preflights
    pub cross_domain: bool,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8081".to_string(),
            home_path: "/api/".to_string(),
            cross_domain: false,
        }
    }
}

impl ServeConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: ServeConfig = toml::from_str(contents)?;
        config.validated()
    }

    /// Defaults overridden by the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().apply_env()
    }

    /// Override fields from the process environment
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    /// Override fields from an arbitrary variable lookup
    pub fn apply_vars<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup(ENV_ADDR) {
            self.addr = addr;
        }
        if let Some(home_path) = lookup(ENV_HOME_PATH) {
            self.home_path = home_path;
        }
        if let Some(value) = lookup(ENV_CROSS_DOMAIN) {
            self.cross_domain = parse_bool(&value).ok_or_else(|| ConfigError::InvalidEnv {
                key: ENV_CROSS_DOMAIN.to_string(),
                value: value.clone(),
            })?;
        }
        self.validated()
    }

    /// Address to bind; an empty host means every interface
    pub fn bind_addr(&self) -> String {
        match self.addr.strip_prefix(':') {
            Some(port) => format!("0.0.0.0:{}", port),
            None => self.addr.clone(),
        }
    }

    /// URL of the documentation page, for logs
    pub fn display_url(&self) -> String {
        doc_url(&self.addr, &self.home_path)
    }

    fn validated(mut self) -> Result<Self, ConfigError> {
        self.home_path = normalize_home_path(&self.home_path);
        match self.addr.rsplit_once(':') {
            Some((_, port)) if port.parse::<u16>().is_ok() => Ok(self),
            _ => Err(ConfigError::InvalidField {
                field: "addr".to_string(),
                reason: format!("{:?} is not a host:port address", self.addr),
            }),
        }
    }
}

/// Documentation URL for a listen address, with unspecified hosts shown as
/// `localhost`
pub fn doc_url(addr: &str, home_path: &str) -> String {
    let shown = match addr.rsplit_once(':') {
        Some((host, port)) if matches!(host, "" | "0" | "0.0.0.0" | "[::]") => {
            format!("localhost:{}", port)
        }
        _ => addr.to_string(),
    };
    format!("http://{}{}", shown, home_path)
}

pub(crate) fn normalize_home_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", trimmed)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}
