//! Configuration module.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Zone schemas can be overridden from a JSON file.

use crate::pipeline::{ZoneKind, ZoneSchema};
use crate::scheduler::FeedKey;

use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration error types.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Raw record schemas per zone.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ZoneSchemas {
    #[serde(default = "ZoneSchema::cold")]
    pub cold: ZoneSchema,
    #[serde(default = "ZoneSchema::hot")]
    pub hot: ZoneSchema,
}

impl Default for ZoneSchemas {
    fn default() -> Self {
        Self {
            cold: ZoneSchema::cold(),
            hot: ZoneSchema::hot(),
        }
    }
}

impl ZoneSchemas {
    pub fn get(&self, zone: ZoneKind) -> &ZoneSchema {
        match zone {
            ZoneKind::Cold => &self.cold,
            ZoneKind::Hot => &self.hot,
        }
    }

    /// Load schemas from a JSON file. Zones missing from the file keep their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().display().to_string();
        let data = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path_str.clone(),
            source,
        })?;
        let schemas: ZoneSchemas = serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path_str.clone(),
            source,
        })?;

        for zone in [ZoneKind::Cold, ZoneKind::Hot] {
            let schema = schemas.get(zone);
            if schema.fields.is_empty() {
                return Err(ConfigError::Invalid(format!("{} schema maps no fields", zone)));
            }
            if schema.timestamp_field.is_empty() {
                return Err(ConfigError::Invalid(format!("{} schema has no timestamp field", zone)));
            }
        }

        Ok(schemas)
    }
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the read API (default: 8080)
    pub http_port: u16,
    /// Base URL of the greenhouse backend
    pub api_url: String,
    /// Bearer token attached to backend requests
    pub api_token: Option<String>,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub feeds: Vec<FeedKey>,
    pub schemas: ZoneSchemas,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            api_url: "http://localhost:3000/api".to_string(),
            api_token: None,
            poll_interval: Duration::from_secs(10),
            request_timeout: Duration::from_secs(5),
            feeds: vec![FeedKey::new("1", ZoneKind::Cold), FeedKey::new("1", ZoneKind::Hot)],
            schemas: ZoneSchemas::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `GREENHOUSE_HTTP_PORT`: HTTP port (default: 8080)
    /// - `GREENHOUSE_API_URL`: backend base URL
    /// - `GREENHOUSE_API_TOKEN`: bearer token, optional
    /// - `GREENHOUSE_POLL_INTERVAL_SECS`: poll interval (default: 10)
    /// - `GREENHOUSE_REQUEST_TIMEOUT_SECS`: request timeout (default: 5)
    /// - `GREENHOUSE_FEEDS`: comma separated `<greenhouse>:<cold|hot>` list
    /// - `GREENHOUSE_ZONE_SCHEMAS`: path to a JSON schema override file
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    pub fn load_from<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(port) = var("GREENHOUSE_HTTP_PORT").and_then(|s| s.parse().ok()) {
            cfg.http_port = port;
        }

        if let Some(url) = var("GREENHOUSE_API_URL").filter(|s| !s.trim().is_empty()) {
            cfg.api_url = url.trim().to_string();
        }

        if let Some(token) = var("GREENHOUSE_API_TOKEN").filter(|s| !s.trim().is_empty()) {
            cfg.api_token = Some(token.trim().to_string());
        }

        if let Some(secs) = var("GREENHOUSE_POLL_INTERVAL_SECS").and_then(|s| s.parse::<u64>().ok()) {
            if secs > 0 {
                cfg.poll_interval = Duration::from_secs(secs);
            }
        }

        if let Some(secs) = var("GREENHOUSE_REQUEST_TIMEOUT_SECS").and_then(|s| s.parse::<u64>().ok()) {
            if secs > 0 {
                cfg.request_timeout = Duration::from_secs(secs);
            }
        }

        if let Some(feeds) = var("GREENHOUSE_FEEDS") {
            cfg.feeds = parse_feeds(&feeds)?;
        }

        if let Some(path) = var("GREENHOUSE_ZONE_SCHEMAS").filter(|s| !s.trim().is_empty()) {
            cfg.schemas = ZoneSchemas::from_file(path.trim())?;
        }

        Ok(cfg)
    }
}

/// Parse a `1:cold,1:hot` style feed list.
pub fn parse_feeds(s: &str) -> Result<Vec<FeedKey>, ConfigError> {
    let mut feeds = Vec::new();

    for entry in s.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (greenhouse, zone) = entry
            .split_once(':')
            .ok_or_else(|| ConfigError::Invalid(format!("feed '{}' is not <greenhouse>:<zone>", entry)))?;

        let greenhouse = greenhouse.trim();
        if greenhouse.is_empty() {
            return Err(ConfigError::Invalid(format!("feed '{}' has no greenhouse id", entry)));
        }
        let zone: ZoneKind = zone.parse().map_err(ConfigError::Invalid)?;

        let key = FeedKey::new(greenhouse, zone);
        if !feeds.contains(&key) {
            feeds.push(key);
        }
    }

    Ok(feeds)
}
