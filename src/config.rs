use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DATABASE: &str = "surveyDB";
const DEFAULT_TIMEOUT_SECS: u64 = 5;
const DEFAULT_MAX_POOL_SIZE: u32 = 20;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// How the store connector hands out connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStrategy {
    /// Fresh client per request, shut down on release.
    PerRequest,
    /// One pooled client shared by every request.
    Shared,
    /// In-process store, nothing leaves the process.
    Memory,
}

impl FromStr for ConnectionStrategy {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "per-request" | "per_request" => Ok(Self::PerRequest),
            "shared" | "pooled" => Ok(Self::Shared),
            "memory" => Ok(Self::Memory),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ConnectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PerRequest => write!(f, "per-request"),
            Self::Shared => write!(f, "shared"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub uri: String,
    pub database: String,
    pub strategy: ConnectionStrategy,
    pub timeout: Duration,
    pub max_pool_size: u32,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub store: StoreSettings,
    /// Empty means any origin is accepted.
    pub cors_allowed_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let strategy = match var("STORE_STRATEGY") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                name: "STORE_STRATEGY",
                value,
            })?,
            None => ConnectionStrategy::PerRequest,
        };

        let uri = match (var("MONGODB_URI"), strategy) {
            (Some(uri), _) => uri,
            (None, ConnectionStrategy::Memory) => String::new(),
            (None, _) => return Err(ConfigError::Missing("MONGODB_URI")),
        };

        let timeout_secs = parse_or("STORE_TIMEOUT_SECS", var("STORE_TIMEOUT_SECS"), DEFAULT_TIMEOUT_SECS)?;
        let max_pool_size = parse_or("STORE_MAX_POOL_SIZE", var("STORE_MAX_POOL_SIZE"), DEFAULT_MAX_POOL_SIZE)?;
        if max_pool_size == 0 {
            return Err(ConfigError::Invalid {
                name: "STORE_MAX_POOL_SIZE",
                value: "0".to_string(),
            });
        }

        let cors_allowed_origins = var("CORS_ALLOWED_ORIGINS")
            .map(|origins| {
                origins
                    .split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            host: var("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_or("PORT", var("PORT"), DEFAULT_PORT)?,
            store: StoreSettings {
                uri,
                database: var("MONGODB_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
                strategy,
                timeout: Duration::from_secs(timeout_secs),
                max_pool_size,
            },
            cors_allowed_origins,
        })
    }
}

fn parse_or<T: FromStr>(name: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError> {
    match value {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}
