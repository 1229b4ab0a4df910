//! API server configuration.
//!
//! Configuration is loaded from environment variables with fallback to defaults.
//!
//! | Variable | Default |
//! |---|---|
//! | `HERDBOOK_BIND_ADDR` | `0.0.0.0` |
//! | `HERDBOOK_PORT` | `8000` |
//! | `HERDBOOK_DB_PATH` | `./herdbook.db` |
//! | `HERDBOOK_DB_MAX_CONNECTIONS` | `5` |
//! | `HERDBOOK_SYNC_MAX_JOBS` | `5000` |
//! | `HERDBOOK_MAX_UPLOAD_BYTES` | `16777216` (16 MiB) |

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use herd_import::DEFAULT_MAX_UPLOAD_BYTES;
use herd_sync::DEFAULT_MAX_JOBS;

/// API server configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    /// Interface to listen on
    pub bind_addr: String,

    /// HTTP port
    pub port: u16,

    /// SQLite database file
    pub db_path: PathBuf,

    pub db_max_connections: u32,

    /// Largest accepted sync batch
    pub sync_max_jobs: usize,

    /// Largest accepted workbook upload in bytes
    pub max_upload_bytes: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            bind_addr: "0.0.0.0".to_string(),
            port: 8000,
            db_path: PathBuf::from("./herdbook.db"),
            db_max_connections: 5,
            sync_max_jobs: DEFAULT_MAX_JOBS,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl ApiConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = ApiConfig::default();

        let config = ApiConfig {
            bind_addr: lookup("HERDBOOK_BIND_ADDR").unwrap_or(defaults.bind_addr),
            port: parse_or(&lookup, "HERDBOOK_PORT", defaults.port)?,
            db_path: lookup("HERDBOOK_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            db_max_connections: parse_or(
                &lookup,
                "HERDBOOK_DB_MAX_CONNECTIONS",
                defaults.db_max_connections,
            )?,
            sync_max_jobs: parse_or(&lookup, "HERDBOOK_SYNC_MAX_JOBS", defaults.sync_max_jobs)?,
            max_upload_bytes: parse_or(
                &lookup,
                "HERDBOOK_MAX_UPLOAD_BYTES",
                defaults.max_upload_bytes,
            )?,
        };

        if config.db_max_connections == 0 {
            return Err(ConfigError::InvalidValue(
                "HERDBOOK_DB_MAX_CONNECTIONS".to_string(),
            ));
        }
        if config.sync_max_jobs == 0 {
            return Err(ConfigError::InvalidValue("HERDBOOK_SYNC_MAX_JOBS".to_string()));
        }

        Ok(config)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_addr, self.port)
            .parse()
            .map_err(|_| ConfigError::InvalidValue("HERDBOOK_BIND_ADDR".to_string()))
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ApiConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ApiConfig::default());
        assert_eq!(config.max_upload_bytes, 16 * 1024 * 1024);
        assert_eq!(config.socket_addr().unwrap().port(), 8000);
    }

    #[test]
    fn test_overrides() {
        let config = ApiConfig::from_lookup(lookup(&[
            ("HERDBOOK_PORT", "9001"),
            ("HERDBOOK_DB_PATH", "/var/lib/herdbook/herd.db"),
            ("HERDBOOK_SYNC_MAX_JOBS", " 250 "),
        ]))
        .unwrap();

        assert_eq!(config.port, 9001);
        assert_eq!(config.db_path, PathBuf::from("/var/lib/herdbook/herd.db"));
        assert_eq!(config.sync_max_jobs, 250);
    }

    #[test]
    fn test_bad_values_name_the_variable() {
        let err = ApiConfig::from_lookup(lookup(&[("HERDBOOK_PORT", "eighty")])).unwrap_err();
        assert_eq!(err.to_string(), "Invalid value for HERDBOOK_PORT");

        let err =
            ApiConfig::from_lookup(lookup(&[("HERDBOOK_SYNC_MAX_JOBS", "0")])).unwrap_err();
        assert_eq!(err.to_string(), "Invalid value for HERDBOOK_SYNC_MAX_JOBS");
    }
}
