// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names and defaults. Configuration is read once at
//! startup into [`AppConfig`].
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Directory holding the keystore, setup flag and audit log | `/data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `KEYSTORE_PASSWORD` | Password used to open the keystore for signing | Unset |
//! | `SESSION_TTL_SECS` | Session inactivity timeout | `1800` |
//! | `SESSION_CAPACITY` | Maximum concurrent sessions | `1024` |
//! | `KDF_ITERATIONS` | PBKDF2 iterations for newly written keystores | `100000` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use zeroize::Zeroizing;

use crate::crypto::envelope::DEFAULT_KDF_ITERATIONS;
use crate::session::credentials::{DEFAULT_SESSION_CAPACITY, DEFAULT_SESSION_TTL};
use crate::storage::paths::DATA_ROOT;

/// Environment variable name for the data directory path.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

pub const HOST_ENV: &str = "HOST";

pub const PORT_ENV: &str = "PORT";

/// Environment variable holding the keystore password for non-interactive
/// deployments.
///
/// When set and non-empty it is used to open the keystore for signing in
/// preference to any session passphrase. It is never accepted in place of
/// the password an administrative operation asks for.
pub const KEYSTORE_PASSWORD_ENV: &str = "KEYSTORE_PASSWORD";

pub const SESSION_TTL_ENV: &str = "SESSION_TTL_SECS";

pub const SESSION_CAPACITY_ENV: &str = "SESSION_CAPACITY";

pub const KDF_ITERATIONS_ENV: &str = "KDF_ITERATIONS";

/// `json` selects JSON log lines; anything else is human-readable.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";

pub const DEFAULT_PORT: u16 = 8080;

pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Startup configuration.
#[derive(Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub keystore_password: Option<Zeroizing<String>>,
    pub session_ttl: Duration,
    pub session_capacity: usize,
    pub kdf_iterations: u32,
    pub json_logs: bool,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("data_dir", &self.data_dir)
            .field("host", &self.host)
            .field("port", &self.port)
            .field(
                "keystore_password",
                &self.keystore_password.as_ref().map(|_| "<redacted>"),
            )
            .field("session_ttl", &self.session_ttl)
            .field("session_capacity", &self.session_capacity)
            .field("kdf_iterations", &self.kdf_iterations)
            .field("json_logs", &self.json_logs)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DATA_ROOT),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            keystore_password: None,
            session_ttl: DEFAULT_SESSION_TTL,
            session_capacity: DEFAULT_SESSION_CAPACITY,
            kdf_iterations: DEFAULT_KDF_ITERATIONS,
            json_logs: false,
        }
    }
}

impl AppConfig {
    /// Read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any name -> value lookup. Unset and empty are the same.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Ok(Self {
            data_dir: get(DATA_DIR_ENV).map(PathBuf::from).unwrap_or(defaults.data_dir),
            host: get(HOST_ENV).unwrap_or(defaults.host),
            port: parse(PORT_ENV, get(PORT_ENV))?.unwrap_or(defaults.port),
            keystore_password: lookup(KEYSTORE_PASSWORD_ENV)
                .filter(|v| !v.is_empty())
                .map(Zeroizing::new),
            session_ttl: parse::<u64>(SESSION_TTL_ENV, get(SESSION_TTL_ENV))?
                .map(Duration::from_secs)
                .unwrap_or(defaults.session_ttl),
            session_capacity: parse(SESSION_CAPACITY_ENV, get(SESSION_CAPACITY_ENV))?
                .unwrap_or(defaults.session_capacity),
            kdf_iterations: parse(KDF_ITERATIONS_ENV, get(KDF_ITERATIONS_ENV))?
                .filter(|n: &u32| *n > 0)
                .unwrap_or(defaults.kdf_iterations),
            json_logs: get(LOG_FORMAT_ENV)
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(defaults.json_logs),
        })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ConfigError::Invalid {
                name: HOST_ENV,
                value: self.host.clone(),
            })
    }
}

fn parse<T: std::str::FromStr>(name: &'static str, raw: Option<String>) -> Result<Option<T>, ConfigError> {
    raw.map(|value| {
        value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { name, value })
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/data"));
        assert_eq!(config.port, 8080);
        assert!(config.keystore_password.is_none());
        assert_eq!(config.session_ttl, Duration::from_secs(1800));
        assert_eq!(config.kdf_iterations, 100_000);
        assert!(!config.json_logs);
        assert_eq!(config.bind_addr().unwrap().to_string(), "0.0.0.0:8080");
    }

    #[test]
    fn reads_overrides() {
        let config = config_from(&[
            (DATA_DIR_ENV, "/srv/keys"),
            (PORT_ENV, "9443"),
            (KEYSTORE_PASSWORD_ENV, "deploy-secret"),
            (SESSION_TTL_ENV, "60"),
            (LOG_FORMAT_ENV, "JSON"),
        ])
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/srv/keys"));
        assert_eq!(config.port, 9443);
        assert_eq!(config.keystore_password.as_deref().map(String::as_str), Some("deploy-secret"));
        assert_eq!(config.session_ttl, Duration::from_secs(60));
        assert!(config.json_logs);
    }

    #[test]
    fn empty_password_is_unset() {
        let config = config_from(&[(KEYSTORE_PASSWORD_ENV, "")]).unwrap();
        assert!(config.keystore_password.is_none());
    }

    #[test]
    fn invalid_number_is_an_error() {
        let err = config_from(&[(PORT_ENV, "eighty")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn debug_redacts_password() {
        let config = config_from(&[(KEYSTORE_PASSWORD_ENV, "deploy-secret")]).unwrap();
        assert!(!format!("{config:?}").contains("deploy-secret"));
    }
}
