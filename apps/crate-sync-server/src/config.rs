//! Configuration management for Crate Sync Server

use std::env;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound on a whole HTTP request; must exceed the store timeout
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// `postgres://…` or `sqlite:…`; unset keeps the log in memory
    pub url: Option<String>,
    pub max_connections: u32,
    /// Deadline applied to each store call
    pub store_timeout: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    /// HMAC secret for bearer tokens on the push path; unset disables the check
    pub jwt_secret: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },

    #[error(
        "REQUEST_TIMEOUT_SECS ({request:?}) must be longer than STORE_TIMEOUT_SECS ({store:?})"
    )]
    TimeoutOrder { request: Duration, store: Duration },
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout: Duration::from_secs(15),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            url: None,
            max_connections: 5,
            store_timeout: Duration::from_secs(10),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from any variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let defaults = Config::default();

        let config = Config {
            server: ServerConfig {
                host: var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: match var("PORT").or_else(|| var("SERVER_PORT")) {
                    Some(value) => parse("PORT", value)?,
                    None => defaults.server.port,
                },
                request_timeout: match var("REQUEST_TIMEOUT_SECS") {
                    Some(value) => Duration::from_secs(parse("REQUEST_TIMEOUT_SECS", value)?),
                    None => defaults.server.request_timeout,
                },
            },
            database: DatabaseConfig {
                url: var("DATABASE_URL"),
                max_connections: match var("DATABASE_MAX_CONNECTIONS") {
                    Some(value) => parse("DATABASE_MAX_CONNECTIONS", value)?,
                    None => defaults.database.max_connections,
                },
                store_timeout: match var("STORE_TIMEOUT_SECS") {
                    Some(value) => Duration::from_secs(parse("STORE_TIMEOUT_SECS", value)?),
                    None => defaults.database.store_timeout,
                },
            },
            auth: AuthConfig {
                jwt_secret: var("JWT_SECRET"),
            },
        };

        if config.server.request_timeout <= config.database.store_timeout {
            return Err(ConfigError::TimeoutOrder {
                request: config.server.request_timeout,
                store: config.database.store_timeout,
            });
        }

        Ok(config)
    }
}

fn parse<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert!(config.database.url.is_none());
        assert_eq!(config.database.store_timeout, Duration::from_secs(10));
        assert!(config.auth.jwt_secret.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("SERVER_HOST", "127.0.0.1"),
            ("SERVER_PORT", "9000"),
            ("DATABASE_URL", "postgres://localhost/crate"),
            ("DATABASE_MAX_CONNECTIONS", "12"),
            ("STORE_TIMEOUT_SECS", "3"),
            ("JWT_SECRET", "s3cret"),
        ])
        .unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(
            config.database.url.as_deref(),
            Some("postgres://localhost/crate")
        );
        assert_eq!(config.database.max_connections, 12);
        assert_eq!(config.database.store_timeout, Duration::from_secs(3));
        assert_eq!(config.auth.jwt_secret.as_deref(), Some("s3cret"));
    }

    #[test]
    fn test_port_takes_precedence_over_server_port() {
        let config = config_from(&[("PORT", "7000"), ("SERVER_PORT", "9000")]).unwrap();
        assert_eq!(config.server.port, 7000);
    }

    #[test]
    fn test_empty_values_are_unset() {
        let config = config_from(&[("DATABASE_URL", ""), ("JWT_SECRET", "  ")]).unwrap();
        assert!(config.database.url.is_none());
        assert!(config.auth.jwt_secret.is_none());
    }

    #[test]
    fn test_bad_value_fails_the_whole_load() {
        let result = config_from(&[
            ("STORE_TIMEOUT_SECS", "abc"),
            ("JWT_SECRET", "s3cret"),
            ("DATABASE_URL", "sqlite://./sync.db"),
        ]);
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { name: "STORE_TIMEOUT_SECS", .. })
        ));
    }

    #[test]
    fn test_request_timeout_must_exceed_store_timeout() {
        let err = config_from(&[("REQUEST_TIMEOUT_SECS", "10"), ("STORE_TIMEOUT_SECS", "10")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::TimeoutOrder { .. }));

        let err = config_from(&[("STORE_TIMEOUT_SECS", "30")]).unwrap_err();
        assert!(matches!(err, ConfigError::TimeoutOrder { .. }));

        let config =
            config_from(&[("REQUEST_TIMEOUT_SECS", "40"), ("STORE_TIMEOUT_SECS", "30")]).unwrap();
        assert_eq!(config.server.request_timeout, Duration::from_secs(40));
    }

    #[test]
    fn test_invalid_number() {
        let err = config_from(&[("PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }
}
