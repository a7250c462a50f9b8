//! Gateway configuration loaded from the environment.
//!
//! A `.env` file in the working directory is read first (via `dotenvy`), so
//! local development can keep `DATABASE_URL` and friends out of the shell.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::ConfigError;
use crate::proposal::service::DEFAULT_MAX_PAGE_SIZE;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Runtime configuration for the gateway server.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Postgres connection string (`DATABASE_URL`)
    pub database_url: String,
    /// Listen address (`GATEWAY_BIND_ADDR`)
    pub bind_addr: SocketAddr,
    /// Pool size (`GATEWAY_MAX_CONNECTIONS`)
    pub max_connections: u32,
    /// Optional YAML approval policy (`GATEWAY_POLICY_FILE`).
    /// When unset the policy is read from the database.
    pub policy_file: Option<PathBuf>,
    /// Upper bound for pending-list page sizes (`GATEWAY_MAX_PAGE_SIZE`)
    pub max_page_size: u32,
}

impl GatewayConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::MissingVar("DATABASE_URL"))?;

        let bind_addr = lookup("GATEWAY_BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue {
                var: "GATEWAY_BIND_ADDR",
                reason: e.to_string(),
            })?;

        let max_connections = parse_u32(
            &lookup,
            "GATEWAY_MAX_CONNECTIONS",
            DEFAULT_MAX_CONNECTIONS,
        )?;
        let max_page_size = parse_u32(&lookup, "GATEWAY_MAX_PAGE_SIZE", DEFAULT_MAX_PAGE_SIZE)?;

        let policy_file = lookup("GATEWAY_POLICY_FILE")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            database_url,
            bind_addr,
            max_connections,
            policy_file,
            max_page_size,
        })
    }
}

fn parse_u32<F>(lookup: &F, var: &'static str, default: u32) -> Result<u32, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => {
            let value = raw
                .trim()
                .parse::<u32>()
                .map_err(|e| ConfigError::InvalidValue {
                    var,
                    reason: e.to_string(),
                })?;
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    var,
                    reason: "must be greater than zero".into(),
                });
            }
            Ok(value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config =
            GatewayConfig::from_lookup(lookup_from(&[("DATABASE_URL", "postgresql:///crm")]))
                .unwrap();
        assert_eq!(config.database_url, "postgresql:///crm");
        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.max_page_size, 100);
        assert!(config.policy_file.is_none());
    }

    #[test]
    fn test_missing_database_url() {
        let err = GatewayConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar("DATABASE_URL")));
    }

    #[test]
    fn test_overrides_and_bad_values() {
        let config = GatewayConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgresql:///crm"),
            ("GATEWAY_BIND_ADDR", "0.0.0.0:8080"),
            ("GATEWAY_POLICY_FILE", "/etc/gateway/policy.yaml"),
            ("GATEWAY_MAX_PAGE_SIZE", "50"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.max_page_size, 50);
        assert_eq!(
            config.policy_file,
            Some(PathBuf::from("/etc/gateway/policy.yaml"))
        );

        let err = GatewayConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgresql:///crm"),
            ("GATEWAY_MAX_CONNECTIONS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                var: "GATEWAY_MAX_CONNECTIONS",
                ..
            }
        ));
    }
}
