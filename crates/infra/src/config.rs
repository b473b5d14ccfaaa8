//! Runtime configuration read from the process environment.
//!
//! | Variable                   | Default            |
//! |----------------------------|--------------------|
//! | `DATABASE_URL`             | unset: in-memory store |
//! | `DATABASE_MAX_CONNECTIONS` | `10`               |
//! | `JWT_SECRET`               | insecure dev value |
//! | `BIND_ADDR`                | `0.0.0.0:8080`     |
//! | `DEFAULT_FREQUENCY`        | `mensual`          |
//! | `RUN_MIGRATIONS`           | `true` with a database |

use std::net::SocketAddr;

use thiserror::Error;

use facilities_assets::Frequency;

pub const DEV_JWT_SECRET: &str = "dev-secret";

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(var: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            var,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub jwt_secret: String,
    /// `true` when `JWT_SECRET` was absent and the dev secret is in use.
    pub jwt_secret_is_default: bool,
    pub bind_addr: SocketAddr,
    pub default_frequency: Frequency,
    pub run_migrations: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let database_url = get("DATABASE_URL");

        let max_connections = match get("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => match raw.parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::invalid(
                        "DATABASE_MAX_CONNECTIONS",
                        format!("expected a positive integer, got '{raw}'"),
                    ));
                }
            },
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let (jwt_secret, jwt_secret_is_default) = match get("JWT_SECRET") {
            Some(secret) => (secret, false),
            None => (DEV_JWT_SECRET.to_string(), true),
        };

        let bind_raw = get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::invalid("BIND_ADDR", format!("'{bind_raw}': {e}")))?;

        let default_frequency = match get("DEFAULT_FREQUENCY") {
            Some(raw) => raw
                .parse::<Frequency>()
                .map_err(|e| ConfigError::invalid("DEFAULT_FREQUENCY", e.to_string()))?,
            None => Frequency::default(),
        };

        let run_migrations = match get("RUN_MIGRATIONS") {
            Some(raw) => parse_bool(&raw)
                .ok_or_else(|| ConfigError::invalid("RUN_MIGRATIONS", format!("expected a boolean, got '{raw}'")))?,
            None => database_url.is_some(),
        };

        Ok(Self {
            database_url,
            max_connections,
            jwt_secret,
            jwt_secret_is_default,
            bind_addr,
            default_frequency,
            run_migrations,
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.database_url, None);
        assert_eq!(cfg.max_connections, 10);
        assert_eq!(cfg.jwt_secret, DEV_JWT_SECRET);
        assert!(cfg.jwt_secret_is_default);
        assert_eq!(cfg.bind_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(cfg.default_frequency, Frequency::Monthly);
        assert!(!cfg.run_migrations);
    }

    #[test]
    fn database_enables_migrations_unless_disabled() {
        let cfg = config(&[("DATABASE_URL", "postgres://localhost/fac")]).unwrap();
        assert!(cfg.run_migrations);

        let cfg = config(&[
            ("DATABASE_URL", "postgres://localhost/fac"),
            ("RUN_MIGRATIONS", "false"),
        ])
        .unwrap();
        assert!(!cfg.run_migrations);
    }

    #[test]
    fn explicit_values_are_used() {
        let cfg = config(&[
            ("JWT_SECRET", "s3cret"),
            ("BIND_ADDR", "127.0.0.1:9000"),
            ("DEFAULT_FREQUENCY", "trimestral"),
            ("DATABASE_MAX_CONNECTIONS", "4"),
        ])
        .unwrap();
        assert_eq!(cfg.jwt_secret, "s3cret");
        assert!(!cfg.jwt_secret_is_default);
        assert_eq!(cfg.bind_addr.port(), 9000);
        assert_eq!(cfg.default_frequency, Frequency::Quarterly);
        assert_eq!(cfg.max_connections, 4);
    }

    #[test]
    fn empty_values_count_as_unset() {
        let cfg = config(&[("DATABASE_URL", "  "), ("JWT_SECRET", "")]).unwrap();
        assert_eq!(cfg.database_url, None);
        assert!(cfg.jwt_secret_is_default);
    }

    #[test]
    fn invalid_values_are_rejected() {
        for (var, value) in [
            ("DATABASE_MAX_CONNECTIONS", "0"),
            ("DATABASE_MAX_CONNECTIONS", "many"),
            ("BIND_ADDR", "localhost"),
            ("DEFAULT_FREQUENCY", "bienal"),
            ("RUN_MIGRATIONS", "perhaps"),
        ] {
            let err = config(&[(var, value)]).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { var: v, .. } if v == var), "{var}={value}");
        }
    }
}
