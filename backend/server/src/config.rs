use std::{env, fmt::Display, fs::read_to_string, path::PathBuf, str::FromStr, time::Duration};

use thiserror::Error;
use tracing::{info, warn};

const SECRETS_DIR: &str = "/run/secrets";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {key} value: {reason}")]
    Invalid { key: String, reason: String },

    #[error("Secret {0} missing from /run/secrets and the environment")]
    MissingSecret(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub db_path: PathBuf,
    pub shipping_fee: f64,
    pub session_ttl: Duration,
    pub audit_limit: usize,
    pub event_capacity: usize,
    pub allowed_origin: String,
    pub session_secret: String,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok(), read_secret)
    }

    /// Builds the config from arbitrary lookups so tests never touch the process environment.
    pub fn from_lookup<V, S>(var: V, secret: S) -> Result<Self, ConfigError>
    where
        V: Fn(&str) -> Option<String>,
        S: Fn(&str) -> Option<String>,
    {
        let session_ttl_secs: u64 = try_load(&var, "AURELIANA_SESSION_TTL_SECS", "86400")?;
        let shipping_fee: f64 = try_load(&var, "AURELIANA_SHIPPING_FEE", "50.0")?;

        if !shipping_fee.is_finite() || shipping_fee < 0.0 {
            return Err(ConfigError::Invalid {
                key: "AURELIANA_SHIPPING_FEE".to_string(),
                reason: "must be a non-negative amount".to_string(),
            });
        }

        let session_secret = secret("SESSION_SECRET")
            .or_else(|| var("SESSION_SECRET"))
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingSecret("SESSION_SECRET".to_string()))?;

        Ok(Self {
            port: try_load(&var, "RUST_PORT", "1111")?,
            db_path: try_load(&var, "AURELIANA_DB_PATH", "aureliana.db")?,
            shipping_fee,
            session_ttl: Duration::from_secs(session_ttl_secs),
            audit_limit: try_load(&var, "AURELIANA_AUDIT_LIMIT", "100")?,
            event_capacity: try_load::<usize, _>(&var, "AURELIANA_EVENT_CAPACITY", "256")?.max(1),
            allowed_origin: try_load(&var, "AURELIANA_ALLOWED_ORIGIN", "*")?,
            session_secret,
        })
    }

    /// Defaults suitable for tests and local tooling.
    pub fn for_tests(db_path: impl Into<PathBuf>) -> Self {
        Self {
            port: 0,
            db_path: db_path.into(),
            shipping_fee: 50.0,
            session_ttl: Duration::from_secs(60 * 60),
            audit_limit: 100,
            event_capacity: 64,
            allowed_origin: "*".to_string(),
            session_secret: "test-session-secret".to_string(),
        }
    }
}

fn try_load<T, V>(var: &V, key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    V: Fn(&str) -> Option<String>,
{
    var(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");
            ConfigError::Invalid {
                key: key.to_string(),
                reason: e.to_string(),
            }
        })
}

fn read_secret(secret_name: &str) -> Option<String> {
    let path = format!("{SECRETS_DIR}/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|e| {
            warn!("Failed to read {secret_name} from file: {e}");
        })
        .ok()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[("SESSION_SECRET", "s3cret")]), |_| None)
            .expect("config");

        assert_eq!(config.port, 1111);
        assert_eq!(config.db_path, PathBuf::from("aureliana.db"));
        assert_eq!(config.shipping_fee, 50.0);
        assert_eq!(config.audit_limit, 100);
        assert_eq!(config.session_ttl, Duration::from_secs(86400));
        assert_eq!(config.session_secret, "s3cret");
    }

    #[test]
    fn test_secret_file_wins() {
        let config = Config::from_lookup(lookup(&[("SESSION_SECRET", "from-env")]), |_| {
            Some("from-file".to_string())
        })
        .expect("config");

        assert_eq!(config.session_secret, "from-file");
    }

    #[test]
    fn test_missing_secret() {
        let err = Config::from_lookup(lookup(&[]), |_| None).unwrap_err();

        assert!(matches!(err, ConfigError::MissingSecret(_)));
    }

    #[test]
    fn test_invalid_port() {
        let err = Config::from_lookup(
            lookup(&[("SESSION_SECRET", "x"), ("RUST_PORT", "eighty")]),
            |_| None,
        )
        .unwrap_err();

        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "RUST_PORT"));
    }

    #[test]
    fn test_negative_shipping_fee() {
        let err = Config::from_lookup(
            lookup(&[("SESSION_SECRET", "x"), ("AURELIANA_SHIPPING_FEE", "-1")]),
            |_| None,
        )
        .unwrap_err();

        assert!(matches!(err, ConfigError::Invalid { .. }));
    }
}
