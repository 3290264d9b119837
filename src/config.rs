use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::domain::Balance;
use crate::engine::LedgerSettings;
use crate::strategy::{LockPolicy, RetryPolicy, Strategy};

pub const BIND_ADDR: &str = "LEDGER_BIND_ADDR";
pub const STRATEGY: &str = "LEDGER_STRATEGY";
pub const DEFAULT_BALANCE: &str = "LEDGER_DEFAULT_BALANCE";
pub const CAS_MAX_ATTEMPTS: &str = "LEDGER_CAS_MAX_ATTEMPTS";
pub const CAS_BASE_DELAY_MS: &str = "LEDGER_CAS_BASE_DELAY_MS";
pub const CAS_MAX_DELAY_MS: &str = "LEDGER_CAS_MAX_DELAY_MS";
pub const LOCK_MAX_ATTEMPTS: &str = "LEDGER_LOCK_MAX_ATTEMPTS";
pub const LOCK_RETRY_DELAY_MS: &str = "LEDGER_LOCK_RETRY_DELAY_MS";
pub const LOCK_TTL_SECS: &str = "LEDGER_LOCK_TTL_SECS";
pub const STORE_LATENCY_MS: &str = "LEDGER_STORE_LATENCY_MS";
pub const REDIS_HOST: &str = "REDIS_HOST";
pub const REDIS_PORT: &str = "REDIS_PORT";

const DEFAULT_REDIS_HOST: &str = "localhost";
const DEFAULT_REDIS_PORT: u16 = 6379;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var}={value:?} is invalid: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("Unknown charge strategy {0:?}, expected naive, optimistic or pessimistic")]
    InvalidStrategy(String),
}

/// Process-wide settings, resolved once at start-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// Strategy used by `/charge` when the request does not pick one.
    pub strategy: Strategy,
    pub ledger: LedgerSettings,
    /// Simulated round trip of the in-process store.
    pub store_latency: Duration,
    /// Set when `REDIS_HOST` or `REDIS_PORT` is given; the in-process store
    /// is used otherwise.
    pub redis_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            strategy: Strategy::default(),
            ledger: LedgerSettings::default(),
            store_latency: Duration::ZERO,
            redis_url: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars())
    }

    /// Builds a config from `(name, value)` pairs. Unknown names are ignored
    /// and missing ones keep their defaults.
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut config = Config::default();
        let retry = &mut config.ledger.retry;
        let lock = &mut config.ledger.lock;
        let mut redis_host = None;
        let mut redis_port = None;

        for (name, value) in vars {
            match name.as_str() {
                BIND_ADDR => config.bind_addr = parse(BIND_ADDR, &value)?,
                STRATEGY => {
                    config.strategy = value.parse().map_err(ConfigError::InvalidStrategy)?
                }
                DEFAULT_BALANCE => {
                    config.ledger.default_balance = Balance(parse(DEFAULT_BALANCE, &value)?)
                }
                CAS_MAX_ATTEMPTS => retry.max_attempts = parse_attempts(&value)?,
                CAS_BASE_DELAY_MS => retry.base_delay = millis(CAS_BASE_DELAY_MS, &value)?,
                CAS_MAX_DELAY_MS => retry.max_delay = millis(CAS_MAX_DELAY_MS, &value)?,
                LOCK_MAX_ATTEMPTS => lock.max_attempts = parse(LOCK_MAX_ATTEMPTS, &value)?,
                LOCK_RETRY_DELAY_MS => lock.retry_delay = millis(LOCK_RETRY_DELAY_MS, &value)?,
                LOCK_TTL_SECS => {
                    lock.ttl = Duration::from_secs(parse(LOCK_TTL_SECS, &value)?)
                }
                STORE_LATENCY_MS => config.store_latency = millis(STORE_LATENCY_MS, &value)?,
                REDIS_HOST => redis_host = Some(value.trim().to_string()),
                REDIS_PORT => redis_port = Some(parse::<u16>(REDIS_PORT, &value)?),
                _ => {}
            }
        }

        if redis_host.is_some() || redis_port.is_some() {
            let host = redis_host
                .filter(|host| !host.is_empty())
                .unwrap_or_else(|| DEFAULT_REDIS_HOST.to_string());
            let port = redis_port.unwrap_or(DEFAULT_REDIS_PORT);
            config.redis_url = Some(format!("redis://{host}:{port}"));
        }

        if config.ledger.retry.base_delay > config.ledger.retry.max_delay {
            return Err(ConfigError::InvalidValue {
                var: CAS_BASE_DELAY_MS,
                value: config.ledger.retry.base_delay.as_millis().to_string(),
                reason: format!("exceeds {CAS_MAX_DELAY_MS}"),
            });
        }
        if config.ledger.lock.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                var: LOCK_MAX_ATTEMPTS,
                value: "0".to_string(),
                reason: "the lock must be tried at least once".to_string(),
            });
        }
        if config.ledger.lock.ttl.is_zero() {
            return Err(ConfigError::InvalidValue {
                var: LOCK_TTL_SECS,
                value: "0".to_string(),
                reason: "a lock must live for at least one second".to_string(),
            });
        }

        Ok(config)
    }
}

fn parse<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: core::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            var,
            value: value.to_string(),
            reason: e.to_string(),
        })
}

fn millis(var: &'static str, value: &str) -> Result<Duration, ConfigError> {
    parse(var, value).map(Duration::from_millis)
}

/// Empty, `0` or `unbounded` means retry until commit.
fn parse_attempts(value: &str) -> Result<Option<u32>, ConfigError> {
    match value.trim() {
        "" | "0" | "unbounded" => Ok(None),
        other => parse(CAS_MAX_ATTEMPTS, other).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_match_the_documented_values() {
        let config = Config::from_vars(Vec::new()).unwrap();

        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.strategy, Strategy::Optimistic);
        assert_eq!(config.ledger.default_balance, Balance(100));
        assert_eq!(config.ledger.retry.max_attempts, None);
        assert_eq!(config.ledger.lock.max_attempts, 3);
        assert_eq!(config.ledger.lock.retry_delay, Duration::from_millis(1000));
        assert_eq!(config.ledger.lock.ttl, Duration::from_secs(10));
        assert_eq!(config.store_latency, Duration::ZERO);
        assert_eq!(config.redis_url, None);
    }

    #[test]
    fn reads_every_variable() {
        let config = Config::from_vars(vars(&[
            (BIND_ADDR, "127.0.0.1:8080"),
            (STRATEGY, "lock"),
            (DEFAULT_BALANCE, "500"),
            (CAS_MAX_ATTEMPTS, "7"),
            (CAS_BASE_DELAY_MS, "2"),
            (CAS_MAX_DELAY_MS, "40"),
            (LOCK_MAX_ATTEMPTS, "5"),
            (LOCK_RETRY_DELAY_MS, "20"),
            (LOCK_TTL_SECS, "3"),
            (STORE_LATENCY_MS, "1"),
            ("PATH", "/usr/bin"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.strategy, Strategy::Pessimistic);
        assert_eq!(config.ledger.default_balance, Balance(500));
        assert_eq!(
            config.ledger.retry,
            RetryPolicy {
                max_attempts: Some(7),
                base_delay: Duration::from_millis(2),
                max_delay: Duration::from_millis(40),
            }
        );
        assert_eq!(
            config.ledger.lock,
            LockPolicy {
                max_attempts: 5,
                retry_delay: Duration::from_millis(20),
                ttl: Duration::from_secs(3),
            }
        );
        assert_eq!(config.store_latency, Duration::from_millis(1));
    }

    #[test]
    fn redis_url_from_host_and_port() {
        let config = Config::from_vars(vars(&[(REDIS_HOST, "cache"), (REDIS_PORT, "6380")]))
            .unwrap();
        assert_eq!(config.redis_url.as_deref(), Some("redis://cache:6380"));

        let config = Config::from_vars(vars(&[(REDIS_HOST, "cache")])).unwrap();
        assert_eq!(config.redis_url.as_deref(), Some("redis://cache:6379"));

        let config = Config::from_vars(vars(&[(REDIS_PORT, "7000")])).unwrap();
        assert_eq!(config.redis_url.as_deref(), Some("redis://localhost:7000"));
    }

    #[test]
    fn rejects_malformed_redis_port() {
        let err = Config::from_vars(vars(&[(REDIS_PORT, "70000")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var: REDIS_PORT, .. }));
    }

    #[test]
    fn zero_cas_attempts_means_unbounded() {
        let config = Config::from_vars(vars(&[(CAS_MAX_ATTEMPTS, "0")])).unwrap();
        assert_eq!(config.ledger.retry.max_attempts, None);
    }

    #[test]
    fn rejects_unknown_strategy() {
        let err = Config::from_vars(vars(&[(STRATEGY, "eventual")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidStrategy(ref s) if s == "eventual"));
    }

    #[test]
    fn rejects_malformed_numbers() {
        let err = Config::from_vars(vars(&[(LOCK_MAX_ATTEMPTS, "three")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                var: LOCK_MAX_ATTEMPTS,
                ..
            }
        ));
        assert!(err.to_string().contains("three"));
    }

    #[test]
    fn rejects_inverted_backoff_bounds() {
        let err = Config::from_vars(vars(&[
            (CAS_BASE_DELAY_MS, "100"),
            (CAS_MAX_DELAY_MS, "10"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                var: CAS_BASE_DELAY_MS,
                ..
            }
        ));
    }

    #[test]
    fn rejects_zero_lock_attempts() {
        let err = Config::from_vars(vars(&[(LOCK_MAX_ATTEMPTS, "0")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                var: LOCK_MAX_ATTEMPTS,
                ..
            }
        ));
    }

    #[test]
    fn rejects_zero_lock_ttl() {
        assert!(Config::from_vars(vars(&[(LOCK_TTL_SECS, "0")])).is_err());
    }
}
