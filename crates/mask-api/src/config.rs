//! # Service Configuration
//!
//! Read once at startup from the environment:
//!
//! | Variable                   | Default      | Meaning |
//! |----------------------------|--------------|---------|
//! | `MASK_PORT`                | `8080`       | Listen port. |
//! | `DATABASE_URL`             | unset        | PostgreSQL URL. Unset selects the in-memory store. |
//! | `MASK_DB_MAX_CONNECTIONS`  | `10`         | Pool size for PostgreSQL. |
//! | `MASK_EXCLUSION_POLICY`    | `union`      | `union` or `per-pair`. |
//! | `MASK_ALLOCATION_ATTEMPTS` | `3`          | Ledger appends per allocation. |
//! | `MASK_METRICS_ENABLED`     | `true`       | Anything but `false` enables `/metrics`. |
//! | `MASK_LOG_FORMAT`          | `text`       | `text` or `json`. |
//! | `MESSAGEBIRD_*`            |              | See [`mask_notify::NotifierConfig`]. |

use mask_core::ExclusionPolicy;
use mask_engine::DEFAULT_MAX_ATTEMPTS;
use mask_notify::NotifierConfig;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;

/// A configuration variable held an unusable value.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error(transparent)]
    Notifier(#[from] mask_notify::ConfigError),
}

/// Log output format for the service binary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Resolved service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub exclusion_policy: ExclusionPolicy,
    pub allocation_attempts: u32,
    pub metrics_enabled: bool,
    pub log_format: LogFormat,
    pub notifier: NotifierConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_url: None,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            exclusion_policy: ExclusionPolicy::default(),
            allocation_attempts: DEFAULT_MAX_ATTEMPTS,
            metrics_enabled: true,
            log_format: LogFormat::Text,
            notifier: NotifierConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| {
            lookup(var)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let port = parse_or(get("MASK_PORT"), "MASK_PORT", DEFAULT_PORT)?;
        let db_max_connections = parse_or(
            get("MASK_DB_MAX_CONNECTIONS"),
            "MASK_DB_MAX_CONNECTIONS",
            DEFAULT_DB_MAX_CONNECTIONS,
        )?;
        let allocation_attempts = parse_or(
            get("MASK_ALLOCATION_ATTEMPTS"),
            "MASK_ALLOCATION_ATTEMPTS",
            DEFAULT_MAX_ATTEMPTS,
        )?;
        if allocation_attempts == 0 {
            return Err(ConfigError::Invalid {
                var: "MASK_ALLOCATION_ATTEMPTS",
                reason: "must be at least 1".to_string(),
            });
        }

        let exclusion_policy = match get("MASK_EXCLUSION_POLICY") {
            Some(raw) => raw
                .parse::<ExclusionPolicy>()
                .map_err(|e| ConfigError::Invalid {
                    var: "MASK_EXCLUSION_POLICY",
                    reason: e.to_string(),
                })?,
            None => ExclusionPolicy::default(),
        };

        let metrics_enabled = get("MASK_METRICS_ENABLED")
            .map(|v| v.to_lowercase() != "false")
            .unwrap_or(true);

        let log_format = match get("MASK_LOG_FORMAT").as_deref() {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "MASK_LOG_FORMAT",
                    reason: format!("{other:?} is not \"text\" or \"json\""),
                })
            }
        };

        Ok(Self {
            port,
            database_url: get("DATABASE_URL"),
            db_max_connections,
            exclusion_policy,
            allocation_attempts,
            metrics_enabled,
            log_format,
            notifier: NotifierConfig::from_lookup(&lookup)?,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    raw: Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
            var,
            reason: format!("{raw:?} is not a valid number"),
        }),
        None => Ok(default),
    }
}
