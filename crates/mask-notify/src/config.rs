//! Notifier configuration.
//!
//! Read from the environment:
//!
//! | Variable                | Default                          |
//! |-------------------------|----------------------------------|
//! | `MESSAGEBIRD_API_KEY`   | unset: log-only notifier         |
//! | `MESSAGEBIRD_ENDPOINT`  | `https://rest.messagebird.com`   |
//! | `MESSAGEBIRD_TIMEOUT_SECS` | `10`                          |

use std::time::Duration;

use url::Url;

/// Default MessageBird REST endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://rest.messagebird.com";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors building notifier configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable held an unusable value.
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Settings for the outbound notification channel.
#[derive(Clone)]
pub struct NotifierConfig {
    /// MessageBird access key. `None` selects the log-only notifier.
    pub api_key: Option<String>,
    /// Base URL of the messaging REST API.
    pub endpoint: Url,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl std::fmt::Debug for NotifierConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifierConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("endpoint", &self.endpoint.as_str())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: default_endpoint(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

fn default_endpoint() -> Url {
    Url::parse(DEFAULT_ENDPOINT).expect("DEFAULT_ENDPOINT is a valid URL")
}

impl NotifierConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_key = lookup("MESSAGEBIRD_API_KEY")
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());

        let endpoint = match lookup("MESSAGEBIRD_ENDPOINT") {
            Some(raw) => Url::parse(raw.trim()).map_err(|e| ConfigError::Invalid {
                var: "MESSAGEBIRD_ENDPOINT",
                reason: e.to_string(),
            })?,
            None => default_endpoint(),
        };

        let timeout = match lookup("MESSAGEBIRD_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                    var: "MESSAGEBIRD_TIMEOUT_SECS",
                    reason: format!("{raw:?} is not a whole number of seconds"),
                })?;
                if secs == 0 {
                    return Err(ConfigError::Invalid {
                        var: "MESSAGEBIRD_TIMEOUT_SECS",
                        reason: "must be at least 1".to_string(),
                    });
                }
                Duration::from_secs(secs)
            }
            None => DEFAULT_TIMEOUT,
        };

        Ok(Self {
            api_key,
            endpoint,
            timeout,
        })
    }
}
