//! Notification error types.

/// Errors from a delivery attempt.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// HTTP transport error.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },

    /// The messaging API returned a non-2xx status.
    #[error("messaging API {endpoint} returned {status}: {body}")]
    Api {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The channel refused the message without contacting anyone.
    #[error("delivery rejected: {0}")]
    Rejected(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}
