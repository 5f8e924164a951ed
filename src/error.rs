// src/error.rs
use thiserror::Error;

/// Tagged failure variants for a single source adapter fetch.
///
/// Adapter failures are caught and logged inside the chain, never thrown past
/// it; only [`FetchError::Exhausted`] reaches view code.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected http status {status}")]
    Http { status: u16 },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("api error: {0}")]
    Api(String),

    #[error("response carried no data")]
    Empty,

    #[error("all source adapters exhausted")]
    Exhausted,
}

impl FetchError {
    /// Short stable tag for logs and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Network(_) => "network",
            FetchError::Http { .. } => "http",
            FetchError::Parse(_) => "parse",
            FetchError::Api(_) => "api",
            FetchError::Empty => "empty",
            FetchError::Exhausted => "exhausted",
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            FetchError::Http {
                status: status.as_u16(),
            }
        } else if e.is_decode() {
            FetchError::Parse(e.to_string())
        } else {
            FetchError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        FetchError::Parse(e.to_string())
    }
}
