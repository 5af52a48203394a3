//! Error taxonomy
//!
//! Every failure here is absorbed at a component boundary and turned into
//! "nothing found" at the finest granularity available (per URL for fetches,
//! per scanner category for patterns). Callers of the public parse entry
//! points never see a `ParseError`.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ParseError>;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed pattern `{name}`: {reason}")]
    MalformedPattern { name: &'static str, reason: String },

    #[error("link detection unavailable: {reason}")]
    DetectionUnavailable { reason: String },

    #[error("fetch of {url} failed: {reason}")]
    Fetch { url: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {message}")]
    Config { message: String },
}

impl ParseError {
    #[must_use]
    pub fn fetch(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// True for failures scoped to a single URL.
    pub fn is_per_url(&self) -> bool {
        matches!(self, Self::Fetch { .. } | Self::Http(_))
    }
}
