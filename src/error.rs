//! Error types for the streaming core.
//!
//! Adapters return these; the dispatcher is the only place they are turned
//! into user-facing text. Malformed stream lines are not represented here:
//! the frame decoder recovers from them on its own.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The active provider needs a credential that was not supplied.
    #[error("{provider} API key is not configured.")]
    MissingCredential { provider: &'static str },

    /// The server answered with a non-success status.
    #[error("{provider} API error: {status} {status_text}")]
    Http {
        provider: &'static str,
        status: u16,
        status_text: String,
    },

    /// The provider reported a failure in the response itself.
    #[error("{provider} API error: {message}")]
    Upstream {
        provider: &'static str,
        message: String,
    },

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Event stream failed: {0}")]
    EventStream(String),
}

impl Error {
    pub(crate) fn http(provider: &'static str, status: reqwest::StatusCode) -> Self {
        Error::Http {
            provider,
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
