//! Error taxonomy for the search pipeline and API clients.

use thiserror::Error;

use crate::export::ExportError;

/// Transport or decode failure from one of the API clients.
///
/// Clients do not retry; a bare failure propagates to the pipeline.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("service returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl ServiceError {
    /// True when the service answered but the body was not what we
    /// expected. The admin-level fallback loop treats these as "this level
    /// has nothing" and advances; transport failures it propagates.
    pub fn is_decode(&self) -> bool {
        match self {
            ServiceError::Decode(_) => true,
            ServiceError::Transport(e) => e.is_decode(),
            ServiceError::Status(_) => false,
        }
    }
}

/// Pipeline-level errors. One of these aborts processing of the current
/// search request; the batch continues with the next request.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("no candidates found for '{0}'")]
    Resolution(String),

    #[error("no administrative level found for '{name}' (tried {tried:?})")]
    NoAdminLevel { name: String, tried: Vec<u8> },

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("no usable name among tags (wanted name:{lang}, name:en or name)")]
    MissingName { lang: String },

    #[error("candidate selection was cancelled")]
    SelectionCancelled,

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("invalid search line segment '{0}': administrative level is not an integer")]
    BadSearchSegment(String),
}
