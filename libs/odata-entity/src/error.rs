use odata_http::HttpError;
use thiserror::Error;

/// Errors surfaced by the entity service.
///
/// Transport failures are passed through untouched inside [`ODataError::Http`].
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ODataError {
    #[error(transparent)]
    Http(#[from] HttpError),

    /// Entity (de)serialization failed
    #[error("JSON processing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Invalid API root '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl ODataError {
    /// HTTP status of a non-2xx response, if this is one
    #[must_use]
    pub fn status(&self) -> Option<http::StatusCode> {
        match self {
            ODataError::Http(e) => e.status(),
            _ => None,
        }
    }
}

impl From<figment::Error> for ODataError {
    fn from(err: figment::Error) -> Self {
        ODataError::Config(Box::new(err))
    }
}
