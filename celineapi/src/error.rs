//! Error types for the IRCEL - CELINE client

/// Result type alias for IRCEL - CELINE operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when using the IRCEL - CELINE client
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// API returned an error status or an unusable payload
    #[error("API error: {0}")]
    ApiError(String),

    /// A component needed for the BelAQI index is absent
    #[error("Missing BelAQI component: {0}")]
    MissingComponent(String),

    /// A component of the BelAQI index has an invalid value
    #[error("Invalid BelAQI component value: {0}")]
    InvalidValue(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a generic error from a string
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an API error
    pub fn api_error(msg: impl Into<String>) -> Self {
        Self::ApiError(msg.into())
    }
}
