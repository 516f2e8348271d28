use thiserror::Error;

/// Top-level error type for the tour guide.
///
/// Covers loading and saving configuration. The chat crate defines its own
/// error types for the conversation pipeline.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TourError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unknown spot: {0}")]
    UnknownSpot(String),
}

impl From<toml::de::Error> for TourError {
    fn from(err: toml::de::Error) -> Self {
        TourError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for TourError {
    fn from(err: toml::ser::Error) -> Self {
        TourError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for TourError {
    fn from(err: serde_json::Error) -> Self {
        TourError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for tour guide operations.
pub type Result<T> = std::result::Result<T, TourError>;
