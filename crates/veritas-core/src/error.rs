use thiserror::Error;

/// Top-level error type for Veritas.
///
/// Coordination and transport errors live in their own crates
/// (`SessionError`, `EngineError`, `GatewayError`); this type covers
/// configuration, I/O and process-level failures.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VeritasError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("API error: {0}")]
    Api(String),
}

impl From<toml::de::Error> for VeritasError {
    fn from(err: toml::de::Error) -> Self {
        VeritasError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for VeritasError {
    fn from(err: toml::ser::Error) -> Self {
        VeritasError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for VeritasError {
    fn from(err: serde_json::Error) -> Self {
        VeritasError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Veritas operations.
pub type Result<T> = std::result::Result<T, VeritasError>;
