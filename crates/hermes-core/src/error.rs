use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Bad caller input; surfaced as-is, never retried.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A component was handed input it cannot process (e.g. empty text to the chunker).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An embedding or reranking model could not be loaded. Fatal at startup.
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Lexical index unavailable: {0}")]
    LexicalIndexUnavailable(String),

    #[error("Vector index unavailable: {0}")]
    VectorIndexUnavailable(String),

    #[error("Cache error: {0}")]
    Cache(String),
}

impl Error {
    /// Transient infrastructure failures. The whole operation may be
    /// re-attempted with backoff; partial writes are never resumed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::StoreUnavailable(_)
                | Error::LexicalIndexUnavailable(_)
                | Error::VectorIndexUnavailable(_)
        )
    }

    pub fn store(err: impl std::fmt::Display) -> Self {
        Error::StoreUnavailable(err.to_string())
    }

    pub fn lexical(err: impl std::fmt::Display) -> Self {
        Error::LexicalIndexUnavailable(err.to_string())
    }

    pub fn vector(err: impl std::fmt::Display) -> Self {
        Error::VectorIndexUnavailable(err.to_string())
    }

    pub fn model(err: impl std::fmt::Display) -> Self {
        Error::ModelUnavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
