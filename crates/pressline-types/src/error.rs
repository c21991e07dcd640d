use thiserror::Error;

/// Errors from repository operations (used by trait definitions in pressline-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors from the content store collaborator.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("post not found")]
    NotFound,

    #[error("storage error: {0}")]
    Storage(String),
}

/// Errors from the judgment collaborator.
#[derive(Debug, Error)]
pub enum JudgmentError {
    #[error("judgment service unavailable: {0}")]
    Unavailable(String),

    #[error("invalid judgment response: {0}")]
    InvalidResponse(String),
}

/// Errors from the metadata generator collaborator.
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("generator unavailable: {0}")]
    Unavailable(String),

    #[error("unsupported language: '{0}'")]
    UnsupportedLanguage(String),
}
