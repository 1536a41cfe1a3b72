use thiserror::Error;

/// Main error type for the Plano engine
#[derive(Debug, Error)]
pub enum PlanoError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Malformed query or pipeline specs. Always the caller's fault; retrying
/// the same spec can never succeed.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("Skip must be non-negative, got {0}")]
    NegativeSkip(i64),

    #[error("Limit must be a positive integer, got {0}")]
    InvalidLimit(i64),

    #[error("Invalid predicate: {0}")]
    InvalidPredicate(String),

    #[error("Invalid sort specification: {0}")]
    InvalidSort(String),

    #[error("Invalid projection: {0}")]
    InvalidProjection(String),

    #[error("Invalid index key specification: {0}")]
    InvalidIndexKeys(String),

    #[error("Invalid aggregation pipeline: {0}")]
    InvalidPipeline(String),

    #[error("Query spec must be a JSON object, got {0}")]
    NotAnObject(String),

    #[error("Invalid query spec: {0}")]
    InvalidSpec(String),

    #[error("Unknown query spec field: {0}")]
    UnknownSpecField(String),
}

/// Failures surfaced by a document store collaborator
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store cannot be reached. Callers may retry with backoff; this
    /// core never retries on its own.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Duplicate or incompatible index definition reported on create_index
    #[error("Index conflict: {0}")]
    IndexConflict(String),

    #[error("Query execution failed: {0}")]
    QueryFailed(String),

    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),
}

/// Result type alias for Plano operations
pub type PlanoResult<T> = Result<T, PlanoError>;
