/// Error Module
///
/// Defines the crate-wide error type for the database access layer.
/// Every failure is either retried transparently by a retry-wrapped
/// operation or surfaced to the caller as one of these variants; nothing
/// is swallowed.
use thiserror::Error;

/// Underlying driver failure, boxed so the enum stays independent of the
/// client library that produced it.
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error type for all database operations.
#[derive(Error, Debug)]
pub enum SqlgateError {
    /// Failure to establish a session to the database.
    #[error("Connection error: {0}")]
    Connection(#[source] BoxedCause),

    /// Failure during statement execution, fetch, or commit.
    #[error("Execution error: {0}")]
    Execution(#[source] BoxedCause),

    /// A named placeholder in the statement had no bound parameter.
    #[error("Parameter error: {0}")]
    Parameter(String),

    /// Configuration loading and validation errors.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Type alias for Result to use SqlgateError as the error type.
pub type Result<T> = std::result::Result<T, SqlgateError>;
