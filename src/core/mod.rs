/// Core Module
///
/// Shared infrastructure for the access layer: the database driver seam,
/// value and result types, and crate-wide error handling.

pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{Result, SqlgateError};
