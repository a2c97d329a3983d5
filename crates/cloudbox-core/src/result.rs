//! Convenience result type alias for Cloudbox.

use crate::error::AppError;

/// A specialized `Result` type for Cloudbox operations.
pub type AppResult<T> = Result<T, AppError>;
