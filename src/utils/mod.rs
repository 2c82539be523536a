//! Shared utilities

pub mod error;
pub mod paths;

pub use error::{AppError, AppResult, ErrorResponse};
pub use paths::{combined_path, PathNamer};
