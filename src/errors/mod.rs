//! Centralized error handling for folder-publisher
//!
//! Errors are split per layer so that callers can match on the category
//! they care about:
//!
//! - **Repository Errors**: ledger storage failures (SeaORM, serialization)
//! - **Publish Errors**: signals from the publishing API (transient, quota, validation)
//! - **Scan Errors**: filesystem access and item validation problems
//!
//! # Usage
//!
//! ```rust
//! use folder_publisher::errors::{AppError, AppResult};
//!
//! fn example_function() -> AppResult<String> {
//!     Err(AppError::validation("title must not be empty"))
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for ledger/repository Results
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Convenience type alias for item scanning Results
pub type ScanResult<T> = Result<T, ScanError>;
