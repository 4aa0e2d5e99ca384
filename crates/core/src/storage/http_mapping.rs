//! Pure functions for mapping store and repository errors to HTTP status
//! codes at the API boundary.

use super::{RepositoryError, StoreError};

/// Maps a [`StoreError`] to an HTTP status code.
///
/// - `Validation` -> 400 (Bad Request)
/// - `TokenDecode` -> 400 (Bad Request)
/// - `Conflict` -> 409 (Conflict)
/// - `Transient` -> 503 (Service Unavailable)
/// - `Cancelled` -> 503 (Service Unavailable)
/// - `Engine` -> 500 (Internal Server Error)
/// - `InvalidItem` -> 500 (Internal Server Error)
///
/// # Examples
///
/// ```
/// use tablestore_core::storage::{store_error_to_status_code, StoreError};
///
/// assert_eq!(store_error_to_status_code(&StoreError::conflict("USER#u1")), 409);
/// ```
pub fn store_error_to_status_code(error: &StoreError) -> u16 {
    match error {
        StoreError::Validation(_) => 400,
        StoreError::TokenDecode(_) => 400,
        StoreError::Conflict { .. } => 409,
        StoreError::Transient(_) => 503,
        StoreError::Cancelled => 503,
        StoreError::Engine(_) => 500,
        StoreError::InvalidItem(_) => 500,
    }
}

/// Maps a [`RepositoryError`] to an HTTP status code.
///
/// - `NotFound` -> 404 (Not Found)
/// - `AlreadyExists` -> 409 (Conflict)
/// - `Duplicate` -> 409 (Conflict)
/// - `TagGenerationExhausted` -> 503 (Service Unavailable)
/// - `Store` -> see [`store_error_to_status_code`]
pub fn repository_error_to_status_code(error: &RepositoryError) -> u16 {
    match error {
        RepositoryError::NotFound { .. } => 404,
        RepositoryError::AlreadyExists { .. } => 409,
        RepositoryError::Duplicate { .. } => 409,
        RepositoryError::TagGenerationExhausted { .. } => 503,
        RepositoryError::Store(inner) => store_error_to_status_code(inner),
    }
}

/// Whether retrying the same request unchanged may succeed.
///
/// Conflicts are excluded: a caller must re-read state before retrying.
pub fn is_retryable(error: &StoreError) -> bool {
    matches!(error, StoreError::Transient(_))
}
