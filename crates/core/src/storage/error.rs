use thiserror::Error;

use crate::entity::ValidationError;
use crate::item::ItemError;
use crate::pagination::TokenError;

/// Errors surfaced by store operations.
///
/// An absent row is never an error at this level; reads return `None`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Input failed validation; no I/O was performed.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),
    /// A write precondition failed because of concurrent state.
    #[error("Condition failed for {target}")]
    Conflict { target: String },
    /// Throttling, timeouts or connectivity. Safe to retry with backoff.
    #[error("Transient engine error: {0}")]
    Transient(String),
    #[error("Engine error: {0}")]
    Engine(String),
    /// A stored row could not be decoded into the requested entity.
    #[error("Invalid stored item: {0}")]
    InvalidItem(#[from] ItemError),
    #[error("Invalid continuation token: {0}")]
    TokenDecode(#[from] TokenError),
    #[error("Operation cancelled")]
    Cancelled,
}

impl StoreError {
    pub fn conflict(target: impl ToString) -> Self {
        StoreError::Conflict {
            target: target.to_string(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by the typed repositories.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("{entity_type} not found: {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },
    #[error("{entity_type} already exists: {id}")]
    AlreadyExists {
        entity_type: &'static str,
        id: String,
    },
    /// A unique lookup attribute is already bound to another entity.
    #[error("{entity_type} with {field} {value} already exists")]
    Duplicate {
        entity_type: &'static str,
        field: &'static str,
        value: String,
    },
    #[error("Could not generate a unique tag after {attempts} attempts")]
    TagGenerationExhausted { attempts: u32 },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ValidationError> for RepositoryError {
    fn from(error: ValidationError) -> Self {
        RepositoryError::Store(StoreError::Validation(error))
    }
}

/// Result type for repository operations.
pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;
