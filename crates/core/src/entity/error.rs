use thiserror::Error;

/// Errors raised when an entity, patch or write request fails validation.
///
/// Always caller-fixable; validation runs before any I/O.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },
    #[error("{field} too long (max {max} characters)")]
    TooLong { field: &'static str, max: usize },
    #[error("Invalid {field}: {value}")]
    Invalid { field: &'static str, value: String },
    #[error("Transaction has {count} operations (max {max})")]
    TooManyOperations { count: usize, max: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        assert_eq!(
            ValidationError::Empty { field: "email" }.to_string(),
            "email cannot be empty"
        );
        assert_eq!(
            ValidationError::TooLong {
                field: "name",
                max: 100
            }
            .to_string(),
            "name too long (max 100 characters)"
        );
        assert_eq!(
            ValidationError::Invalid {
                field: "tag",
                value: "a b".to_string()
            }
            .to_string(),
            "Invalid tag: a b"
        );
        assert_eq!(
            ValidationError::TooManyOperations { count: 101, max: 100 }.to_string(),
            "Transaction has 101 operations (max 100)"
        );
    }
}
