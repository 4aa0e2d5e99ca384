use thiserror::Error;

/// Errors raised while decoding a stored item into a typed entity.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ItemError {
    #[error("Missing or invalid field: {0}")]
    MissingField(String),
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
    #[error("Expected entity type {expected}, found {found}")]
    WrongEntityType {
        expected: &'static str,
        found: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_error_display() {
        assert_eq!(
            ItemError::MissingField("email".to_string()).to_string(),
            "Missing or invalid field: email"
        );
        assert_eq!(
            ItemError::InvalidValue {
                field: "status".to_string(),
                reason: "unknown status: zombie".to_string(),
            }
            .to_string(),
            "Invalid value for status: unknown status: zombie"
        );
        assert_eq!(
            ItemError::WrongEntityType {
                expected: "USER",
                found: "VERIFICATION".to_string(),
            }
            .to_string(),
            "Expected entity type USER, found VERIFICATION"
        );
    }
}
