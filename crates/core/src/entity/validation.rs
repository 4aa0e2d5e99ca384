//! Structural validation helpers shared by the entity types.

use super::ValidationError;

/// Maximum length of any entity id.
pub const MAX_ID_LENGTH: usize = 128;
/// Maximum length of an email address.
pub const MAX_EMAIL_LENGTH: usize = 254;

/// Validates an entity id.
///
/// Ids are embedded in keys, so they must not contain the `#` separator.
pub fn validate_id(field: &'static str, id: &str) -> Result<(), ValidationError> {
    require_text(field, id, MAX_ID_LENGTH)?;
    if id.contains('#') {
        return Err(ValidationError::Invalid {
            field,
            value: id.to_string(),
        });
    }
    Ok(())
}

/// Requires a non-blank value no longer than `max` characters.
pub fn require_text(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Empty { field });
    }
    max_length(field, value, max)
}

/// Rejects values longer than `max` characters.
pub fn max_length(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(())
}

/// Checks an email address shape: exactly one `@`, non-empty local part and
/// a dotted domain, no whitespace.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    require_text("email", email, MAX_EMAIL_LENGTH)?;

    let invalid = || ValidationError::Invalid {
        field: "email",
        value: email.to_string(),
    };

    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let mut parts = email.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(invalid());
    };
    if local.is_empty() || domain.is_empty() {
        return Err(invalid());
    }
    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err(invalid());
    }
    Ok(())
}
