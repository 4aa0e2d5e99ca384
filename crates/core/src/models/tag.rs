//! Short human-readable user tags.

use rand::Rng;

use crate::entity::ValidationError;

/// Characters used for generated tags. Look-alikes (`0`/`o`, `1`/`l`) are left out.
pub const TAG_ALPHABET: &[u8] = b"abcdefghijkmnpqrstuvwxyz23456789";
/// Length of generated tags.
pub const GENERATED_TAG_LENGTH: usize = 8;
pub const MIN_TAG_LENGTH: usize = 4;
pub const MAX_TAG_LENGTH: usize = 16;

/// Generates a random tag candidate from `rng`.
///
/// Uniqueness is not guaranteed here; callers probe the tag index.
pub fn generate_tag<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..GENERATED_TAG_LENGTH)
        .map(|_| TAG_ALPHABET[rng.random_range(0..TAG_ALPHABET.len())] as char)
        .collect()
}

/// Generates a random tag candidate from the thread-local generator.
pub fn random_tag() -> String {
    generate_tag(&mut rand::rng())
}

/// Validates a caller-supplied or generated tag.
pub fn validate_tag(tag: &str) -> Result<(), ValidationError> {
    if tag.is_empty() {
        return Err(ValidationError::Empty { field: "tag" });
    }
    if tag.len() > MAX_TAG_LENGTH {
        return Err(ValidationError::TooLong {
            field: "tag",
            max: MAX_TAG_LENGTH,
        });
    }
    if tag.len() < MIN_TAG_LENGTH || !tag.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::Invalid {
            field: "tag",
            value: tag.to_string(),
        });
    }
    Ok(())
}
