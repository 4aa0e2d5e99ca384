//! Domain entities persisted in the table.

mod tag;
mod user;
mod verification;

pub use tag::{
    generate_tag, random_tag, validate_tag, GENERATED_TAG_LENGTH, MAX_TAG_LENGTH, MIN_TAG_LENGTH,
    TAG_ALPHABET,
};
pub use user::{ExternalIdentity, User, UserPatch, UserStatus, ENTITY_TYPE_USER};
pub use verification::{
    Verification, VerificationKind, VerificationPatch, VerificationStatus,
    ENTITY_TYPE_VERIFICATION,
};

/// Generates a new entity id (UUID v4).
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
