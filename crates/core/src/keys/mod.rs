//! Key generation functions.
//!
//! Pure functions for generating partition and sort keys following the
//! single-table design. All functions are sync, total and have no side effects.
//!
//! Existing functions must never change their output: every stored row and
//! index projection was written with them. A new access pattern gets a new
//! function.

use chrono::{DateTime, Utc};

use crate::item::format_timestamp;

mod types;

pub use types::{Index, StoreKey};

// ============================================================================
// Attribute names
// ============================================================================

pub const PARTITION_KEY: &str = "PK";
pub const SORT_KEY: &str = "SK";
pub const GSI1_PK: &str = "GSI1PK";
pub const GSI1_SK: &str = "GSI1SK";
pub const GSI2_PK: &str = "GSI2PK";
pub const GSI2_SK: &str = "GSI2SK";
pub const GSI3_PK: &str = "GSI3PK";
pub const GSI3_SK: &str = "GSI3SK";
pub const GSI4_PK: &str = "GSI4PK";
pub const GSI4_SK: &str = "GSI4SK";
pub const ENTITY_TYPE_ATTR: &str = "entityType";

// ============================================================================
// Key prefixes
// ============================================================================

pub const USER_PREFIX: &str = "USER#";
pub const VERIFICATION_PREFIX: &str = "VERIF#";
pub const EMAIL_PREFIX: &str = "EMAIL#";
pub const EXTERNAL_PREFIX: &str = "EXT#";
pub const TAG_PREFIX: &str = "TAG#";
pub const STATUS_PREFIX: &str = "STATUS#";

/// Case-folds a lookup attribute before it becomes part of a key.
pub fn canonicalize(value: &str) -> String {
    value.to_lowercase()
}

// ============================================================================
// User keys
// ============================================================================

/// Generate primary key for a User.
///
/// Pattern: `USER#<user_id>`
pub fn user_pk(user_id: &str) -> String {
    format!("{USER_PREFIX}{user_id}")
}

/// Generate sort key for a User.
///
/// Pattern: `USER#<user_id>` (same as PK for single-item queries)
pub fn user_sk(user_id: &str) -> String {
    format!("{USER_PREFIX}{user_id}")
}

/// Full primary key for a User.
pub fn user_key(user_id: &str) -> StoreKey {
    StoreKey::new(user_pk(user_id), user_sk(user_id))
}

/// Generate GSI1 partition key for User email lookup.
///
/// Pattern: `EMAIL#<lower(email)>`
pub fn user_gsi1_pk(email: &str) -> String {
    format!("{EMAIL_PREFIX}{}", canonicalize(email))
}

/// Generate GSI1 sort key for User email lookup.
///
/// Pattern: `USER#<user_id>`
pub fn user_gsi1_sk(user_id: &str) -> String {
    format!("{USER_PREFIX}{user_id}")
}

/// Generate GSI2 partition key for User external identity lookup.
///
/// Pattern: `EXT#<lower(kind)>#<value>`
///
/// Only the identity kind is case-folded; external identifiers are opaque
/// and compared exactly.
pub fn user_gsi2_pk(kind: &str, value: &str) -> String {
    format!("{EXTERNAL_PREFIX}{}#{}", canonicalize(kind), value)
}

/// Generate GSI2 sort key for User external identity lookup.
///
/// Pattern: `USER#<user_id>`
pub fn user_gsi2_sk(user_id: &str) -> String {
    format!("{USER_PREFIX}{user_id}")
}

/// Generate GSI3 partition key for User tag lookup.
///
/// Pattern: `TAG#<lower(tag)>`
pub fn user_gsi3_pk(tag: &str) -> String {
    format!("{TAG_PREFIX}{}", canonicalize(tag))
}

/// Generate GSI3 sort key for User tag lookup.
///
/// Pattern: `USER#<user_id>`
pub fn user_gsi3_sk(user_id: &str) -> String {
    format!("{USER_PREFIX}{user_id}")
}

/// Generate GSI4 partition key for listing Users by status.
///
/// Pattern: `STATUS#USER#<status>`
pub fn user_gsi4_pk(status: &str) -> String {
    format!("{STATUS_PREFIX}{USER_PREFIX}{status}")
}

/// Generate GSI4 sort key for listing Users by status.
///
/// Pattern: `<created_at>#<user_id>`, so listings come back in creation order.
pub fn user_gsi4_sk(created_at: &DateTime<Utc>, user_id: &str) -> String {
    format!("{}#{user_id}", format_timestamp(created_at))
}

// ============================================================================
// Verification keys
// ============================================================================

/// Generate primary key for a Verification.
///
/// Pattern: `VERIF#<verification_id>`
pub fn verification_pk(verification_id: &str) -> String {
    format!("{VERIFICATION_PREFIX}{verification_id}")
}

/// Generate sort key for a Verification.
///
/// Pattern: `VERIF#<verification_id>` (same as PK for single-item queries)
pub fn verification_sk(verification_id: &str) -> String {
    format!("{VERIFICATION_PREFIX}{verification_id}")
}

/// Full primary key for a Verification.
pub fn verification_key(verification_id: &str) -> StoreKey {
    StoreKey::new(
        verification_pk(verification_id),
        verification_sk(verification_id),
    )
}

/// Generate GSI1 partition key for Verification (user's verifications lookup).
///
/// Pattern: `USER#<user_id>`
pub fn verification_gsi1_pk(user_id: &str) -> String {
    format!("{USER_PREFIX}{user_id}")
}

/// Generate GSI1 sort key for Verification (time-sorted lookup).
///
/// Pattern: `VERIF#<created_at>#<verification_id>`
pub fn verification_gsi1_sk(created_at: &DateTime<Utc>, verification_id: &str) -> String {
    format!(
        "{VERIFICATION_PREFIX}{}#{verification_id}",
        format_timestamp(created_at)
    )
}

/// Generate the lower bound for "created at or after" queries on GSI1SK.
///
/// Pattern: `VERIF#<since>`
pub fn verification_gsi1_sk_since(since: &DateTime<Utc>) -> String {
    format!("{VERIFICATION_PREFIX}{}", format_timestamp(since))
}

/// Generate the GSI1SK prefix for querying all verifications of a user.
///
/// Pattern: `VERIF#`
pub fn verification_gsi1_sk_prefix() -> &'static str {
    VERIFICATION_PREFIX
}

/// Generate GSI4 partition key for listing Verifications by status.
///
/// Pattern: `STATUS#VERIF#<status>`
pub fn verification_gsi4_pk(status: &str) -> String {
    format!("{STATUS_PREFIX}{VERIFICATION_PREFIX}{status}")
}

/// Generate GSI4 sort key for listing Verifications by status.
///
/// Pattern: `<kind>#<created_at>#<verification_id>`
///
/// The kind leads so that a single status partition can be narrowed to one
/// kind with a prefix condition.
pub fn verification_gsi4_sk(
    kind: &str,
    created_at: &DateTime<Utc>,
    verification_id: &str,
) -> String {
    format!("{kind}#{}#{verification_id}", format_timestamp(created_at))
}

/// Generate the GSI4SK prefix narrowing a status listing to one kind.
///
/// Pattern: `<kind>#`
pub fn verification_gsi4_sk_prefix(kind: &str) -> String {
    format!("{kind}#")
}
