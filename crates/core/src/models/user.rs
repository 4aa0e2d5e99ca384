use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::new_id;
use super::tag::validate_tag;
use crate::entity::validation::{require_text, validate_email, validate_id};
use crate::entity::{Changes, Entity, Field, Patch, Timestamps, ValidationError};
use crate::item::{
    check_entity_type, format_timestamp, get_optional_datetime, get_optional_string, get_string,
    put_datetime, put_optional_string, put_string, Item, ItemError,
};
use crate::keys::{
    self, StoreKey, ENTITY_TYPE_ATTR, GSI1_PK, GSI1_SK, GSI2_PK, GSI2_SK, GSI3_PK, GSI3_SK,
    GSI4_PK, GSI4_SK, PARTITION_KEY, SORT_KEY, USER_PREFIX,
};

pub const ENTITY_TYPE_USER: &str = "USER";

pub const MAX_NAME_LENGTH: usize = 100;
pub const MAX_EXTERNAL_LENGTH: usize = 128;

const ID: &str = "id";
const EMAIL: &str = "email";
const NAME: &str = "name";
const EXTERNAL_KIND: &str = "externalKind";
const EXTERNAL_VALUE: &str = "externalValue";
const TAG: &str = "tag";
const STATUS: &str = "status";
const DELETED_AT: &str = "deletedAt";

/// Lifecycle status of a user account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Pending,
    Active,
    Suspended,
    Closed,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Pending => "pending",
            UserStatus::Active => "active",
            UserStatus::Suspended => "suspended",
            UserStatus::Closed => "closed",
        }
    }

    /// Parses a status, ignoring case.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(UserStatus::Pending),
            "active" => Some(UserStatus::Active),
            "suspended" => Some(UserStatus::Suspended),
            "closed" => Some(UserStatus::Closed),
            _ => None,
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reference to the user in an external identity system.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalIdentity {
    /// Identity system, e.g. `oauth:google` or `wallet`.
    pub kind: String,
    /// Identifier within that system. Compared exactly.
    pub value: String,
}

impl ExternalIdentity {
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_text("externalKind", &self.kind, MAX_EXTERNAL_LENGTH)?;
        require_text("externalValue", &self.value, MAX_EXTERNAL_LENGTH)
    }
}

/// A user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    /// Stored as given; lookups are case-insensitive.
    pub email: String,
    pub name: Option<String>,
    pub external_identity: Option<ExternalIdentity>,
    /// Short human-readable handle. Assigned on creation when absent.
    pub tag: Option<String>,
    pub status: UserStatus,
    /// Soft-delete marker. Rows carrying it are still stored.
    pub deleted_at: Option<DateTime<Utc>>,
    pub timestamps: Timestamps,
}

impl User {
    /// Creates a pending user with a fresh id.
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            email: email.into(),
            name: None,
            external_identity: None,
            tag: None,
            status: UserStatus::Pending,
            deleted_at: None,
            timestamps: Timestamps::now(),
        }
    }

    /// Sets a specific ID for this user (useful for testing).
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_external_identity(mut self, identity: ExternalIdentity) -> Self {
        self.external_identity = Some(identity);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_status(mut self, status: UserStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_timestamps(mut self, timestamps: Timestamps) -> Self {
        self.timestamps = timestamps;
        self
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

impl Entity for User {
    type Patch = UserPatch;

    const ENTITY_TYPE: &'static str = ENTITY_TYPE_USER;

    const SCHEMA: &'static [Field] = &[
        Field::required(PARTITION_KEY),
        Field::required(SORT_KEY),
        Field::required(ENTITY_TYPE_ATTR),
        Field::required(ID),
        Field::required(EMAIL),
        Field::optional(NAME),
        Field::optional(EXTERNAL_KIND),
        Field::optional(EXTERNAL_VALUE),
        Field::optional(TAG),
        Field::required(STATUS),
        Field::optional(DELETED_AT),
        Field::required(crate::entity::CREATED_AT),
        Field::required(crate::entity::UPDATED_AT),
        Field::required(GSI1_PK),
        Field::required(GSI1_SK),
        Field::optional(GSI2_PK),
        Field::optional(GSI2_SK),
        Field::optional(GSI3_PK),
        Field::optional(GSI3_SK),
        Field::required(GSI4_PK),
        Field::required(GSI4_SK),
    ];

    fn id(&self) -> &str {
        &self.id
    }

    fn key_for(id: &str) -> StoreKey {
        keys::user_key(id)
    }

    fn id_from_key(key: &StoreKey) -> Option<&str> {
        key.partition.strip_prefix(USER_PREFIX)
    }

    fn timestamps(&self) -> &Timestamps {
        &self.timestamps
    }

    fn timestamps_mut(&mut self) -> &mut Timestamps {
        &mut self.timestamps
    }

    fn to_item(&self) -> Item {
        let mut item = Item::new();

        // Keys
        put_string(&mut item, PARTITION_KEY, keys::user_pk(&self.id));
        put_string(&mut item, SORT_KEY, keys::user_sk(&self.id));
        put_string(&mut item, GSI1_PK, keys::user_gsi1_pk(&self.email));
        put_string(&mut item, GSI1_SK, keys::user_gsi1_sk(&self.id));
        if let Some(identity) = &self.external_identity {
            put_string(
                &mut item,
                GSI2_PK,
                keys::user_gsi2_pk(&identity.kind, &identity.value),
            );
            put_string(&mut item, GSI2_SK, keys::user_gsi2_sk(&self.id));
        }
        if let Some(tag) = &self.tag {
            put_string(&mut item, GSI3_PK, keys::user_gsi3_pk(tag));
            put_string(&mut item, GSI3_SK, keys::user_gsi3_sk(&self.id));
        }
        put_string(&mut item, GSI4_PK, keys::user_gsi4_pk(self.status.as_str()));
        put_string(
            &mut item,
            GSI4_SK,
            keys::user_gsi4_sk(&self.timestamps.created_at, &self.id),
        );

        // Entity type
        put_string(&mut item, ENTITY_TYPE_ATTR, ENTITY_TYPE_USER);

        // Data
        put_string(&mut item, ID, &self.id);
        put_string(&mut item, EMAIL, &self.email);
        put_optional_string(&mut item, NAME, self.name.as_deref());
        if let Some(identity) = &self.external_identity {
            put_string(&mut item, EXTERNAL_KIND, &identity.kind);
            put_string(&mut item, EXTERNAL_VALUE, &identity.value);
        }
        put_optional_string(&mut item, TAG, self.tag.as_deref());
        put_string(&mut item, STATUS, self.status.as_str());
        if let Some(deleted_at) = &self.deleted_at {
            put_datetime(&mut item, DELETED_AT, deleted_at);
        }
        self.timestamps.write(&mut item);

        item
    }

    fn from_item(item: &Item) -> Result<Self, ItemError> {
        check_entity_type(item, ENTITY_TYPE_USER)?;

        let external_identity = match (
            get_optional_string(item, EXTERNAL_KIND),
            get_optional_string(item, EXTERNAL_VALUE),
        ) {
            (Some(kind), Some(value)) => Some(ExternalIdentity { kind, value }),
            (None, None) => None,
            _ => {
                return Err(ItemError::InvalidValue {
                    field: EXTERNAL_KIND.to_string(),
                    reason: "external identity kind and value must be stored together"
                        .to_string(),
                })
            }
        };

        let status = get_string(item, STATUS)?;

        Ok(User {
            id: get_string(item, ID)?,
            email: get_string(item, EMAIL)?,
            name: get_optional_string(item, NAME),
            external_identity,
            tag: get_optional_string(item, TAG),
            status: UserStatus::parse(&status).ok_or_else(|| ItemError::InvalidValue {
                field: STATUS.to_string(),
                reason: format!("unknown status: {status}"),
            })?,
            deleted_at: get_optional_datetime(item, DELETED_AT)?,
            timestamps: Timestamps::read(item)?,
        })
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validate_id("id", &self.id)?;
        validate_email(&self.email)?;
        if let Some(name) = &self.name {
            require_text("name", name, MAX_NAME_LENGTH)?;
        }
        if let Some(identity) = &self.external_identity {
            identity.validate()?;
        }
        if let Some(tag) = &self.tag {
            validate_tag(tag)?;
        }
        Ok(())
    }
}

/// Partial update for a [`User`].
///
/// Outer `None` leaves a field alone; for optional fields `Some(None)`
/// clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPatch {
    pub email: Option<String>,
    pub name: Option<Option<String>>,
    pub external_identity: Option<Option<ExternalIdentity>>,
    pub tag: Option<String>,
    pub status: Option<UserStatus>,
    pub deleted_at: Option<Option<DateTime<Utc>>>,
}

impl UserPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(Some(name.into()));
        self
    }

    pub fn clear_name(mut self) -> Self {
        self.name = Some(None);
        self
    }

    pub fn external_identity(mut self, identity: ExternalIdentity) -> Self {
        self.external_identity = Some(Some(identity));
        self
    }

    pub fn clear_external_identity(mut self) -> Self {
        self.external_identity = Some(None);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn status(mut self, status: UserStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn deleted_at(mut self, deleted_at: DateTime<Utc>) -> Self {
        self.deleted_at = Some(Some(deleted_at));
        self
    }

    pub fn clear_deleted_at(mut self) -> Self {
        self.deleted_at = Some(None);
        self
    }
}

impl Patch for UserPatch {
    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        if let Some(Some(name)) = &self.name {
            require_text("name", name, MAX_NAME_LENGTH)?;
        }
        if let Some(Some(identity)) = &self.external_identity {
            identity.validate()?;
        }
        if let Some(tag) = &self.tag {
            validate_tag(tag)?;
        }
        Ok(())
    }

    fn changes(&self, id: &str) -> Changes {
        let mut changes = Changes::new();

        if let Some(email) = &self.email {
            changes
                .set(EMAIL, email.as_str())
                .set(GSI1_PK, keys::user_gsi1_pk(email));
        }
        match &self.name {
            Some(Some(name)) => {
                changes.set(NAME, name.as_str());
            }
            Some(None) => {
                changes.remove(NAME);
            }
            None => {}
        }
        match &self.external_identity {
            Some(Some(identity)) => {
                changes
                    .set(EXTERNAL_KIND, identity.kind.as_str())
                    .set(EXTERNAL_VALUE, identity.value.as_str())
                    .set(GSI2_PK, keys::user_gsi2_pk(&identity.kind, &identity.value))
                    .set(GSI2_SK, keys::user_gsi2_sk(id));
            }
            Some(None) => {
                changes
                    .remove(EXTERNAL_KIND)
                    .remove(EXTERNAL_VALUE)
                    .remove(GSI2_PK)
                    .remove(GSI2_SK);
            }
            None => {}
        }
        if let Some(tag) = &self.tag {
            changes
                .set(TAG, tag.as_str())
                .set(GSI3_PK, keys::user_gsi3_pk(tag))
                .set(GSI3_SK, keys::user_gsi3_sk(id));
        }
        if let Some(status) = &self.status {
            changes
                .set(STATUS, status.as_str())
                .set(GSI4_PK, keys::user_gsi4_pk(status.as_str()));
        }
        match &self.deleted_at {
            Some(Some(deleted_at)) => {
                changes.set(DELETED_AT, format_timestamp(deleted_at));
            }
            Some(None) => {
                changes.remove(DELETED_AT);
            }
            None => {}
        }

        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::absent_optional_fields;
    use crate::item::AttributeValue;
    use chrono::TimeZone;

    fn sample_user() -> User {
        let at = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        User::new("John@Example.com")
            .with_id("u1")
            .with_name("John Doe")
            .with_external_identity(ExternalIdentity::new("oauth:google", "109876"))
            .with_tag("k7qx2m9a")
            .with_status(UserStatus::Active)
            .with_timestamps(Timestamps::at(at))
    }

    fn s<'a>(item: &'a Item, key: &str) -> &'a str {
        item.get(key).and_then(|v| v.as_s()).unwrap()
    }

    #[test]
    fn test_user_round_trip() {
        let user = sample_user();
        let parsed = User::from_item(&user.to_item()).unwrap();
        assert_eq!(parsed, user);
    }

    #[test]
    fn test_user_round_trip_with_optionals_absent() {
        let user = User::new("minimal@example.com").with_id("u2");
        let item = user.to_item();

        assert!(!item.contains_key("name"));
        assert!(!item.contains_key("GSI2PK"));
        assert!(!item.contains_key("GSI3PK"));
        assert_eq!(User::from_item(&item).unwrap(), user);
    }

    #[test]
    fn test_user_item_has_correct_keys() {
        let item = sample_user().to_item();

        assert_eq!(s(&item, "PK"), "USER#u1");
        assert_eq!(s(&item, "SK"), "USER#u1");
        assert_eq!(s(&item, "GSI1PK"), "EMAIL#john@example.com");
        assert_eq!(s(&item, "GSI1SK"), "USER#u1");
        assert_eq!(s(&item, "GSI2PK"), "EXT#oauth:google#109876");
        assert_eq!(s(&item, "GSI3PK"), "TAG#k7qx2m9a");
        assert_eq!(s(&item, "GSI4PK"), "STATUS#USER#active");
        assert_eq!(s(&item, "GSI4SK"), "2024-01-15T10:30:00.000000000Z#u1");
        assert_eq!(s(&item, "entityType"), "USER");
        // The email itself keeps its original casing.
        assert_eq!(s(&item, "email"), "John@Example.com");
    }

    #[test]
    fn test_item_stays_within_schema() {
        for user in [sample_user(), User::new("minimal@example.com")] {
            let item = user.to_item();
            for key in item.keys() {
                assert!(
                    User::SCHEMA.iter().any(|f| f.name == key),
                    "{key} missing from schema"
                );
            }
            for field in User::SCHEMA {
                if field.presence == crate::entity::Presence::Required {
                    assert!(item.contains_key(field.name), "{} not written", field.name);
                }
            }
        }
    }

    #[test]
    fn test_absent_optional_fields() {
        let item = User::new("minimal@example.com").to_item();
        let absent = absent_optional_fields::<User>(&item);

        assert!(absent.contains(&"name"));
        assert!(absent.contains(&"GSI2PK"));
        assert!(!absent.contains(&"email"));
    }

    #[test]
    fn test_from_item_rejects_other_entity_types() {
        let mut item = sample_user().to_item();
        put_string(&mut item, ENTITY_TYPE_ATTR, "VERIFICATION");

        assert!(matches!(
            User::from_item(&item),
            Err(ItemError::WrongEntityType { .. })
        ));
    }

    #[test]
    fn test_from_item_rejects_unknown_status() {
        let mut item = sample_user().to_item();
        put_string(&mut item, STATUS, "zombie");

        assert!(matches!(
            User::from_item(&item),
            Err(ItemError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_from_item_rejects_half_external_identity() {
        let mut item = sample_user().to_item();
        item.remove(EXTERNAL_VALUE);

        assert!(User::from_item(&item).is_err());
    }

    #[test]
    fn test_key_helpers() {
        let user = sample_user();
        assert_eq!(user.primary_key(), keys::user_key("u1"));
        assert_eq!(User::id_from_key(&user.primary_key()), Some("u1"));
        assert_eq!(User::id_from_key(&keys::verification_key("v1")), None);
    }

    #[test]
    fn test_validate() {
        assert!(sample_user().validate().is_ok());
        assert!(User::new("nope").validate().is_err());
        assert!(sample_user().with_id("").validate().is_err());
        assert!(sample_user().with_name("x".repeat(101)).validate().is_err());
        assert!(sample_user().with_tag("a b").validate().is_err());
        assert!(sample_user()
            .with_external_identity(ExternalIdentity::new("", "1"))
            .validate()
            .is_err());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(UserStatus::parse("ACTIVE"), Some(UserStatus::Active));
        assert_eq!(UserStatus::parse("closed"), Some(UserStatus::Closed));
        assert_eq!(UserStatus::parse("zombie"), None);
        assert_eq!(UserStatus::Suspended.to_string(), "suspended");
    }

    #[test]
    fn test_patch_changes_match_full_projection() {
        let user = sample_user();
        let patch = UserPatch::new()
            .email("New@Example.com")
            .clear_name()
            .tag("zzzz9999")
            .status(UserStatus::Suspended);

        let mut item = user.to_item();
        patch.changes(&user.id).apply_to(&mut item);

        let mut expected = user.clone();
        expected.email = "New@Example.com".to_string();
        expected.name = None;
        expected.tag = Some("zzzz9999".to_string());
        expected.status = UserStatus::Suspended;

        assert_eq!(item, expected.to_item());
    }

    #[test]
    fn test_patch_adds_and_clears_external_identity() {
        let user = User::new("a@example.com").with_id("u3");
        let identity = ExternalIdentity::new("wallet", "0xABC");

        let mut item = user.to_item();
        UserPatch::new()
            .external_identity(identity.clone())
            .changes(&user.id)
            .apply_to(&mut item);
        assert_eq!(
            item,
            user.clone().with_external_identity(identity).to_item()
        );

        UserPatch::new()
            .clear_external_identity()
            .changes(&user.id)
            .apply_to(&mut item);
        assert_eq!(item, user.to_item());
    }

    #[test]
    fn test_patch_deleted_at() {
        let at = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let changes = UserPatch::new().deleted_at(at).changes("u1");
        assert_eq!(
            changes.set_attributes().get(DELETED_AT),
            Some(&AttributeValue::from("2024-02-01T00:00:00.000000000Z"))
        );

        let cleared = UserPatch::new().clear_deleted_at().changes("u1");
        assert!(cleared.removed_attributes().contains(DELETED_AT));
    }

    #[test]
    fn test_patch_validate() {
        assert!(UserPatch::new().validate().is_ok());
        assert!(UserPatch::new().email("bad").validate().is_err());
        assert!(UserPatch::new().tag("!").validate().is_err());
        assert!(UserPatch::new().clear_name().validate().is_ok());
    }
}
