use std::fmt;

use serde::{Deserialize, Serialize};

use super::new_id;
use crate::entity::validation::{max_length, require_text, validate_id};
use crate::entity::{Changes, Entity, Field, Patch, Timestamps, ValidationError};
use crate::item::{
    check_entity_type, get_optional_string, get_string, put_optional_string, put_string, Item,
    ItemError,
};
use crate::keys::{
    self, StoreKey, ENTITY_TYPE_ATTR, GSI1_PK, GSI1_SK, GSI4_PK, GSI4_SK, PARTITION_KEY,
    SORT_KEY, VERIFICATION_PREFIX,
};

pub const ENTITY_TYPE_VERIFICATION: &str = "VERIFICATION";

pub const MAX_REASON_LENGTH: usize = 500;
pub const MAX_REFERENCE_LENGTH: usize = 256;

const ID: &str = "id";
const USER_ID: &str = "userId";
const KIND: &str = "kind";
const STATUS: &str = "status";
const REFERENCE: &str = "reference";
const REASON: &str = "reason";

/// What a verification checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationKind {
    Identity,
    Address,
    Document,
}

impl VerificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationKind::Identity => "identity",
            VerificationKind::Address => "address",
            VerificationKind::Document => "document",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "identity" => Some(VerificationKind::Identity),
            "address" => Some(VerificationKind::Address),
            "document" => Some(VerificationKind::Document),
            _ => None,
        }
    }
}

impl fmt::Display for VerificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Expired,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Approved => "approved",
            VerificationStatus::Rejected => "rejected",
            VerificationStatus::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(VerificationStatus::Pending),
            "approved" => Some(VerificationStatus::Approved),
            "rejected" => Some(VerificationStatus::Rejected),
            "expired" => Some(VerificationStatus::Expired),
            _ => None,
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A check performed against a user, e.g. an identity document review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub id: String,
    pub user_id: String,
    pub kind: VerificationKind,
    pub status: VerificationStatus,
    /// Reference assigned by the verification provider.
    pub reference: Option<String>,
    /// Free-form explanation, usually set on rejection.
    pub reason: Option<String>,
    pub timestamps: Timestamps,
}

impl Verification {
    /// Creates a pending verification with a fresh id.
    pub fn new(user_id: impl Into<String>, kind: VerificationKind) -> Self {
        Self {
            id: new_id(),
            user_id: user_id.into(),
            kind,
            status: VerificationStatus::Pending,
            reference: None,
            reason: None,
            timestamps: Timestamps::now(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_status(mut self, status: VerificationStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_timestamps(mut self, timestamps: Timestamps) -> Self {
        self.timestamps = timestamps;
        self
    }
}

impl Entity for Verification {
    type Patch = VerificationPatch;

    const ENTITY_TYPE: &'static str = ENTITY_TYPE_VERIFICATION;

    const SCHEMA: &'static [Field] = &[
        Field::required(PARTITION_KEY),
        Field::required(SORT_KEY),
        Field::required(ENTITY_TYPE_ATTR),
        Field::required(ID),
        Field::required(USER_ID),
        Field::required(KIND),
        Field::required(STATUS),
        Field::optional(REFERENCE),
        Field::optional(REASON),
        Field::required(crate::entity::CREATED_AT),
        Field::required(crate::entity::UPDATED_AT),
        Field::required(GSI1_PK),
        Field::required(GSI1_SK),
        Field::required(GSI4_PK),
        Field::required(GSI4_SK),
    ];

    fn id(&self) -> &str {
        &self.id
    }

    fn key_for(id: &str) -> StoreKey {
        keys::verification_key(id)
    }

    fn id_from_key(key: &StoreKey) -> Option<&str> {
        key.partition.strip_prefix(VERIFICATION_PREFIX)
    }

    fn timestamps(&self) -> &Timestamps {
        &self.timestamps
    }

    fn timestamps_mut(&mut self) -> &mut Timestamps {
        &mut self.timestamps
    }

    fn to_item(&self) -> Item {
        let created_at = &self.timestamps.created_at;
        let mut item = Item::new();

        put_string(&mut item, PARTITION_KEY, keys::verification_pk(&self.id));
        put_string(&mut item, SORT_KEY, keys::verification_sk(&self.id));
        put_string(&mut item, GSI1_PK, keys::verification_gsi1_pk(&self.user_id));
        put_string(
            &mut item,
            GSI1_SK,
            keys::verification_gsi1_sk(created_at, &self.id),
        );
        put_string(
            &mut item,
            GSI4_PK,
            keys::verification_gsi4_pk(self.status.as_str()),
        );
        put_string(
            &mut item,
            GSI4_SK,
            keys::verification_gsi4_sk(self.kind.as_str(), created_at, &self.id),
        );
        put_string(&mut item, ENTITY_TYPE_ATTR, ENTITY_TYPE_VERIFICATION);

        put_string(&mut item, ID, &self.id);
        put_string(&mut item, USER_ID, &self.user_id);
        put_string(&mut item, KIND, self.kind.as_str());
        put_string(&mut item, STATUS, self.status.as_str());
        put_optional_string(&mut item, REFERENCE, self.reference.as_deref());
        put_optional_string(&mut item, REASON, self.reason.as_deref());
        self.timestamps.write(&mut item);

        item
    }

    fn from_item(item: &Item) -> Result<Self, ItemError> {
        check_entity_type(item, ENTITY_TYPE_VERIFICATION)?;

        let kind = get_string(item, KIND)?;
        let status = get_string(item, STATUS)?;

        Ok(Verification {
            id: get_string(item, ID)?,
            user_id: get_string(item, USER_ID)?,
            kind: VerificationKind::parse(&kind).ok_or_else(|| ItemError::InvalidValue {
                field: KIND.to_string(),
                reason: format!("unknown kind: {kind}"),
            })?,
            status: VerificationStatus::parse(&status).ok_or_else(|| {
                ItemError::InvalidValue {
                    field: STATUS.to_string(),
                    reason: format!("unknown status: {status}"),
                }
            })?,
            reference: get_optional_string(item, REFERENCE),
            reason: get_optional_string(item, REASON),
            timestamps: Timestamps::read(item)?,
        })
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validate_id("id", &self.id)?;
        validate_id("userId", &self.user_id)?;
        if let Some(reference) = &self.reference {
            require_text("reference", reference, MAX_REFERENCE_LENGTH)?;
        }
        if let Some(reason) = &self.reason {
            max_length("reason", reason, MAX_REASON_LENGTH)?;
        }
        Ok(())
    }
}

/// Partial update for a [`Verification`].
///
/// `user_id` and `kind` are fixed at creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationPatch {
    pub status: Option<VerificationStatus>,
    pub reference: Option<Option<String>>,
    pub reason: Option<Option<String>>,
}

impl VerificationPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: VerificationStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(Some(reference.into()));
        self
    }

    pub fn clear_reference(mut self) -> Self {
        self.reference = Some(None);
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(Some(reason.into()));
        self
    }

    pub fn clear_reason(mut self) -> Self {
        self.reason = Some(None);
        self
    }
}

impl Patch for VerificationPatch {
    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(Some(reference)) = &self.reference {
            require_text("reference", reference, MAX_REFERENCE_LENGTH)?;
        }
        if let Some(Some(reason)) = &self.reason {
            max_length("reason", reason, MAX_REASON_LENGTH)?;
        }
        Ok(())
    }

    fn changes(&self, _id: &str) -> Changes {
        let mut changes = Changes::new();

        if let Some(status) = &self.status {
            changes
                .set(STATUS, status.as_str())
                .set(GSI4_PK, keys::verification_gsi4_pk(status.as_str()));
        }
        for (name, value) in [(REFERENCE, &self.reference), (REASON, &self.reason)] {
            match value {
                Some(Some(v)) => {
                    changes.set(name, v.as_str());
                }
                Some(None) => {
                    changes.remove(name);
                }
                None => {}
            }
        }

        changes
    }
}
