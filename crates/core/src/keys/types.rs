use std::fmt;

use crate::item::{AttributeValue, Item};

use super::{
    GSI1_PK, GSI1_SK, GSI2_PK, GSI2_SK, GSI3_PK, GSI3_SK, GSI4_PK, GSI4_SK, PARTITION_KEY,
    SORT_KEY,
};

/// A primary key: partition component plus optional sort component.
///
/// Opaque to everything above the store; typed repositories only ever build
/// one through the key functions in this module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreKey {
    pub partition: String,
    pub sort: Option<String>,
}

impl StoreKey {
    pub fn new(partition: impl Into<String>, sort: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            sort: Some(sort.into()),
        }
    }

    pub fn partition_only(partition: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            sort: None,
        }
    }

    /// Renders the key as the `PK`/`SK` attribute map the engine expects.
    pub fn to_item(&self) -> Item {
        let mut item = Item::new();
        item.insert(
            PARTITION_KEY.to_string(),
            AttributeValue::S(self.partition.clone()),
        );
        if let Some(sort) = &self.sort {
            item.insert(SORT_KEY.to_string(), AttributeValue::S(sort.clone()));
        }
        item
    }

    /// Extracts the primary key from a full or key-only item.
    pub fn from_item(item: &Item) -> Option<Self> {
        let partition = item.get(PARTITION_KEY)?.as_s()?.to_string();
        let sort = item
            .get(SORT_KEY)
            .and_then(|v| v.as_s())
            .map(|s| s.to_string());
        Some(Self { partition, sort })
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sort {
            Some(sort) => write!(f, "{}|{}", self.partition, sort),
            None => f.write_str(&self.partition),
        }
    }
}

/// The table itself or one of its overloaded global secondary indexes.
///
/// Slots are shared between entity types; the partition prefixes keep them
/// apart:
///
/// - `Gsi1`: user by email, verifications by user
/// - `Gsi2`: user by external identity
/// - `Gsi3`: user by tag
/// - `Gsi4`: entity type + status listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Index {
    Table,
    Gsi1,
    Gsi2,
    Gsi3,
    Gsi4,
}

impl Index {
    /// Attribute holding this index's partition component.
    pub fn partition_attribute(self) -> &'static str {
        match self {
            Index::Table => PARTITION_KEY,
            Index::Gsi1 => GSI1_PK,
            Index::Gsi2 => GSI2_PK,
            Index::Gsi3 => GSI3_PK,
            Index::Gsi4 => GSI4_PK,
        }
    }

    /// Attribute holding this index's sort component.
    pub fn sort_attribute(self) -> &'static str {
        match self {
            Index::Table => SORT_KEY,
            Index::Gsi1 => GSI1_SK,
            Index::Gsi2 => GSI2_SK,
            Index::Gsi3 => GSI3_SK,
            Index::Gsi4 => GSI4_SK,
        }
    }

    pub fn is_table(self) -> bool {
        matches!(self, Index::Table)
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Index::Table => "table",
            Index::Gsi1 => "GSI1",
            Index::Gsi2 => "GSI2",
            Index::Gsi3 => "GSI3",
            Index::Gsi4 => "GSI4",
        };
        f.write_str(name)
    }
}
