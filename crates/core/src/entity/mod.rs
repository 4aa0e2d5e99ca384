//! The capability every persisted record implements.
//!
//! The store is generic over [`Entity`]: it derives keys, converts to and
//! from items and validates through this trait and never inspects entity
//! fields directly.

mod changes;
mod error;
mod timestamps;
pub mod validation;

pub use changes::Changes;
pub use error::ValidationError;
pub use timestamps::{Timestamps, CREATED_AT, UPDATED_AT};

use crate::item::{Item, ItemError};
use crate::keys::StoreKey;

/// Whether a schema attribute must be present on every stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Required,
    Optional,
}

/// One attribute of an entity's closed schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub presence: Presence,
}

impl Field {
    pub const fn required(name: &'static str) -> Self {
        Self {
            name,
            presence: Presence::Required,
        }
    }

    pub const fn optional(name: &'static str) -> Self {
        Self {
            name,
            presence: Presence::Optional,
        }
    }
}

/// A typed record stored in the table.
pub trait Entity: Clone + Send + Sync + Sized + 'static {
    /// Partial-update payload for this entity.
    type Patch: Patch;

    /// Value of the `entityType` discriminator.
    const ENTITY_TYPE: &'static str;

    /// Every attribute `to_item` may write, including key and index
    /// projections.
    const SCHEMA: &'static [Field];

    fn id(&self) -> &str;

    /// Primary key for the entity with the given id.
    fn key_for(id: &str) -> StoreKey;

    /// Recovers the id from a primary key built by [`Entity::key_for`].
    fn id_from_key(key: &StoreKey) -> Option<&str>;

    fn primary_key(&self) -> StoreKey {
        Self::key_for(self.id())
    }

    fn timestamps(&self) -> &Timestamps;

    fn timestamps_mut(&mut self) -> &mut Timestamps;

    /// Full attribute projection, index keys included.
    fn to_item(&self) -> Item;

    /// Inverse of [`Entity::to_item`]. Missing optional attributes decode as
    /// `None`.
    fn from_item(item: &Item) -> Result<Self, ItemError>;

    fn validate(&self) -> Result<(), ValidationError>;
}

/// A typed partial update for an entity.
pub trait Patch: Send + Sync {
    /// Validates only the fields the patch touches.
    fn validate(&self) -> Result<(), ValidationError>;

    /// Renders the patch for the entity with id `id`.
    ///
    /// Must include every index projection that depends on a patched field.
    fn changes(&self, id: &str) -> Changes;
}

/// Optional schema attributes missing from `item`.
///
/// A full replace removes these so a cleared optional field does not linger
/// on the stored row.
pub fn absent_optional_fields<T: Entity>(item: &Item) -> Vec<&'static str> {
    T::SCHEMA
        .iter()
        .filter(|field| field.presence == Presence::Optional && !item.contains_key(field.name))
        .map(|field| field.name)
        .collect()
}
