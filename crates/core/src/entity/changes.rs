use std::collections::BTreeSet;

use crate::item::{AttributeValue, Item};

/// A partial attribute mutation: the payload of an update request.
///
/// An attribute appears in at most one of the three groups; the last call
/// for a given name wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Changes {
    set: Item,
    set_if_absent: Item,
    remove: BTreeSet<String>,
}

impl Changes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite `name` with `value`.
    pub fn set(&mut self, name: &str, value: impl Into<AttributeValue>) -> &mut Self {
        self.set_if_absent.remove(name);
        self.remove.remove(name);
        self.set.insert(name.to_string(), value.into());
        self
    }

    /// Write `value` only if the stored row has no `name` attribute yet.
    pub fn set_if_absent(&mut self, name: &str, value: impl Into<AttributeValue>) -> &mut Self {
        self.set.remove(name);
        self.remove.remove(name);
        self.set_if_absent.insert(name.to_string(), value.into());
        self
    }

    /// Drop `name` from the stored row.
    pub fn remove(&mut self, name: &str) -> &mut Self {
        self.set.remove(name);
        self.set_if_absent.remove(name);
        self.remove.insert(name.to_string());
        self
    }

    pub fn set_attributes(&self) -> &Item {
        &self.set
    }

    pub fn set_if_absent_attributes(&self) -> &Item {
        &self.set_if_absent
    }

    pub fn removed_attributes(&self) -> &BTreeSet<String> {
        &self.remove
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.set_if_absent.is_empty() && self.remove.is_empty()
    }

    /// Applies the mutation to an in-memory item.
    pub fn apply_to(&self, item: &mut Item) {
        for (name, value) in &self.set {
            item.insert(name.clone(), value.clone());
        }
        for (name, value) in &self.set_if_absent {
            item.entry(name.clone()).or_insert_with(|| value.clone());
        }
        for name in &self.remove {
            item.remove(name);
        }
    }
}
