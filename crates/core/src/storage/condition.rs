//! Conditions over stored rows: write preconditions, query filters and key
//! conditions.
//!
//! Each type can both render to an engine expression (see
//! [`super::expression`]) and be evaluated against an in-memory item, so the
//! in-memory engine and the DynamoDB engine agree on semantics.

use std::cmp::Ordering;

use crate::item::{AttributeValue, Item};
use crate::keys::{PARTITION_KEY, StoreKey};

/// A precondition on a single row, or a post-fetch query filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// A row exists at the target key.
    ItemExists,
    /// No row exists at the target key.
    ItemNotExists,
    Equals(String, AttributeValue),
    NotEquals(String, AttributeValue),
    AttributeExists(String),
    AttributeNotExists(String),
    BeginsWith(String, String),
    And(Vec<Condition>),
}

impl Condition {
    pub fn equals(name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Condition::Equals(name.into(), value.into())
    }

    pub fn not_equals(name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Condition::NotEquals(name.into(), value.into())
    }

    pub fn begins_with(name: impl Into<String>, prefix: impl Into<String>) -> Self {
        Condition::BeginsWith(name.into(), prefix.into())
    }

    pub fn and(self, other: Condition) -> Self {
        match self {
            Condition::And(mut all) => {
                all.push(other);
                Condition::And(all)
            }
            first => Condition::And(vec![first, other]),
        }
    }

    /// Evaluates the condition against the current row, `None` if absent.
    pub fn evaluate(&self, item: Option<&Item>) -> bool {
        let attr = |name: &str| item.and_then(|i| i.get(name));
        match self {
            Condition::ItemExists => item.is_some(),
            Condition::ItemNotExists => item.is_none(),
            Condition::Equals(name, value) => attr(name) == Some(value),
            Condition::NotEquals(name, value) => attr(name) != Some(value),
            Condition::AttributeExists(name) => attr(name).is_some(),
            Condition::AttributeNotExists(name) => attr(name).is_none(),
            Condition::BeginsWith(name, prefix) => attr(name)
                .and_then(|v| v.as_s())
                .is_some_and(|s| s.starts_with(prefix.as_str())),
            Condition::And(all) => all.iter().all(|c| c.evaluate(item)),
        }
    }

    /// Row-existence conditions check the partition key attribute.
    pub(crate) fn existence_attribute() -> &'static str {
        PARTITION_KEY
    }
}

/// A range condition on an index sort component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortCondition {
    Eq(String),
    Lt(String),
    Le(String),
    Gt(String),
    Ge(String),
    /// Inclusive on both ends.
    Between(String, String),
    BeginsWith(String),
}

impl SortCondition {
    pub fn matches(&self, value: &str) -> bool {
        let cmp = |other: &str| value.as_bytes().cmp(other.as_bytes());
        match self {
            SortCondition::Eq(v) => cmp(v) == Ordering::Equal,
            SortCondition::Lt(v) => cmp(v) == Ordering::Less,
            SortCondition::Le(v) => cmp(v) != Ordering::Greater,
            SortCondition::Gt(v) => cmp(v) == Ordering::Greater,
            SortCondition::Ge(v) => cmp(v) != Ordering::Less,
            SortCondition::Between(lo, hi) => {
                cmp(lo) != Ordering::Less && cmp(hi) != Ordering::Greater
            }
            SortCondition::BeginsWith(prefix) => value.starts_with(prefix.as_str()),
        }
    }
}

/// Equality on the index partition plus an optional sort range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCondition {
    pub partition: String,
    pub sort: Option<SortCondition>,
}

impl KeyCondition {
    pub fn partition(partition: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            sort: None,
        }
    }

    pub fn with_sort(mut self, sort: SortCondition) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Key condition selecting exactly the row at `key`.
    pub fn for_key(key: &StoreKey) -> Self {
        Self {
            partition: key.partition.clone(),
            sort: key.sort.clone().map(SortCondition::Eq),
        }
    }

    /// Whether a row with the given index key attributes satisfies the condition.
    pub fn matches(&self, partition: &str, sort: Option<&str>) -> bool {
        if partition != self.partition {
            return false;
        }
        match (&self.sort, sort) {
            (None, _) => true,
            (Some(cond), Some(value)) => cond.matches(value),
            (Some(_), None) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> Item {
        let mut item = Item::new();
        item.insert("PK".to_string(), AttributeValue::from("USER#u1"));
        item.insert("status".to_string(), AttributeValue::from("active"));
        item.insert("email".to_string(), AttributeValue::from("a@example.com"));
        item
    }

    #[test]
    fn test_existence_conditions() {
        let item = item();
        assert!(Condition::ItemExists.evaluate(Some(&item)));
        assert!(!Condition::ItemExists.evaluate(None));
        assert!(Condition::ItemNotExists.evaluate(None));
        assert!(!Condition::ItemNotExists.evaluate(Some(&item)));
    }

    #[test]
    fn test_attribute_conditions() {
        let item = item();
        assert!(Condition::equals("status", "active").evaluate(Some(&item)));
        assert!(!Condition::equals("status", "closed").evaluate(Some(&item)));
        assert!(Condition::not_equals("status", "closed").evaluate(Some(&item)));
        assert!(Condition::not_equals("missing", "x").evaluate(Some(&item)));
        assert!(Condition::AttributeExists("email".into()).evaluate(Some(&item)));
        assert!(Condition::AttributeNotExists("tag".into()).evaluate(Some(&item)));
        assert!(Condition::begins_with("PK", "USER#").evaluate(Some(&item)));
        assert!(!Condition::begins_with("status", "USER#").evaluate(Some(&item)));
    }

    #[test]
    fn test_and_flattens() {
        let cond = Condition::ItemExists
            .and(Condition::equals("status", "active"))
            .and(Condition::AttributeExists("email".into()));
        match &cond {
            Condition::And(all) => assert_eq!(all.len(), 3),
            other => panic!("expected And, got {other:?}"),
        }
        assert!(cond.evaluate(Some(&item())));
        assert!(!cond.evaluate(None));
    }

    #[test]
    fn test_sort_conditions() {
        assert!(SortCondition::Eq("b".into()).matches("b"));
        assert!(SortCondition::Lt("b".into()).matches("a"));
        assert!(SortCondition::Le("b".into()).matches("b"));
        assert!(SortCondition::Gt("b".into()).matches("c"));
        assert!(SortCondition::Ge("b".into()).matches("b"));
        assert!(!SortCondition::Ge("b".into()).matches("a"));
        assert!(SortCondition::Between("b".into(), "d".into()).matches("d"));
        assert!(!SortCondition::Between("b".into(), "d".into()).matches("e"));
        assert!(SortCondition::BeginsWith("VERIF#".into()).matches("VERIF#2024"));
    }

    #[test]
    fn test_key_condition_matches() {
        let cond = KeyCondition::partition("USER#u1")
            .with_sort(SortCondition::BeginsWith("VERIF#".into()));
        assert!(cond.matches("USER#u1", Some("VERIF#1")));
        assert!(!cond.matches("USER#u2", Some("VERIF#1")));
        assert!(!cond.matches("USER#u1", None));
        assert!(KeyCondition::partition("USER#u1").matches("USER#u1", None));
    }

    #[test]
    fn test_key_condition_for_key() {
        let key = StoreKey::new("USER#u1", "USER#u1");
        let cond = KeyCondition::for_key(&key);
        assert!(cond.matches("USER#u1", Some("USER#u1")));
        assert!(!cond.matches("USER#u1", Some("USER#u2")));
    }
}
