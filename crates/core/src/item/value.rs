use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// An attribute map as written to and read from the table.
///
/// Ordered so that serialized forms (pagination cursors, cache payloads) are
/// deterministic.
pub type Item = BTreeMap<String, AttributeValue>;

/// A single stored attribute value.
///
/// Mirrors the engine's wire types and serializes in its externally tagged
/// JSON shape, e.g. `{"S":"USER#42"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeValue {
    /// A string.
    S(String),
    /// A number, kept as its decimal representation.
    N(String),
    Bool(bool),
    Null,
    L(Vec<AttributeValue>),
    M(BTreeMap<String, AttributeValue>),
}

impl AttributeValue {
    /// Builds a number attribute from an integer.
    pub fn number(value: i64) -> Self {
        AttributeValue::N(value.to_string())
    }

    /// Returns the string payload, if this is a string attribute.
    pub fn as_s(&self) -> Option<&str> {
        match self {
            AttributeValue::S(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the decimal payload, if this is a number attribute.
    pub fn as_n(&self) -> Option<&str> {
        match self {
            AttributeValue::N(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    /// Orders two key attribute values the way the engine orders sort keys.
    ///
    /// Strings compare by bytes, numbers numerically. Mixed or non-scalar
    /// types fall back to a fixed type rank so the ordering stays total.
    pub fn cmp_key(&self, other: &Self) -> Ordering {
        match (self, other) {
            (AttributeValue::S(a), AttributeValue::S(b)) => a.as_bytes().cmp(b.as_bytes()),
            (AttributeValue::N(a), AttributeValue::N(b)) => {
                match (a.parse::<f64>(), b.parse::<f64>()) {
                    (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
                    _ => a.cmp(b),
                }
            }
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            AttributeValue::S(_) => 0,
            AttributeValue::N(_) => 1,
            AttributeValue::Bool(_) => 2,
            AttributeValue::Null => 3,
            AttributeValue::L(_) => 4,
            AttributeValue::M(_) => 5,
        }
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::S(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::S(value.to_string())
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        assert_eq!(AttributeValue::from("abc").as_s(), Some("abc"));
        assert_eq!(AttributeValue::number(7).as_n(), Some("7"));
        assert_eq!(AttributeValue::from(true).as_bool(), Some(true));
        assert!(AttributeValue::Null.is_null());
        assert_eq!(AttributeValue::number(7).as_s(), None);
    }

    #[test]
    fn test_cmp_key_strings_are_bytewise() {
        let a = AttributeValue::from("2024-01-01T00:00:00Z#a");
        let b = AttributeValue::from("2024-01-02T00:00:00Z#a");
        assert_eq!(a.cmp_key(&b), Ordering::Less);
        assert_eq!(b.cmp_key(&a), Ordering::Greater);
        assert_eq!(a.cmp_key(&a.clone()), Ordering::Equal);
    }

    #[test]
    fn test_cmp_key_numbers_are_numeric() {
        let nine = AttributeValue::number(9);
        let ten = AttributeValue::number(10);
        assert_eq!(nine.cmp_key(&ten), Ordering::Less);
    }

    #[test]
    fn test_serializes_in_tagged_shape() {
        let json = serde_json::to_string(&AttributeValue::from("USER#1")).unwrap();
        assert_eq!(json, r#"{"S":"USER#1"}"#);

        let parsed: AttributeValue = serde_json::from_str(r#"{"N":"42"}"#).unwrap();
        assert_eq!(parsed, AttributeValue::number(42));
    }
}
