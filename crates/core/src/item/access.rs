//! Typed accessors over raw items.
//!
//! Every entity's `from_item`/`to_item` goes through these helpers so that
//! missing and malformed attributes are reported the same way everywhere.

use chrono::{DateTime, SecondsFormat, Utc};

use super::{AttributeValue, Item, ItemError};
use crate::keys::ENTITY_TYPE_ATTR;

/// Formats a timestamp as fixed-width RFC 3339 (nanoseconds, `Z` suffix).
///
/// Fixed width keeps the string form lexicographically sortable, which the
/// time-ordered index sort keys rely on.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parses a timestamp written by [`format_timestamp`] (or any RFC 3339 value).
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

/// Get a required string attribute.
pub fn get_string(item: &Item, key: &str) -> Result<String, ItemError> {
    item.get(key)
        .and_then(|v| v.as_s())
        .map(|s| s.to_string())
        .ok_or_else(|| ItemError::MissingField(key.to_string()))
}

/// Get an optional string attribute. `Null` reads as absent.
pub fn get_optional_string(item: &Item, key: &str) -> Option<String> {
    item.get(key)
        .and_then(|v| v.as_s())
        .map(|s| s.to_string())
}

/// Get a required datetime attribute (RFC 3339 format).
pub fn get_datetime(item: &Item, key: &str) -> Result<DateTime<Utc>, ItemError> {
    let s = get_string(item, key)?;
    parse_timestamp(&s).map_err(|e| ItemError::InvalidValue {
        field: key.to_string(),
        reason: e.to_string(),
    })
}

/// Get an optional datetime attribute.
///
/// Absent is fine; present but unparsable is an error.
pub fn get_optional_datetime(item: &Item, key: &str) -> Result<Option<DateTime<Utc>>, ItemError> {
    match get_optional_string(item, key) {
        Some(s) => parse_timestamp(&s)
            .map(Some)
            .map_err(|e| ItemError::InvalidValue {
                field: key.to_string(),
                reason: e.to_string(),
            }),
        None => Ok(None),
    }
}

/// Insert a string attribute.
pub fn put_string(item: &mut Item, key: &str, value: impl Into<String>) {
    item.insert(key.to_string(), AttributeValue::S(value.into()));
}

/// Insert a string attribute only when a value is present.
pub fn put_optional_string(item: &mut Item, key: &str, value: Option<&str>) {
    if let Some(value) = value {
        put_string(item, key, value);
    }
}

/// Insert a timestamp attribute.
pub fn put_datetime(item: &mut Item, key: &str, value: &DateTime<Utc>) {
    put_string(item, key, format_timestamp(value));
}

/// Checks the `entityType` discriminator of an item.
pub fn check_entity_type(item: &Item, expected: &'static str) -> Result<(), ItemError> {
    let found = get_string(item, ENTITY_TYPE_ATTR)?;
    if found != expected {
        return Err(ItemError::WrongEntityType { expected, found });
    }
    Ok(())
}
