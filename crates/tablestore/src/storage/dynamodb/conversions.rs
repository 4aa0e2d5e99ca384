//! DynamoDB attribute conversion functions.
//!
//! Pure functions for converting between SDK attribute value maps and the
//! engine-neutral [`Item`]. These are testable in isolation without DynamoDB
//! access.

use std::collections::{BTreeMap, HashMap};

use aws_sdk_dynamodb::types::AttributeValue as SdkValue;

use tablestore_core::item::{AttributeValue, Item, ItemError};
use tablestore_core::keys::StoreKey;

/// SDK attribute map, as sent to and returned by the client.
pub type SdkItem = HashMap<String, SdkValue>;

pub fn value_to_sdk(value: &AttributeValue) -> SdkValue {
    match value {
        AttributeValue::S(s) => SdkValue::S(s.clone()),
        AttributeValue::N(n) => SdkValue::N(n.clone()),
        AttributeValue::Bool(b) => SdkValue::Bool(*b),
        AttributeValue::Null => SdkValue::Null(true),
        AttributeValue::L(list) => SdkValue::L(list.iter().map(value_to_sdk).collect()),
        AttributeValue::M(map) => SdkValue::M(
            map.iter()
                .map(|(k, v)| (k.clone(), value_to_sdk(v)))
                .collect(),
        ),
    }
}

/// Converts an SDK value read from `field`.
///
/// Binary and set types are never written by this crate and are rejected.
pub fn value_from_sdk(field: &str, value: &SdkValue) -> Result<AttributeValue, ItemError> {
    Ok(match value {
        SdkValue::S(s) => AttributeValue::S(s.clone()),
        SdkValue::N(n) => AttributeValue::N(n.clone()),
        SdkValue::Bool(b) => AttributeValue::Bool(*b),
        SdkValue::Null(_) => AttributeValue::Null,
        SdkValue::L(list) => AttributeValue::L(
            list.iter()
                .map(|v| value_from_sdk(field, v))
                .collect::<Result<_, _>>()?,
        ),
        SdkValue::M(map) => AttributeValue::M(
            map.iter()
                .map(|(k, v)| Ok((k.clone(), value_from_sdk(field, v)?)))
                .collect::<Result<BTreeMap<_, _>, ItemError>>()?,
        ),
        other => {
            return Err(ItemError::InvalidValue {
                field: field.to_string(),
                reason: format!("unsupported attribute type: {other:?}"),
            })
        }
    })
}

pub fn item_to_sdk(item: &Item) -> SdkItem {
    item.iter()
        .map(|(k, v)| (k.clone(), value_to_sdk(v)))
        .collect()
}

pub fn item_from_sdk(item: &SdkItem) -> Result<Item, ItemError> {
    item.iter()
        .map(|(k, v)| Ok((k.clone(), value_from_sdk(k, v)?)))
        .collect()
}

pub fn key_to_sdk(key: &StoreKey) -> SdkItem {
    item_to_sdk(&key.to_item())
}

/// Converts a page or batch of SDK items, failing on the first bad one.
pub fn items_from_sdk(items: Option<Vec<SdkItem>>) -> Result<Vec<Item>, ItemError> {
    items.unwrap_or_default().iter().map(item_from_sdk).collect()
}
