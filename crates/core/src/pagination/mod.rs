//! Opaque continuation tokens.
//!
//! A token wraps exactly the engine's "last evaluated key" marker: the item
//! is serialized to JSON and encoded as unpadded URL-safe base64. Tokens cross
//! process boundaries and are decoded as untrusted input.

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::item::{AttributeValue, Item};
use crate::keys::{Index, PARTITION_KEY, SORT_KEY};

/// Upper bound on an accepted token, well above any real key marker.
pub const MAX_TOKEN_LENGTH: usize = 4096;

/// Errors raised when decoding a continuation token.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Continuation token is empty")]
    Empty,
    #[error("Continuation token too long ({0} bytes)")]
    TooLong(usize),
    #[error("Continuation token is not valid base64")]
    Encoding,
    #[error("Continuation token payload is malformed: {0}")]
    Payload(String),
    #[error("Continuation token belongs to another query: {0}")]
    Mismatch(String),
}

/// An opaque resume position for a paginated query.
///
/// Callers pass tokens through unchanged; only [`decode`] looks inside.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    /// Wraps a token string received from a client.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ContinuationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ContinuationToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}

/// Encodes an engine marker. An absent or empty marker yields no token.
pub fn encode(marker: Option<&Item>) -> Option<ContinuationToken> {
    let marker = marker.filter(|m| !m.is_empty())?;
    // Item serialization cannot fail: keys are strings and values are plain enums.
    let json = serde_json::to_vec(marker).ok()?;
    Some(ContinuationToken(URL_SAFE_NO_PAD.encode(json)))
}

/// Decodes a token back into the marker it was built from.
///
/// Rejects anything [`encode`] could not have produced.
pub fn decode(token: &ContinuationToken) -> Result<Item, TokenError> {
    let raw = token.as_str();
    if raw.is_empty() {
        return Err(TokenError::Empty);
    }
    if raw.len() > MAX_TOKEN_LENGTH {
        return Err(TokenError::TooLong(raw.len()));
    }

    let bytes = URL_SAFE_NO_PAD
        .decode(raw)
        .map_err(|_| TokenError::Encoding)?;
    let marker: Item =
        serde_json::from_slice(&bytes).map_err(|e| TokenError::Payload(e.to_string()))?;

    if marker.is_empty() {
        return Err(TokenError::Payload("empty marker".to_string()));
    }
    // Markers only ever hold key attributes, which are scalars.
    if let Some((name, _)) = marker
        .iter()
        .find(|(_, v)| !matches!(v, AttributeValue::S(_) | AttributeValue::N(_)))
    {
        return Err(TokenError::Payload(format!(
            "non-key attribute in marker: {name}"
        )));
    }

    Ok(marker)
}

/// Decodes an optional token.
pub fn decode_optional(token: Option<&ContinuationToken>) -> Result<Option<Item>, TokenError> {
    token.map(decode).transpose()
}

/// Decodes a token and checks it was issued by a query on `index` within
/// `partition`.
pub fn decode_for(
    token: &ContinuationToken,
    index: Index,
    partition: &str,
) -> Result<Item, TokenError> {
    let marker = decode(token)?;
    check_marker(&marker, index, partition)?;
    Ok(marker)
}

/// Optional form of [`decode_for`].
pub fn decode_optional_for(
    token: Option<&ContinuationToken>,
    index: Index,
    partition: &str,
) -> Result<Option<Item>, TokenError> {
    token.map(|t| decode_for(t, index, partition)).transpose()
}

/// A marker holds exactly the table key plus the queried index's key, and
/// its index partition is the one being queried.
fn check_marker(marker: &Item, index: Index, partition: &str) -> Result<(), TokenError> {
    let mut expected = vec![PARTITION_KEY, SORT_KEY];
    if !index.is_table() {
        expected.push(index.partition_attribute());
        expected.push(index.sort_attribute());
    }

    if let Some(name) = marker.keys().find(|name| !expected.contains(&name.as_str())) {
        return Err(TokenError::Mismatch(format!(
            "attribute {name} is not part of the {index} key"
        )));
    }
    if let Some(name) = expected.iter().find(|name| !marker.contains_key(**name)) {
        return Err(TokenError::Mismatch(format!(
            "missing {index} key attribute {name}"
        )));
    }

    let marked = marker
        .get(index.partition_attribute())
        .and_then(|v| v.as_s());
    if marked != Some(partition) {
        return Err(TokenError::Mismatch(format!(
            "issued for another {index} partition"
        )));
    }
    Ok(())
}
