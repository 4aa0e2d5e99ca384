//! Caller-edge cache contracts.
//!
//! The cache is advisory: entries may be evicted at any time and it is never
//! consulted on a write path.

mod error;
mod keys;
mod serialization;
mod traits;

pub use error::{CacheError, Result};
pub use keys::{user_email_key, user_key};
pub use serialization::{deserialize_user, serialize_user, SerializationError};
pub use traits::Cache;
