//! In-memory engine for testing.
//!
//! Stores rows in a `BTreeMap` wrapped in `Arc<RwLock<_>>` and emulates the
//! secondary indexes, request limits and partial batch failures of the real
//! engine. Useful for tests and development where persistence is not
//! required.
//!
//! # Example
//!
//! ```rust,ignore
//! use tablestore::storage::inmemory::InMemoryEngine;
//!
//! let engine = InMemoryEngine::new();
//! engine.unprocessed_keys_next(3).await;
//! // Use engine for testing...
//! ```

mod engine;

pub use engine::{EngineLimits, InMemoryEngine, RequestStats};
