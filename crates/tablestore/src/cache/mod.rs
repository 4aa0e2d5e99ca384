//! Cache backend implementations.
//!
//! This module provides concrete implementations of the cache trait defined
//! in `tablestore_core::cache`, selected at compile time via feature flags.
//!
//! # Feature Flags
//!
//! - `memory` (default): bounded in-memory LRU cache with TTL expiry

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "memory")]
pub use memory::MemoryCache;
