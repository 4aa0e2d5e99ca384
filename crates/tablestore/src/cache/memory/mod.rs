//! In-memory cache backend.
//!
//! A bounded, time-expiring cache for single-instance deployments.

mod cache;

pub use cache::MemoryCache;
