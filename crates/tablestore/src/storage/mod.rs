//! Engine implementations.
//!
//! This module provides concrete implementations of the
//! `tablestore_core::storage::Engine` trait, selected at compile time via
//! feature flags.
//!
//! # Feature Flags
//!
//! - `inmemory` (default): in-process engine emulating the table and its indexes
//! - `dynamodb`: AWS DynamoDB engine using `aws-sdk-dynamodb`
//!
//! Both can be enabled at once; the store is generic over the engine.
//!
//! # Examples
//!
//! Build with DynamoDB:
//! ```bash
//! cargo build -p tablestore --features dynamodb
//! ```

#[cfg(not(any(feature = "inmemory", feature = "dynamodb")))]
compile_error!(
    "No engine selected. Enable 'inmemory' or 'dynamodb' feature. \
    Example: cargo build -p tablestore --features dynamodb"
);

#[cfg(feature = "inmemory")]
pub mod inmemory;

#[cfg(feature = "dynamodb")]
pub mod dynamodb;

#[cfg(feature = "inmemory")]
pub use inmemory::InMemoryEngine;

#[cfg(feature = "dynamodb")]
pub use dynamodb::DynamoDbEngine;
