//! Imperative shell of the tablestore data-access layer.
//!
//! Owns every piece of I/O: the key-value engines, the generic [`Store`],
//! the typed repositories and the caller-edge cache. Pure logic lives in
//! `tablestore_core`.
//!
//! # Feature Flags
//!
//! - `inmemory` (default): in-memory engine for tests and development
//! - `dynamodb`: AWS DynamoDB engine using `aws-sdk-dynamodb`
//! - `memory` (default): bounded LRU/TTL memory cache
//!
//! # Example
//!
//! ```rust,ignore
//! use tablestore::storage::inmemory::InMemoryEngine;
//! use tablestore::{Config, Store, TableUserRepository};
//! use tablestore_core::models::User;
//! use tablestore_core::storage::UserRepository;
//!
//! let config = Config::from_env();
//! let store = Store::new(InMemoryEngine::new(), config.store);
//! let users = TableUserRepository::new(store);
//! let user = users.create_user(User::new("ada@example.com")).await?;
//! ```

pub mod cache;
pub mod config;
pub mod repository;
pub mod storage;
pub mod store;
pub mod telemetry;

pub use config::Config;
pub use repository::{CachedUserRepository, TableUserRepository, TableVerificationRepository};
pub use store::{Store, Transaction};
