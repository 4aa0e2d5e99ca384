//! Typed repositories for users and verifications.
//!
//! `TableUserRepository` and `TableVerificationRepository` work on any
//! [`Engine`](tablestore_core::storage::Engine) through a [`Store`](crate::Store).
//! `CachedUserRepository` decorates any user repository with a cache.

mod cached;
mod user;
mod verification;

pub use cached::CachedUserRepository;
pub use user::{TableUserRepository, TagSource};
pub use verification::TableVerificationRepository;
