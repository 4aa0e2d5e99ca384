//! Cached user repository decorator.
//!
//! Wraps a `UserRepository` implementation with the cache-aside pattern.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use tablestore_core::cache::{deserialize_user, serialize_user, user_email_key, user_key, Cache};
use tablestore_core::keys::canonicalize;
use tablestore_core::models::{User, UserPatch, UserStatus};
use tablestore_core::storage::{QueryOptions, QueryPage, RepositoryResult, UserRepository};

/// Cached user repository decorator.
///
/// Implements the cache-aside pattern:
/// - **Reads**: Check cache first, on miss fetch from repository and populate cache
/// - **Writes**: Persist to repository, invalidate cache
///
/// Email lookups cache only the email to id mapping. A mapping is trusted
/// only while the user it points at still carries that email, so a stale
/// mapping left by an email change is dropped on the next read.
///
/// # Type Parameters
///
/// * `R` - The underlying repository implementation
/// * `C` - The cache implementation
pub struct CachedUserRepository<R, C>
where
    R: UserRepository,
    C: Cache,
{
    repository: Arc<R>,
    cache: Arc<C>,
    ttl: Duration,
}

impl<R, C> CachedUserRepository<R, C>
where
    R: UserRepository,
    C: Cache,
{
    /// Creates a new cached user repository.
    ///
    /// # Arguments
    ///
    /// * `repository` - The underlying repository to cache
    /// * `cache` - The cache implementation
    /// * `ttl` - Time-to-live for cached users and email mappings
    pub fn new(repository: Arc<R>, cache: Arc<C>, ttl: Duration) -> Self {
        Self {
            repository,
            cache,
            ttl,
        }
    }

    async fn cache_user(&self, user: &User) {
        let Ok(bytes) = serialize_user(user) else {
            return;
        };
        if let Err(err) = self
            .cache
            .set(&user_key(&user.id), &bytes, Some(self.ttl))
            .await
        {
            tracing::warn!(user_id = %user.id, error = %err, "Failed to cache user");
        }
    }

    async fn invalidate(&self, key: &str) {
        if let Err(err) = self.cache.delete(key).await {
            tracing::warn!(cache_key = %key, error = %err, "Failed to invalidate cache");
        }
    }

    /// Drops the cached user and, when known, its email mapping.
    async fn invalidate_user(&self, id: &str, email: Option<&str>) {
        self.invalidate(&user_key(id)).await;
        if let Some(email) = email {
            self.invalidate(&user_email_key(email)).await;
        }
    }
}

#[async_trait]
impl<R, C> UserRepository for CachedUserRepository<R, C>
where
    R: UserRepository + 'static,
    C: Cache + 'static,
{
    async fn get_user(&self, id: &str) -> RepositoryResult<Option<User>> {
        let cache_key = user_key(id);

        // Check cache first
        if let Ok(Some(bytes)) = self.cache.get(&cache_key).await {
            if let Ok(user) = deserialize_user(&bytes) {
                tracing::trace!(user_id = %id, "Cache hit for user");
                return Ok(Some(user));
            }
            // Deserialization failed - treat as cache miss
            tracing::warn!(user_id = %id, "Cache user deserialization failed");
        }

        tracing::trace!(user_id = %id, "Cache miss for user");
        let user = self.repository.get_user(id).await?;

        if let Some(ref u) = user {
            self.cache_user(u).await;
        }

        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        let cache_key = user_email_key(email);

        if let Ok(Some(bytes)) = self.cache.get(&cache_key).await {
            if let Ok(id) = String::from_utf8(bytes) {
                match self.get_user(&id).await? {
                    Some(user) if canonicalize(&user.email) == canonicalize(email) => {
                        tracing::trace!(user_id = %id, "Cache hit for user email");
                        return Ok(Some(user));
                    }
                    _ => tracing::trace!(user_id = %id, "Stale user email mapping"),
                }
            }
            self.invalidate(&cache_key).await;
        }

        tracing::trace!("Cache miss for user email");
        let user = self.repository.find_by_email(email).await?;

        if let Some(ref u) = user {
            if let Err(err) = self
                .cache
                .set(&cache_key, u.id.as_bytes(), Some(self.ttl))
                .await
            {
                tracing::warn!(user_id = %u.id, error = %err, "Failed to cache user email");
            }
            self.cache_user(u).await;
        }

        Ok(user)
    }

    async fn find_by_external_identity(
        &self,
        kind: &str,
        value: &str,
    ) -> RepositoryResult<Option<User>> {
        self.repository.find_by_external_identity(kind, value).await
    }

    async fn find_by_tag(&self, tag: &str) -> RepositoryResult<Option<User>> {
        self.repository.find_by_tag(tag).await
    }

    async fn list_by_status(
        &self,
        status: UserStatus,
        options: QueryOptions,
    ) -> RepositoryResult<QueryPage<User>> {
        self.repository.list_by_status(status, options).await
    }

    async fn create_user(&self, user: User) -> RepositoryResult<User> {
        let created = self.repository.create_user(user).await?;

        // Drop any mapping a deleted user left under this email.
        self.invalidate(&user_email_key(&created.email)).await;
        self.cache_user(&created).await;

        tracing::debug!(user_id = %created.id, "User created");
        Ok(created)
    }

    async fn update_user(&self, id: &str, patch: &UserPatch) -> RepositoryResult<User> {
        let result = self.repository.update_user(id, patch).await;

        // Invalidate even on failure: the row may have changed underneath.
        self.invalidate_user(id, patch.email.as_deref()).await;
        result
    }

    async fn mark_deleted(&self, id: &str) -> RepositoryResult<User> {
        let result = self.repository.mark_deleted(id).await;
        self.invalidate_user(id, None).await;
        result
    }

    async fn delete_user(&self, id: &str) -> RepositoryResult<()> {
        self.repository.delete_user(id).await?;
        self.invalidate_user(id, None).await;
        Ok(())
    }

    async fn generate_unique_tag(&self) -> RepositoryResult<String> {
        self.repository.generate_unique_tag().await
    }
}
