//! The generic store: typed entity operations over an [`Engine`].
//!
//! A `Store` is a cheap-to-clone handle. It owns no state besides the shared
//! engine and configuration, so one instance is built at the composition root
//! and handed to every repository.
//!
//! Single-item operations are one engine request each and are never retried
//! here. Multi-request operations (pagination, batches) live in the
//! submodules and report partial progress on cancellation.

mod batch;
mod clock;
mod query;
mod retry;
mod transaction;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tracing::{debug, warn};

use tablestore_core::entity::validation::validate_id;
use tablestore_core::entity::{absent_optional_fields, Changes, Entity, Patch, CREATED_AT, UPDATED_AT};
use tablestore_core::item::format_timestamp;
use tablestore_core::keys::{StoreKey, PARTITION_KEY, SORT_KEY};
use tablestore_core::storage::{
    Cancellation, Condition, Engine, Projection, Result, StoreConfig, StoreError,
};

pub use transaction::Transaction;

/// Read-then-write rounds `save` attempts before reporting a conflict.
const SAVE_ATTEMPTS: u32 = 3;

/// Typed access to a single table.
pub struct Store<E> {
    engine: Arc<E>,
    config: Arc<StoreConfig>,
    cancellation: Cancellation,
}

impl<E> Clone for Store<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            config: Arc::clone(&self.config),
            cancellation: self.cancellation.clone(),
        }
    }
}

impl<E: Engine> Store<E> {
    pub fn new(engine: E, config: StoreConfig) -> Self {
        Self::from_shared(Arc::new(engine), config)
    }

    /// Builds a store over an engine handle shared with other owners.
    pub fn from_shared(engine: Arc<E>, config: StoreConfig) -> Self {
        Self {
            engine,
            config: Arc::new(config),
            cancellation: Cancellation::never(),
        }
    }

    /// A handle on the same engine whose operations observe `cancellation`.
    pub fn with_cancellation(&self, cancellation: Cancellation) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            config: Arc::clone(&self.config),
            cancellation,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn cancellation(&self) -> &Cancellation {
        &self.cancellation
    }

    /// Races one engine request against the cancellation signal.
    async fn guarded<T>(
        &self,
        operation: &'static str,
        target: impl fmt::Display,
        request: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        if self.cancellation.is_cancelled() {
            warn!(operation, target = %target, "Operation cancelled before dispatch");
            return Err(StoreError::Cancelled);
        }

        tokio::select! {
            biased;
            result = request => result,
            _ = self.cancellation.cancelled() => {
                warn!(operation, target = %target, "Operation cancelled in flight");
                Err(StoreError::Cancelled)
            }
        }
    }

    /// Runs one request of a multi-request operation. `None` means the
    /// signal fired first and the caller should return its partial result.
    async fn interruptible<T>(
        &self,
        request: impl Future<Output = Result<T>>,
    ) -> Option<Result<T>> {
        if self.cancellation.is_cancelled() {
            return None;
        }

        tokio::select! {
            biased;
            result = request => Some(result),
            _ = self.cancellation.cancelled() => None,
        }
    }

    /// Reads an entity by id. A missing row is `Ok(None)`.
    pub async fn get<T: Entity>(&self, id: &str) -> Result<Option<T>> {
        validate_id("id", id)?;
        let key = T::key_for(id);
        let item = self
            .guarded("get", &key, self.engine.get_item(&key, Projection::All))
            .await?;
        Ok(item.map(|item| T::from_item(&item)).transpose()?)
    }

    /// Writes a new entity, failing with `Conflict` if its key is taken.
    ///
    /// Stamps `createdAt` and `updatedAt` with the current time.
    pub async fn create<T: Entity>(&self, mut entity: T) -> Result<T> {
        entity.validate()?;
        let now = clock::now();
        entity.timestamps_mut().created_at = now;
        entity.timestamps_mut().touch(now);

        let key = entity.primary_key();
        self.guarded(
            "create",
            &key,
            self.engine
                .put_item(entity.to_item(), Some(&Condition::ItemNotExists)),
        )
        .await?;

        debug!(entity_type = T::ENTITY_TYPE, key = %key, "Created item");
        Ok(entity)
    }

    /// Creates or replaces an entity.
    ///
    /// An existing row keeps its stored `createdAt`, and every index key
    /// derived from it is rebuilt from the stored value; a new row takes the
    /// entity's. Optional attributes the entity lacks are removed. Returns
    /// the entity as stored.
    ///
    /// The write is conditioned on the `createdAt` that was read, so a row
    /// created or deleted concurrently causes a re-read rather than a row
    /// whose index keys disagree with its attributes.
    pub async fn save<T: Entity>(&self, mut entity: T) -> Result<T> {
        entity.validate()?;
        entity.timestamps_mut().touch(clock::now());
        let key = entity.primary_key();

        let mut attempt = 1;
        loop {
            let current = self
                .guarded("save", &key, self.engine.get_item(&key, Projection::All))
                .await?;
            let condition = match current {
                Some(row) => {
                    let stored = T::from_item(&row)?.timestamps().created_at;
                    entity.timestamps_mut().created_at = stored;
                    Condition::equals(CREATED_AT, format_timestamp(&stored))
                }
                None => Condition::ItemNotExists,
            };

            let changes = replacement(&entity);
            let result = self
                .guarded(
                    "save",
                    &key,
                    self.engine.update_item(&key, &changes, Some(&condition)),
                )
                .await;

            match result {
                Ok(stored) => {
                    debug!(entity_type = T::ENTITY_TYPE, key = %key, attempt, "Saved item");
                    return Ok(T::from_item(&stored)?);
                }
                Err(StoreError::Conflict { .. }) if attempt < SAVE_ATTEMPTS => {
                    debug!(entity_type = T::ENTITY_TYPE, key = %key, attempt, "Save raced, re-reading");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Applies a partial update and stamps `updatedAt`.
    ///
    /// Returns the merged entity, or `Ok(None)` when no row exists; a patch
    /// never creates a row.
    pub async fn update<T: Entity>(&self, id: &str, patch: &T::Patch) -> Result<Option<T>> {
        validate_id("id", id)?;
        patch.validate()?;

        let key = T::key_for(id);
        let mut changes = patch.changes(id);
        changes.set(UPDATED_AT, format_timestamp(&clock::now()));

        let result = self
            .guarded(
                "update",
                &key,
                self.engine
                    .update_item(&key, &changes, Some(&Condition::ItemExists)),
            )
            .await;

        match result {
            Ok(item) => {
                debug!(entity_type = T::ENTITY_TYPE, key = %key, "Updated item");
                Ok(Some(T::from_item(&item)?))
            }
            Err(StoreError::Conflict { .. }) => {
                debug!(entity_type = T::ENTITY_TYPE, key = %key, "Update target not found");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Hard-deletes an entity. Deleting an absent row succeeds.
    pub async fn delete<T: Entity>(&self, id: &str) -> Result<()> {
        validate_id("id", id)?;
        let key = T::key_for(id);
        self.guarded("delete", &key, self.engine.delete_item(&key, None))
            .await?;

        debug!(entity_type = T::ENTITY_TYPE, key = %key, "Deleted item");
        Ok(())
    }

    /// Whether a row exists for the id. Reads key attributes only.
    pub async fn exists<T: Entity>(&self, id: &str) -> Result<bool> {
        validate_id("id", id)?;
        let key = T::key_for(id);
        let item = self
            .guarded(
                "exists",
                &key,
                self.engine.get_item(&key, Projection::KeysOnly),
            )
            .await?;
        Ok(item.is_some())
    }
}

/// Changes that turn any row at the entity's key into exactly `entity`.
fn replacement<T: Entity>(entity: &T) -> Changes {
    let item = entity.to_item();
    let mut changes = Changes::new();
    for field in absent_optional_fields::<T>(&item) {
        changes.remove(field);
    }
    for (name, value) in item {
        if name != PARTITION_KEY && name != SORT_KEY {
            changes.set(&name, value);
        }
    }
    changes
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::time::Duration;

    use tablestore_core::entity::ValidationError;
    use tablestore_core::models::{User, UserPatch, UserStatus};

    use crate::storage::inmemory::InMemoryEngine;

    pub(crate) fn store() -> Store<InMemoryEngine> {
        Store::new(InMemoryEngine::new(), StoreConfig::default())
    }

    pub(crate) fn user(id: &str) -> User {
        User::new(format!("{id}@example.com")).with_id(id)
    }

    #[tokio::test]
    async fn test_get_absent_is_none() {
        let store = store();
        let user: Option<User> = store.get("missing").await.unwrap();
        assert!(user.is_none());
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let store = store();
        let created = store.create(user("u1").with_name("Ada")).await.unwrap();
        assert_eq!(
            created.timestamps.created_at,
            created.timestamps.updated_at
        );

        let fetched: User = store.get("u1").await.unwrap().unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_second_create_conflicts_and_keeps_first() {
        let store = store();
        let first = store.create(user("u1").with_name("First")).await.unwrap();

        let err = store
            .create(user("u1").with_name("Second"))
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        let fetched: User = store.get("u1").await.unwrap().unwrap();
        assert_eq!(fetched, first);
    }

    #[tokio::test]
    async fn test_concurrent_creates_exactly_one_wins() {
        let store = store();
        let (a, b) = tokio::join!(
            store.create(user("u2").with_name("A")),
            store.create(user("u2").with_name("B")),
        );

        let outcomes = [a, b];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(StoreError::is_conflict));
    }

    #[tokio::test]
    async fn test_concurrent_creates_across_tasks() {
        let store = store();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.create(user("u2")).await })
            })
            .collect();

        let mut succeeded = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(e) => assert!(e.is_conflict()),
            }
        }
        assert_eq!(succeeded, 1);
    }

    #[tokio::test]
    async fn test_invalid_entity_performs_no_io() {
        let store = store();
        let err = store.create(User::new("not-an-email").with_id("u1")).await;
        assert!(matches!(err, Err(StoreError::Validation(_))));

        let err = store.get::<User>("bad#id").await;
        assert!(matches!(
            err,
            Err(StoreError::Validation(ValidationError::Invalid { .. }))
        ));

        let stats = store.engine().stats().await;
        assert_eq!(stats.put_item, 0);
        assert_eq!(stats.get_item, 0);
    }

    #[tokio::test]
    async fn test_updates_merge() {
        let store = store();
        store.create(user("u1")).await.unwrap();

        let first: User = store
            .update("u1", &UserPatch::new().name("Ada"))
            .await
            .unwrap()
            .unwrap();
        let second: User = store
            .update("u1", &UserPatch::new().status(UserStatus::Active))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(second.name.as_deref(), Some("Ada"));
        assert_eq!(second.status, UserStatus::Active);
        assert!(second.timestamps.updated_at > first.timestamps.updated_at);
        assert_eq!(second.timestamps.created_at, first.timestamps.created_at);

        let fetched: User = store.get("u1").await.unwrap().unwrap();
        assert_eq!(fetched, second);
    }

    #[tokio::test]
    async fn test_update_absent_row_is_none() {
        let store = store();
        let updated: Option<User> = store
            .update("ghost", &UserPatch::new().name("Ada"))
            .await
            .unwrap();
        assert!(updated.is_none());
        assert!(store.engine().is_empty().await);
    }

    #[tokio::test]
    async fn test_update_rejects_invalid_patch() {
        let store = store();
        store.create(user("u1")).await.unwrap();

        let err = store
            .update::<User>("u1", &UserPatch::new().email("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert_eq!(store.engine().stats().await.update_item, 0);
    }

    #[tokio::test]
    async fn test_save_preserves_created_at_and_clears_optionals() {
        let store = store();
        let created = store.create(user("u1").with_name("Ada")).await.unwrap();

        let mut replacement = user("u1");
        replacement.timestamps = tablestore_core::entity::Timestamps::now();
        let saved = store.save(replacement).await.unwrap();

        assert_eq!(saved.timestamps.created_at, created.timestamps.created_at);
        assert!(saved.timestamps.updated_at > created.timestamps.updated_at);
        assert_eq!(saved.name, None);

        let fetched: User = store.get("u1").await.unwrap().unwrap();
        assert_eq!(fetched, saved);
    }

    #[tokio::test]
    async fn test_save_rebuilds_index_keys_from_stored_created_at() {
        let store = store();
        let created = store
            .create(user("u1").with_status(UserStatus::Active))
            .await
            .unwrap();

        let mut replacement = user("u1").with_status(UserStatus::Active);
        replacement.timestamps.created_at = "2030-01-01T00:00:00Z".parse().unwrap();
        let saved = store.save(replacement).await.unwrap();
        assert_eq!(saved.timestamps.created_at, created.timestamps.created_at);

        let row = store
            .engine()
            .get_item(&User::key_for("u1"), Projection::All)
            .await
            .unwrap()
            .unwrap();
        let expected_sort = format!("{}#u1", format_timestamp(&created.timestamps.created_at));
        assert_eq!(
            row.get(tablestore_core::keys::GSI4_SK).and_then(|v| v.as_s()),
            Some(expected_sort.as_str())
        );
        assert_eq!(User::from_item(&row).unwrap().to_item(), row);
    }

    #[tokio::test]
    async fn test_save_reads_before_writing() {
        let store = store();
        store.create(user("u1")).await.unwrap();
        store.engine().reset_stats().await;

        store.save(user("u1").with_name("Ada")).await.unwrap();
        let stats = store.engine().stats().await;
        assert_eq!(stats.get_item, 1);
        assert_eq!(stats.update_item, 1);
    }

    #[tokio::test]
    async fn test_save_creates_missing_row() {
        let store = store();
        let saved = store.save(user("u1")).await.unwrap();
        assert!(store.exists::<User>("u1").await.unwrap());
        assert_eq!(store.get::<User>("u1").await.unwrap(), Some(saved));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = store();
        store.create(user("u1")).await.unwrap();

        store.delete::<User>("u1").await.unwrap();
        store.delete::<User>("u1").await.unwrap();
        assert!(!store.exists::<User>("u1").await.unwrap());
    }

    #[tokio::test]
    async fn test_transient_errors_surface_without_retry() {
        let store = store();
        store.engine().throttle_next(1).await;

        let err = store.get::<User>("u1").await.unwrap_err();
        assert!(matches!(err, StoreError::Transient(_)));
        assert_eq!(store.engine().stats().await.get_item, 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_dispatch() {
        let (handle, cancellation) = Cancellation::channel();
        let store = store().with_cancellation(cancellation);
        handle.cancel();

        let err = store.create(user("u1")).await.unwrap_err();
        assert_eq!(err, StoreError::Cancelled);
        assert_eq!(store.engine().stats().await.put_item, 0);
    }

    #[tokio::test]
    async fn test_deadline_cancels_in_flight_request() {
        let engine = InMemoryEngine::new().with_latency(Duration::from_millis(500));
        let store = Store::new(engine, StoreConfig::default())
            .with_cancellation(Cancellation::never().with_timeout(Duration::from_millis(20)));

        let err = store.get::<User>("u1").await.unwrap_err();
        assert_eq!(err, StoreError::Cancelled);
    }
}
