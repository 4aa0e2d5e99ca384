//! User repository over the generic store.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use tablestore_core::entity::Entity;
use tablestore_core::keys::{user_gsi1_pk, user_gsi2_pk, user_gsi3_pk, user_gsi4_pk, Index};
use tablestore_core::models::{random_tag, validate_tag, User, UserPatch, UserStatus};
use tablestore_core::storage::{
    Engine, KeyCondition, QueryOptions, QueryPage, RepositoryError, RepositoryResult, StoreError,
    UserRepository,
};

use crate::store::Store;

const ENTITY: &str = "User";

/// Produces candidate tags for new users.
pub type TagSource = Arc<dyn Fn() -> String + Send + Sync>;

/// [`UserRepository`] backed by the single table.
///
/// Lookups by email, external identity and tag each read one index entry.
/// Uniqueness of those attributes is probed before writing, which narrows
/// but does not close the window for two concurrent writers.
pub struct TableUserRepository<E> {
    store: Store<E>,
    tags: TagSource,
}

impl<E: Engine> TableUserRepository<E> {
    pub fn new(store: Store<E>) -> Self {
        Self {
            store,
            tags: Arc::new(random_tag),
        }
    }

    /// Replaces the random tag generator.
    pub fn with_tag_source(mut self, tags: impl Fn() -> String + Send + Sync + 'static) -> Self {
        self.tags = Arc::new(tags);
        self
    }

    pub fn store(&self) -> &Store<E> {
        &self.store
    }

    /// Single-result lookup on a unique index partition.
    async fn find_one(&self, index: Index, partition: String) -> RepositoryResult<Option<User>> {
        let page = self
            .store
            .query_by_index::<User>(
                index,
                KeyCondition::partition(partition),
                QueryOptions::new().limit(1),
            )
            .await?;
        Ok(page.items.into_iter().next())
    }

    /// Fails with `Duplicate` if `holder` is a user other than `id`.
    fn ensure_free(
        holder: Option<User>,
        id: &str,
        field: &'static str,
        value: &str,
    ) -> RepositoryResult<()> {
        match holder {
            Some(other) if other.id != id => Err(RepositoryError::Duplicate {
                entity_type: ENTITY,
                field,
                value: value.to_string(),
            }),
            _ => Ok(()),
        }
    }

    async fn ensure_unique(&self, id: &str, patch: &UserPatch) -> RepositoryResult<()> {
        if let Some(email) = &patch.email {
            let holder = self.find_one(Index::Gsi1, user_gsi1_pk(email)).await?;
            Self::ensure_free(holder, id, "email", email)?;
        }
        if let Some(Some(identity)) = &patch.external_identity {
            let holder = self
                .find_one(Index::Gsi2, user_gsi2_pk(&identity.kind, &identity.value))
                .await?;
            Self::ensure_free(holder, id, "externalIdentity", &identity.value)?;
        }
        if let Some(tag) = &patch.tag {
            let holder = self.find_one(Index::Gsi3, user_gsi3_pk(tag)).await?;
            Self::ensure_free(holder, id, "tag", tag)?;
        }
        Ok(())
    }

    fn not_found(id: &str) -> RepositoryError {
        RepositoryError::NotFound {
            entity_type: ENTITY,
            id: id.to_string(),
        }
    }
}

#[async_trait]
impl<E: Engine + 'static> UserRepository for TableUserRepository<E> {
    async fn get_user(&self, id: &str) -> RepositoryResult<Option<User>> {
        Ok(self.store.get::<User>(id).await?)
    }

    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        self.find_one(Index::Gsi1, user_gsi1_pk(email)).await
    }

    async fn find_by_external_identity(
        &self,
        kind: &str,
        value: &str,
    ) -> RepositoryResult<Option<User>> {
        self.find_one(Index::Gsi2, user_gsi2_pk(kind, value)).await
    }

    async fn find_by_tag(&self, tag: &str) -> RepositoryResult<Option<User>> {
        self.find_one(Index::Gsi3, user_gsi3_pk(tag)).await
    }

    async fn list_by_status(
        &self,
        status: UserStatus,
        options: QueryOptions,
    ) -> RepositoryResult<QueryPage<User>> {
        Ok(self
            .store
            .query_by_index(
                Index::Gsi4,
                KeyCondition::partition(user_gsi4_pk(status.as_str())),
                options,
            )
            .await?)
    }

    async fn create_user(&self, mut user: User) -> RepositoryResult<User> {
        user.validate()?;

        let mut probe = UserPatch::new().email(user.email.clone());
        if let Some(identity) = &user.external_identity {
            probe = probe.external_identity(identity.clone());
        }
        if let Some(tag) = &user.tag {
            probe = probe.tag(tag.clone());
        }
        self.ensure_unique(&user.id, &probe).await?;

        if user.tag.is_none() {
            user.tag = Some(self.generate_unique_tag().await?);
        }

        let id = user.id.clone();
        let created = self.store.create(user).await.map_err(|e| match e {
            StoreError::Conflict { .. } => RepositoryError::AlreadyExists {
                entity_type: ENTITY,
                id,
            },
            other => other.into(),
        })?;

        debug!(user_id = %created.id, tag = ?created.tag, "User created");
        Ok(created)
    }

    async fn update_user(&self, id: &str, patch: &UserPatch) -> RepositoryResult<User> {
        // Validation precedes the uniqueness probes.
        tablestore_core::entity::Patch::validate(patch)?;
        self.ensure_unique(id, patch).await?;

        let updated = self
            .store
            .update::<User>(id, patch)
            .await?
            .ok_or_else(|| Self::not_found(id))?;

        debug!(user_id = %id, "User updated");
        Ok(updated)
    }

    async fn mark_deleted(&self, id: &str) -> RepositoryResult<User> {
        let patch = UserPatch::new().deleted_at(Utc::now());
        let user = self
            .store
            .update::<User>(id, &patch)
            .await?
            .ok_or_else(|| Self::not_found(id))?;

        debug!(user_id = %id, "User marked deleted");
        Ok(user)
    }

    async fn delete_user(&self, id: &str) -> RepositoryResult<()> {
        self.store.delete::<User>(id).await?;
        debug!(user_id = %id, "User deleted");
        Ok(())
    }

    async fn generate_unique_tag(&self) -> RepositoryResult<String> {
        let attempts = self.store.config().tag_attempts;
        for attempt in 1..=attempts {
            let candidate = (self.tags)();
            validate_tag(&candidate)?;
            if self.find_by_tag(&candidate).await?.is_none() {
                return Ok(candidate);
            }
            debug!(attempt, tag = %candidate, "Tag already taken");
        }
        Err(RepositoryError::TagGenerationExhausted { attempts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tablestore_core::models::ExternalIdentity;
    use tablestore_core::storage::StoreConfig;

    use crate::storage::inmemory::InMemoryEngine;

    fn repo() -> TableUserRepository<InMemoryEngine> {
        TableUserRepository::new(Store::new(InMemoryEngine::new(), StoreConfig::default()))
    }

    /// Cycles through `tags`, one per call.
    fn scripted(tags: &'static [&'static str]) -> impl Fn() -> String + Send + Sync {
        let next = AtomicUsize::new(0);
        move || tags[next.fetch_add(1, Ordering::Relaxed) % tags.len()].to_string()
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = repo();
        let created = repo
            .create_user(User::new("ada@example.com").with_id("u1"))
            .await
            .unwrap();
        assert!(created.tag.is_some());

        let fetched = repo.require_user("u1").await.unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_require_missing_user_is_not_found() {
        let err = repo().require_user("nobody").await.unwrap_err();
        assert_eq!(
            err,
            RepositoryError::NotFound {
                entity_type: "User",
                id: "nobody".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_find_by_email_ignores_case() {
        let repo = repo();
        repo.create_user(User::new("Test@Example.com").with_id("u1"))
            .await
            .unwrap();

        let found = repo.find_by_email("test@example.com").await.unwrap().unwrap();
        assert_eq!(found.id, "u1");
        assert_eq!(found.email, "Test@Example.com");

        let stats = repo.store().engine().stats().await;
        assert!(repo.find_by_email("other@example.com").await.unwrap().is_none());
        assert_eq!(repo.store().engine().stats().await.query, stats.query + 1);
    }

    #[tokio::test]
    async fn test_find_by_external_identity() {
        let repo = repo();
        repo.create_user(
            User::new("a@example.com")
                .with_id("u1")
                .with_external_identity(ExternalIdentity::new("OAuth", "Sub-123")),
        )
        .await
        .unwrap();

        let found = repo
            .find_by_external_identity("oauth", "Sub-123")
            .await
            .unwrap();
        assert_eq!(found.map(|u| u.id), Some("u1".to_string()));
        assert!(repo
            .find_by_external_identity("oauth", "sub-123")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_find_by_tag() {
        let repo = repo();
        repo.create_user(User::new("a@example.com").with_id("u1").with_tag("K7QX2M9A"))
            .await
            .unwrap();

        let found = repo.find_by_tag("k7qx2m9a").await.unwrap().unwrap();
        assert_eq!(found.id, "u1");
    }

    #[tokio::test]
    async fn test_duplicate_id_is_already_exists() {
        let repo = repo();
        repo.create_user(User::new("a@example.com").with_id("u1"))
            .await
            .unwrap();

        let err = repo
            .create_user(User::new("b@example.com").with_id("u1"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_email_is_rejected() {
        let repo = repo();
        repo.create_user(User::new("a@example.com").with_id("u1"))
            .await
            .unwrap();

        let err = repo
            .create_user(User::new("A@EXAMPLE.COM").with_id("u2"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RepositoryError::Duplicate {
                entity_type: "User",
                field: "email",
                value: "A@EXAMPLE.COM".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_concurrent_creates_same_id() {
        let repo = Arc::new(repo());
        let a = repo.clone();
        let b = repo.clone();
        let (first, second) = tokio::join!(
            tokio::spawn(async move {
                a.create_user(User::new("x@example.com").with_id("u2")).await
            }),
            tokio::spawn(async move {
                b.create_user(User::new("x@example.com").with_id("u2")).await
            }),
        );

        let outcomes = [first.unwrap(), second.unwrap()];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, RepositoryError::AlreadyExists { .. })));
    }

    #[tokio::test]
    async fn test_generate_unique_tag_retries_collisions() {
        let repo = repo().with_tag_source(scripted(&["taken1", "free22"]));
        repo.create_user(User::new("a@example.com").with_id("u1").with_tag("taken1"))
            .await
            .unwrap();

        assert_eq!(repo.generate_unique_tag().await.unwrap(), "free22");
    }

    #[tokio::test]
    async fn test_generate_unique_tag_exhausts() {
        let repo = TableUserRepository::new(Store::new(
            InMemoryEngine::new(),
            StoreConfig::default().with_tag_attempts(3),
        ))
        .with_tag_source(scripted(&["taken1"]));
        repo.create_user(User::new("a@example.com").with_id("u1").with_tag("taken1"))
            .await
            .unwrap();

        let err = repo.generate_unique_tag().await.unwrap_err();
        assert_eq!(err, RepositoryError::TagGenerationExhausted { attempts: 3 });

        let err = repo
            .create_user(User::new("b@example.com").with_id("u2"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::TagGenerationExhausted { .. }));
        assert!(repo.get_user("u2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_user_moves_indexes() {
        let repo = repo();
        repo.create_user(User::new("old@example.com").with_id("u1"))
            .await
            .unwrap();

        let updated = repo
            .update_user(
                "u1",
                &UserPatch::new()
                    .email("new@example.com")
                    .status(UserStatus::Active),
            )
            .await
            .unwrap();
        assert_eq!(updated.email, "new@example.com");

        assert!(repo.find_by_email("old@example.com").await.unwrap().is_none());
        assert!(repo.find_by_email("new@example.com").await.unwrap().is_some());

        let active = repo
            .list_by_status(UserStatus::Active, QueryOptions::new())
            .await
            .unwrap();
        assert_eq!(active.items, vec![updated]);
        let pending = repo
            .list_by_status(UserStatus::Pending, QueryOptions::new())
            .await
            .unwrap();
        assert!(pending.items.is_empty());
    }

    #[tokio::test]
    async fn test_update_user_rejects_taken_email() {
        let repo = repo();
        repo.create_user(User::new("a@example.com").with_id("u1"))
            .await
            .unwrap();
        repo.create_user(User::new("b@example.com").with_id("u2"))
            .await
            .unwrap();

        let err = repo
            .update_user("u2", &UserPatch::new().email("A@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Duplicate { field: "email", .. }));

        // Re-asserting one's own email is fine.
        repo.update_user("u1", &UserPatch::new().email("a@example.com"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_update_user_rejects_taken_identity_and_tag() {
        let repo = repo();
        repo.create_user(
            User::new("a@example.com")
                .with_id("u1")
                .with_tag("taken001")
                .with_external_identity(ExternalIdentity::new("oauth", "sub-1")),
        )
        .await
        .unwrap();
        repo.create_user(User::new("b@example.com").with_id("u2"))
            .await
            .unwrap();

        let err = repo
            .update_user(
                "u2",
                &UserPatch::new().external_identity(ExternalIdentity::new("OAuth", "sub-1")),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::Duplicate {
                field: "externalIdentity",
                ..
            }
        ));

        let err = repo
            .update_user("u2", &UserPatch::new().tag("TAKEN001"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Duplicate { field: "tag", .. }));

        let moved = repo
            .update_user("u1", &UserPatch::new().tag("taken001"))
            .await
            .unwrap();
        assert_eq!(moved.tag.as_deref(), Some("taken001"));
    }

    #[tokio::test]
    async fn test_update_missing_user_is_not_found() {
        let err = repo()
            .update_user("ghost", &UserPatch::new().name("Ada"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_mark_deleted_then_delete() {
        let repo = repo();
        repo.create_user(User::new("a@example.com").with_id("u1"))
            .await
            .unwrap();

        let marked = repo.mark_deleted("u1").await.unwrap();
        assert!(marked.is_deleted());
        assert!(repo.require_user("u1").await.unwrap().is_deleted());

        repo.delete_user("u1").await.unwrap();
        repo.delete_user("u1").await.unwrap();
        assert!(repo.get_user("u1").await.unwrap().is_none());
        assert!(matches!(
            repo.mark_deleted("u1").await,
            Err(RepositoryError::NotFound { .. })
        ));
    }
}
