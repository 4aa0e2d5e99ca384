//! Verification repository over the generic store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use tablestore_core::keys::{
    verification_gsi1_pk, verification_gsi1_sk_prefix, verification_gsi1_sk_since,
    verification_gsi4_pk, verification_gsi4_sk_prefix, Index,
};
use tablestore_core::models::{
    User, Verification, VerificationKind, VerificationPatch, VerificationStatus,
};
use tablestore_core::storage::{
    BatchDeleteResult, Condition, Engine, KeyCondition, QueryAllOptions, QueryOptions, QueryPage,
    RepositoryError, RepositoryResult, SortCondition, StoreError, VerificationRepository,
};

use crate::store::Store;

const ENTITY: &str = "Verification";

/// [`VerificationRepository`] backed by the single table.
///
/// A verification is only written while its user row exists; both are
/// checked in one transaction.
pub struct TableVerificationRepository<E> {
    store: Store<E>,
}

impl<E: Engine> TableVerificationRepository<E> {
    pub fn new(store: Store<E>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Store<E> {
        &self.store
    }

    fn user_condition(user_id: &str, since: Option<DateTime<Utc>>) -> KeyCondition {
        let sort = match since {
            Some(since) => SortCondition::Ge(verification_gsi1_sk_since(&since)),
            None => SortCondition::BeginsWith(verification_gsi1_sk_prefix().to_string()),
        };
        KeyCondition::partition(verification_gsi1_pk(user_id)).with_sort(sort)
    }

    fn not_found(id: &str) -> RepositoryError {
        RepositoryError::NotFound {
            entity_type: ENTITY,
            id: id.to_string(),
        }
    }
}

#[async_trait]
impl<E: Engine + 'static> VerificationRepository for TableVerificationRepository<E> {
    async fn get_verification(&self, id: &str) -> RepositoryResult<Option<Verification>> {
        Ok(self.store.get::<Verification>(id).await?)
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        since: Option<DateTime<Utc>>,
        options: QueryOptions,
    ) -> RepositoryResult<QueryPage<Verification>> {
        Ok(self
            .store
            .query_by_index(Index::Gsi1, Self::user_condition(user_id, since), options)
            .await?)
    }

    async fn list_by_status(
        &self,
        status: VerificationStatus,
        kind: Option<VerificationKind>,
        options: QueryOptions,
    ) -> RepositoryResult<QueryPage<Verification>> {
        let mut condition = KeyCondition::partition(verification_gsi4_pk(status.as_str()));
        if let Some(kind) = kind {
            condition = condition.with_sort(SortCondition::BeginsWith(
                verification_gsi4_sk_prefix(kind.as_str()),
            ));
        }
        Ok(self
            .store
            .query_by_index(Index::Gsi4, condition, options)
            .await?)
    }

    async fn create_verification(
        &self,
        mut verification: Verification,
    ) -> RepositoryResult<Verification> {
        let mut tx = self.store.transaction();
        tx.create(&mut verification)?
            .condition_check::<User>(&verification.user_id, Condition::ItemExists)?;

        match tx.commit().await {
            Ok(()) => {}
            Err(StoreError::Conflict { .. }) => {
                // Tell apart which of the two conditions failed.
                if self.store.exists::<Verification>(&verification.id).await? {
                    return Err(RepositoryError::AlreadyExists {
                        entity_type: ENTITY,
                        id: verification.id,
                    });
                }
                return Err(RepositoryError::NotFound {
                    entity_type: "User",
                    id: verification.user_id,
                });
            }
            Err(e) => return Err(e.into()),
        }

        debug!(
            verification_id = %verification.id,
            user_id = %verification.user_id,
            kind = %verification.kind,
            "Verification created"
        );
        Ok(verification)
    }

    async fn update_verification(
        &self,
        id: &str,
        patch: &VerificationPatch,
    ) -> RepositoryResult<Verification> {
        let updated = self
            .store
            .update::<Verification>(id, patch)
            .await?
            .ok_or_else(|| Self::not_found(id))?;

        debug!(verification_id = %id, status = %updated.status, "Verification updated");
        Ok(updated)
    }

    async fn delete_verification(&self, id: &str) -> RepositoryResult<()> {
        self.store.delete::<Verification>(id).await?;
        debug!(verification_id = %id, "Verification deleted");
        Ok(())
    }

    async fn delete_for_user(&self, user_id: &str) -> RepositoryResult<BatchDeleteResult> {
        let mut result = BatchDeleteResult::default();

        loop {
            // Deleted rows drop out of the index, so every round starts over.
            let found = self
                .store
                .query_all_pages::<Verification>(
                    Index::Gsi1,
                    Self::user_condition(user_id, None),
                    QueryAllOptions::new(),
                )
                .await?;
            if found.items.is_empty() {
                result.cancelled |= found.cancelled;
                break;
            }

            let ids: Vec<String> = found.items.into_iter().map(|v| v.id).collect();
            let round = self.store.batch_delete::<Verification, _>(&ids).await?;
            result.deleted.extend(round.deleted);
            result.unprocessed.extend(round.unprocessed);
            result.cancelled |= round.cancelled || found.cancelled;

            if !found.truncated || result.cancelled || !result.unprocessed.is_empty() {
                break;
            }
        }

        if !result.unprocessed.is_empty() {
            warn!(
                user_id = %user_id,
                unprocessed = result.unprocessed.len(),
                "Verifications left behind"
            );
        }
        debug!(user_id = %user_id, deleted = result.deleted.len(), "Deleted user verifications");
        Ok(result)
    }
}
