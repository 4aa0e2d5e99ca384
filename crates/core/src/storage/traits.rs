use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::entity::Changes;
use crate::item::Item;
use crate::keys::StoreKey;
use crate::models::{
    User, UserPatch, UserStatus, Verification, VerificationKind, VerificationPatch,
    VerificationStatus,
};

use super::{
    BatchDeleteResult, BatchGetResponse, BatchWriteResponse, Condition, Projection, QueryOptions,
    QueryPage, QueryRequest, QueryResponse, RepositoryError, RepositoryResult, Result, TransactOp,
    WriteRequest,
};

/// The underlying key-value engine: one table addressed by partition and
/// sort key, with secondary indexes and conditional writes.
///
/// Implementations are shared handles, safe for concurrent use. They do not
/// retry; unprocessed batch entries are reported back to the caller.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Strongly consistent single-row read.
    async fn get_item(&self, key: &StoreKey, projection: Projection) -> Result<Option<Item>>;

    /// Writes a full row, replacing any existing one. A failed condition is
    /// a `Conflict`.
    async fn put_item(&self, item: Item, condition: Option<&Condition>) -> Result<()>;

    /// Applies `changes` to the row at `key`, creating it when absent and no
    /// condition forbids it. Returns the row as stored afterwards.
    async fn update_item(
        &self,
        key: &StoreKey,
        changes: &Changes,
        condition: Option<&Condition>,
    ) -> Result<Item>;

    /// Deletes the row at `key`. Deleting an absent row succeeds.
    async fn delete_item(&self, key: &StoreKey, condition: Option<&Condition>) -> Result<()>;

    /// Fetches one page of an index or the table.
    async fn query(&self, request: &QueryRequest) -> Result<QueryResponse>;

    /// Reads up to the engine's batch limit of keys. Missing rows are
    /// omitted from the response.
    async fn batch_get(&self, keys: &[StoreKey]) -> Result<BatchGetResponse>;

    /// Writes up to the engine's batch limit of puts and deletes.
    async fn batch_write(&self, requests: Vec<WriteRequest>) -> Result<BatchWriteResponse>;

    /// Applies every operation or none. Any failed condition aborts the
    /// whole transaction with `Conflict`.
    async fn transact_write(&self, operations: Vec<TransactOp>) -> Result<()>;
}

/// Repository for user operations.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Gets a user by their ID.
    async fn get_user(&self, id: &str) -> RepositoryResult<Option<User>>;

    /// Gets a user by their ID, failing with `NotFound` when absent.
    async fn require_user(&self, id: &str) -> RepositoryResult<User> {
        self.get_user(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound {
                entity_type: "User",
                id: id.to_string(),
            })
    }

    /// Gets a user by email address, ignoring case.
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>>;

    /// Gets a user by external identity. The kind ignores case, the value does not.
    async fn find_by_external_identity(
        &self,
        kind: &str,
        value: &str,
    ) -> RepositoryResult<Option<User>>;

    /// Gets a user by tag, ignoring case.
    async fn find_by_tag(&self, tag: &str) -> RepositoryResult<Option<User>>;

    /// Lists users with the given status, newest first unless ordered otherwise.
    async fn list_by_status(
        &self,
        status: UserStatus,
        options: QueryOptions,
    ) -> RepositoryResult<QueryPage<User>>;

    /// Creates a new user, assigning a unique tag when none is set.
    async fn create_user(&self, user: User) -> RepositoryResult<User>;

    /// Applies a partial update.
    async fn update_user(&self, id: &str, patch: &UserPatch) -> RepositoryResult<User>;

    /// Soft-deletes a user by stamping `deletedAt`.
    async fn mark_deleted(&self, id: &str) -> RepositoryResult<User>;

    /// Removes the user row. Deleting an absent user succeeds.
    async fn delete_user(&self, id: &str) -> RepositoryResult<()>;

    /// Generates a tag no other user holds.
    async fn generate_unique_tag(&self) -> RepositoryResult<String>;
}

/// Repository for verification operations.
#[async_trait]
pub trait VerificationRepository: Send + Sync {
    async fn get_verification(&self, id: &str) -> RepositoryResult<Option<Verification>>;

    async fn require_verification(&self, id: &str) -> RepositoryResult<Verification> {
        self.get_verification(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound {
                entity_type: "Verification",
                id: id.to_string(),
            })
    }

    /// Lists a user's verifications, latest first, optionally only those
    /// created at or after `since`.
    async fn list_for_user(
        &self,
        user_id: &str,
        since: Option<DateTime<Utc>>,
        options: QueryOptions,
    ) -> RepositoryResult<QueryPage<Verification>>;

    /// Lists verifications in a status, optionally narrowed to one kind.
    async fn list_by_status(
        &self,
        status: VerificationStatus,
        kind: Option<VerificationKind>,
        options: QueryOptions,
    ) -> RepositoryResult<QueryPage<Verification>>;

    async fn create_verification(
        &self,
        verification: Verification,
    ) -> RepositoryResult<Verification>;

    async fn update_verification(
        &self,
        id: &str,
        patch: &VerificationPatch,
    ) -> RepositoryResult<Verification>;

    async fn delete_verification(&self, id: &str) -> RepositoryResult<()>;

    /// Deletes every verification belonging to `user_id`.
    async fn delete_for_user(&self, user_id: &str) -> RepositoryResult<BatchDeleteResult>;
}
