//! Index queries: single pages, bounded multi-page traversals and counts.

use tracing::{debug, warn};

use tablestore_core::entity::Entity;
use tablestore_core::item::{Item, ItemError};
use tablestore_core::keys::{Index, ENTITY_TYPE_ATTR};
use tablestore_core::pagination::{self, ContinuationToken};
use tablestore_core::storage::{
    Condition, CountResult, Engine, KeyCondition, Order, QueryAll, QueryAllOptions, QueryOptions,
    QueryPage, QueryRequest, Result, Select,
};

use super::Store;

impl<E: Engine> Store<E> {
    /// Fetches one page of entities from an index.
    ///
    /// Defaults to descending order and the configured page size. The page
    /// size bounds rows evaluated, so a filtered page may hold fewer items
    /// while more remain. Rows of other entity types sharing the partition
    /// are skipped.
    pub async fn query_by_index<T: Entity>(
        &self,
        index: Index,
        key_condition: KeyCondition,
        options: QueryOptions,
    ) -> Result<QueryPage<T>> {
        let limit = options.limit.unwrap_or(self.config.default_page_size).max(1);
        let request = self.query_request(
            index,
            key_condition,
            options.filter,
            options.order,
            Some(limit),
            options.continuation.as_ref(),
            Select::Items,
        )?;

        let response = self
            .guarded(
                "query",
                &request.key_condition.partition,
                self.engine.query(&request),
            )
            .await?;

        let items = decode_items::<T>(response.items)?;
        let continuation = pagination::encode(response.last_evaluated_key.as_ref());

        debug!(
            entity_type = T::ENTITY_TYPE,
            index = %index,
            returned = items.len(),
            has_more = continuation.is_some(),
            "Fetched page"
        );

        Ok(QueryPage {
            count: items.len(),
            items,
            continuation,
        })
    }

    /// Follows continuation markers until the index is exhausted or
    /// `max_items` entities were collected.
    ///
    /// When stopped early the returned continuation resumes exactly after
    /// the last returned entity.
    pub async fn query_all_pages<T: Entity>(
        &self,
        index: Index,
        key_condition: KeyCondition,
        options: QueryAllOptions,
    ) -> Result<QueryAll<T>> {
        let max_items = options.max_items.unwrap_or(self.config.max_items).max(1);
        let page_size = options
            .query
            .limit
            .unwrap_or(self.config.default_page_size)
            .max(1);

        let mut items: Vec<T> = Vec::new();
        let mut continuation = options.query.continuation.clone();
        let mut cancelled = false;
        let mut pages = 0usize;

        while items.len() < max_items {
            // Never evaluate past the cap, so the marker stays exact.
            let limit = page_size.min(max_items - items.len());
            let request = self.query_request(
                index,
                key_condition.clone(),
                options.query.filter.clone(),
                options.query.order,
                Some(limit),
                continuation.as_ref(),
                Select::Items,
            )?;

            let Some(response) = self.interruptible(self.engine.query(&request)).await else {
                warn!(
                    entity_type = T::ENTITY_TYPE,
                    index = %index,
                    pages,
                    returned = items.len(),
                    "Query traversal cancelled"
                );
                cancelled = true;
                break;
            };
            let response = response?;
            pages += 1;

            items.extend(decode_items::<T>(response.items)?);
            continuation = pagination::encode(response.last_evaluated_key.as_ref());
            if continuation.is_none() {
                break;
            }
        }

        let truncated = !cancelled && continuation.is_some();
        debug!(
            entity_type = T::ENTITY_TYPE,
            index = %index,
            pages,
            returned = items.len(),
            truncated,
            "Fetched all pages"
        );

        Ok(QueryAll {
            items,
            truncated,
            cancelled,
            continuation,
        })
    }

    /// Counts matching rows without transferring them.
    ///
    /// Paginates internally since the engine caps each count response.
    /// `options.limit` bounds rows evaluated per request; order is ignored.
    pub async fn count_by_index(
        &self,
        index: Index,
        key_condition: KeyCondition,
        options: QueryOptions,
    ) -> Result<CountResult> {
        let limit = options.limit.map(|l| l.max(1));
        let mut count = 0;
        let mut continuation = options.continuation.clone();

        loop {
            let request = self.query_request(
                index,
                key_condition.clone(),
                options.filter.clone(),
                options.order,
                limit,
                continuation.as_ref(),
                Select::Count,
            )?;

            let Some(response) = self.interruptible(self.engine.query(&request)).await else {
                warn!(index = %index, count, "Count cancelled");
                return Ok(CountResult {
                    count,
                    cancelled: true,
                });
            };
            let response = response?;

            count += response.count;
            continuation = pagination::encode(response.last_evaluated_key.as_ref());
            if continuation.is_none() {
                break;
            }
        }

        debug!(index = %index, count, "Counted rows");
        Ok(CountResult {
            count,
            cancelled: false,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn query_request(
        &self,
        index: Index,
        key_condition: KeyCondition,
        filter: Option<Condition>,
        order: Option<Order>,
        limit: Option<usize>,
        continuation: Option<&ContinuationToken>,
        select: Select,
    ) -> Result<QueryRequest> {
        let exclusive_start_key =
            pagination::decode_optional_for(continuation, index, &key_condition.partition)?;
        Ok(QueryRequest {
            index,
            index_name: self.config.index_names.resolve(index).map(str::to_string),
            key_condition,
            filter,
            order: order.unwrap_or_default(),
            limit,
            exclusive_start_key,
            select,
        })
    }
}

/// Decodes rows of entity type `T`, skipping rows of other types.
fn decode_items<T: Entity>(items: Vec<Item>) -> std::result::Result<Vec<T>, ItemError> {
    items
        .iter()
        .filter(|item| {
            item.get(ENTITY_TYPE_ATTR).and_then(|v| v.as_s()) == Some(T::ENTITY_TYPE)
        })
        .map(T::from_item)
        .collect()
}

#[cfg(test)]
mod tests {
    use tablestore_core::entity::Entity;
    use tablestore_core::keys::{user_gsi4_pk, Index};
    use tablestore_core::models::{User, UserStatus};
    use tablestore_core::pagination::{ContinuationToken, TokenError};
    use tablestore_core::storage::{
        Cancellation, Condition, KeyCondition, QueryAllOptions, QueryOptions, StoreConfig,
        StoreError,
    };

    use crate::storage::inmemory::{EngineLimits, InMemoryEngine};
    use crate::store::tests::user;
    use crate::store::Store;

    async fn seeded(engine: InMemoryEngine, n: usize) -> (Store<InMemoryEngine>, Vec<String>) {
        let store = Store::new(engine, StoreConfig::default());
        let mut ids = Vec::new();
        for i in 0..n {
            let id = format!("u{i}");
            let named = user(&id)
                .with_status(UserStatus::Active)
                .with_name(if i % 2 == 0 { "even" } else { "odd" });
            store.create(named).await.unwrap();
            ids.push(id);
        }
        store.create(user("other")).await.unwrap();
        store.engine().reset_stats().await;
        (store, ids)
    }

    fn active() -> KeyCondition {
        KeyCondition::partition(user_gsi4_pk(UserStatus::Active.as_str()))
    }

    fn ids_of(users: &[User]) -> Vec<&str> {
        users.iter().map(|u| u.id()).collect()
    }

    #[tokio::test]
    async fn test_query_defaults_to_newest_first() {
        let (store, ids) = seeded(InMemoryEngine::new(), 4).await;

        let page = store
            .query_by_index::<User>(Index::Gsi4, active(), QueryOptions::new())
            .await
            .unwrap();

        let mut expected: Vec<&str> = ids.iter().map(String::as_str).collect();
        expected.reverse();
        assert_eq!(ids_of(&page.items), expected);
        assert_eq!(page.count, 4);
        assert!(!page.has_more());
    }

    #[tokio::test]
    async fn test_query_ascending() {
        let (store, ids) = seeded(InMemoryEngine::new(), 3).await;

        let page = store
            .query_by_index::<User>(Index::Gsi4, active(), QueryOptions::new().ascending())
            .await
            .unwrap();
        assert_eq!(ids_of(&page.items), ids);
    }

    #[tokio::test]
    async fn test_paging_by_one_matches_query_all() {
        let (store, _) = seeded(InMemoryEngine::new(), 7).await;

        let mut paged = Vec::new();
        let mut token = None;
        loop {
            let page = store
                .query_by_index::<User>(
                    Index::Gsi4,
                    active(),
                    QueryOptions::new().limit(1).continuation(token),
                )
                .await
                .unwrap();
            paged.extend(page.items);
            token = page.continuation;
            if token.is_none() {
                break;
            }
        }

        let all = store
            .query_all_pages::<User>(
                Index::Gsi4,
                active(),
                QueryAllOptions::new().max_items(10_000),
            )
            .await
            .unwrap();

        assert!(!all.truncated);
        assert_eq!(paged, all.items);
        assert_eq!(paged.len(), 7);
    }

    #[tokio::test]
    async fn test_garbage_token_is_rejected() {
        let (store, _) = seeded(InMemoryEngine::new(), 2).await;

        for garbage in ["", "%%%not-base64%%%", "bm90IGpzb24", "e30"] {
            let err = store
                .query_by_index::<User>(
                    Index::Gsi4,
                    active(),
                    QueryOptions::new().continuation(Some(ContinuationToken::new(garbage))),
                )
                .await
                .unwrap_err();
            assert!(matches!(err, StoreError::TokenDecode(_)), "{garbage}: {err}");
        }
        assert_eq!(store.engine().stats().await.query, 0);

        let err = store
            .query_by_index::<User>(
                Index::Gsi4,
                active(),
                QueryOptions::new().continuation(Some(ContinuationToken::new(""))),
            )
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::TokenDecode(TokenError::Empty));
    }

    #[tokio::test]
    async fn test_token_from_other_partition_is_rejected() {
        let store = Store::new(InMemoryEngine::new(), StoreConfig::default());
        for i in 0..3 {
            store
                .create(user(&format!("a{i}")).with_status(UserStatus::Active))
                .await
                .unwrap();
            store
                .create(user(&format!("p{i}")).with_status(UserStatus::Pending))
                .await
                .unwrap();
        }

        let first = store
            .query_by_index::<User>(Index::Gsi4, active(), QueryOptions::new().limit(1))
            .await
            .unwrap();
        let token = first.continuation.unwrap();
        store.engine().reset_stats().await;

        let err = store
            .query_by_index::<User>(
                Index::Gsi4,
                KeyCondition::partition(user_gsi4_pk(UserStatus::Pending.as_str())),
                QueryOptions::new().continuation(Some(token.clone())),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::TokenDecode(TokenError::Mismatch(_))), "{err}");

        let err = store
            .query_all_pages::<User>(
                Index::Gsi1,
                KeyCondition::partition(user_gsi4_pk(UserStatus::Active.as_str())),
                QueryAllOptions::new().query(QueryOptions::new().continuation(Some(token.clone()))),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::TokenDecode(TokenError::Mismatch(_))), "{err}");

        let err = store
            .count_by_index(
                Index::Table,
                KeyCondition::for_key(&User::key_for("a0")),
                QueryOptions::new().continuation(Some(token)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::TokenDecode(TokenError::Mismatch(_))), "{err}");
        assert_eq!(store.engine().stats().await.query, 0);
    }

    #[tokio::test]
    async fn test_count_with_zero_limit_still_counts() {
        let (store, _) = seeded(InMemoryEngine::new(), 3).await;

        let counted = store
            .count_by_index(Index::Gsi4, active(), QueryOptions::new().limit(0))
            .await
            .unwrap();
        assert_eq!(counted.count, 3);
        assert_eq!(store.engine().stats().await.query, 3);
    }

    #[tokio::test]
    async fn test_query_all_truncates_and_resumes_exactly() {
        let (store, _) = seeded(InMemoryEngine::new(), 5).await;
        let options = QueryAllOptions::new()
            .max_items(3)
            .query(QueryOptions::new().limit(2));

        let first = store
            .query_all_pages::<User>(Index::Gsi4, active(), options)
            .await
            .unwrap();
        assert_eq!(first.items.len(), 3);
        assert!(first.truncated);
        assert!(first.continuation.is_some());

        let rest = store
            .query_all_pages::<User>(
                Index::Gsi4,
                active(),
                QueryAllOptions::new().query(QueryOptions::new().continuation(first.continuation)),
            )
            .await
            .unwrap();
        assert!(!rest.truncated);
        assert!(rest.continuation.is_none());

        let everything = store
            .query_all_pages::<User>(Index::Gsi4, active(), QueryAllOptions::new())
            .await
            .unwrap();
        let stitched: Vec<User> = first.items.into_iter().chain(rest.items).collect();
        assert_eq!(stitched, everything.items);
    }

    #[tokio::test]
    async fn test_filter_applies_after_limit() {
        let (store, _) = seeded(InMemoryEngine::new(), 6).await;

        let page = store
            .query_by_index::<User>(
                Index::Gsi4,
                active(),
                QueryOptions::new()
                    .limit(2)
                    .filter(Condition::equals("name", "even")),
            )
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert!(page.has_more());

        let all = store
            .query_all_pages::<User>(
                Index::Gsi4,
                active(),
                QueryAllOptions::new()
                    .query(QueryOptions::new().filter(Condition::equals("name", "even"))),
            )
            .await
            .unwrap();
        assert_eq!(all.items.len(), 3);
    }

    #[tokio::test]
    async fn test_count_paginates_internally() {
        let engine = InMemoryEngine::new().with_limits(EngineLimits {
            query_page_cap: Some(2),
            ..EngineLimits::default()
        });
        let (store, _) = seeded(engine, 5).await;

        let counted = store
            .count_by_index(Index::Gsi4, active(), QueryOptions::new())
            .await
            .unwrap();
        assert_eq!(counted.count, 5);
        assert!(!counted.cancelled);
        assert_eq!(store.engine().stats().await.query, 3);
    }

    #[tokio::test]
    async fn test_query_all_cancelled_returns_partial() {
        let (handle, cancellation) = Cancellation::channel();
        let (store, _) = seeded(InMemoryEngine::new(), 3).await;
        handle.cancel();

        let result = store
            .with_cancellation(cancellation.clone())
            .query_all_pages::<User>(Index::Gsi4, active(), QueryAllOptions::new())
            .await
            .unwrap();
        assert!(result.cancelled);
        assert!(!result.truncated);
        assert!(result.items.is_empty());

        let counted = store
            .with_cancellation(cancellation)
            .count_by_index(Index::Gsi4, active(), QueryOptions::new())
            .await
            .unwrap();
        assert!(counted.cancelled);
    }

    #[tokio::test]
    async fn test_table_query_skips_other_entity_types() {
        let (store, _) = seeded(InMemoryEngine::new(), 1).await;

        let page = store
            .query_by_index::<tablestore_core::models::Verification>(
                Index::Table,
                KeyCondition::for_key(&User::key_for("u0")),
                QueryOptions::new(),
            )
            .await
            .unwrap();
        assert!(page.items.is_empty());
    }
}
