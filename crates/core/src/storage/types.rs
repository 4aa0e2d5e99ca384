use crate::entity::Changes;
use crate::item::Item;
use crate::keys::{Index, StoreKey};
use crate::pagination::ContinuationToken;

use super::condition::{Condition, KeyCondition};

/// Sort direction of a query over an index sort component.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Order {
    Ascending,
    /// Most recently written first.
    #[default]
    Descending,
}

impl Order {
    pub fn is_ascending(self) -> bool {
        matches!(self, Order::Ascending)
    }
}

/// Which attributes a read returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Projection {
    #[default]
    All,
    /// Primary key attributes only.
    KeysOnly,
}

/// Caller options for a single-page query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Page size; the configured default applies when `None`.
    pub limit: Option<usize>,
    /// Direction; descending when `None`.
    pub order: Option<Order>,
    /// Post-fetch filter. Applied after the page limit.
    pub filter: Option<Condition>,
    pub continuation: Option<ContinuationToken>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = Some(order);
        self
    }

    pub fn ascending(self) -> Self {
        self.order(Order::Ascending)
    }

    pub fn filter(mut self, filter: Condition) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn continuation(mut self, token: Option<ContinuationToken>) -> Self {
        self.continuation = token;
        self
    }
}

/// Caller options for a multi-page traversal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryAllOptions {
    /// Per-page options; `limit` is the page size used for each request.
    pub query: QueryOptions,
    /// Hard cap on returned items; the configured default applies when `None`.
    pub max_items: Option<usize>,
}

impl QueryAllOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_items(mut self, max_items: usize) -> Self {
        self.max_items = Some(max_items);
        self
    }

    pub fn query(mut self, query: QueryOptions) -> Self {
        self.query = query;
        self
    }
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPage<T> {
    pub items: Vec<T>,
    /// `None` once the index is exhausted.
    pub continuation: Option<ContinuationToken>,
    /// Number of items in this page.
    pub count: usize,
}

impl<T> QueryPage<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            continuation: None,
            count: 0,
        }
    }

    pub fn has_more(&self) -> bool {
        self.continuation.is_some()
    }

    /// Maps every item, keeping the page position.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> QueryPage<U> {
        QueryPage {
            items: self.items.into_iter().map(f).collect(),
            continuation: self.continuation,
            count: self.count,
        }
    }
}

/// Result of a multi-page traversal.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryAll<T> {
    pub items: Vec<T>,
    /// The item cap was reached before the index was exhausted.
    pub truncated: bool,
    /// Traversal stopped early on cancellation.
    pub cancelled: bool,
    /// Resume position after the last returned item, when stopped early.
    pub continuation: Option<ContinuationToken>,
}

/// Result of a counting traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountResult {
    pub count: usize,
    pub cancelled: bool,
}

/// Result of a batched read.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchGetResult<T> {
    /// Found entities in the order of the requested keys.
    pub items: Vec<T>,
    /// Keys still unprocessed after retries were exhausted.
    pub unprocessed: Vec<StoreKey>,
    pub cancelled: bool,
}

/// Result of a batched write.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchWriteResult<T> {
    pub succeeded: Vec<T>,
    /// Entities still unwritten after retries were exhausted.
    pub unprocessed: Vec<T>,
    pub cancelled: bool,
}

impl<T> BatchWriteResult<T> {
    pub fn is_complete(&self) -> bool {
        self.unprocessed.is_empty() && !self.cancelled
    }
}

/// Result of a batched delete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchDeleteResult {
    pub deleted: Vec<StoreKey>,
    pub unprocessed: Vec<StoreKey>,
    pub cancelled: bool,
}

// ============================================================================
// Engine requests
// ============================================================================

/// Whether a query returns item bodies or only a count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Select {
    #[default]
    Items,
    Count,
}

/// A single engine query request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub index: Index,
    /// Physical index name, resolved from the store configuration.
    pub index_name: Option<String>,
    pub key_condition: KeyCondition,
    pub filter: Option<Condition>,
    pub order: Order,
    /// Maximum rows evaluated, before the filter.
    pub limit: Option<usize>,
    pub exclusive_start_key: Option<Item>,
    pub select: Select,
}

impl QueryRequest {
    pub fn new(index: Index, key_condition: KeyCondition) -> Self {
        Self {
            index,
            index_name: None,
            key_condition,
            filter: None,
            order: Order::default(),
            limit: None,
            exclusive_start_key: None,
            select: Select::Items,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResponse {
    pub items: Vec<Item>,
    /// Rows matched after the filter. Equals `items.len()` for item selects.
    pub count: usize,
    pub last_evaluated_key: Option<Item>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchGetResponse {
    pub items: Vec<Item>,
    pub unprocessed: Vec<StoreKey>,
}

/// One entry of a batched write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteRequest {
    Put(Item),
    Delete(StoreKey),
}

impl WriteRequest {
    /// Primary key the request targets, if it carries one.
    pub fn key(&self) -> Option<StoreKey> {
        match self {
            WriteRequest::Put(item) => StoreKey::from_item(item),
            WriteRequest::Delete(key) => Some(key.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchWriteResponse {
    pub unprocessed: Vec<WriteRequest>,
}

/// One operation of an all-or-nothing transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactOp {
    Put {
        item: Item,
        condition: Option<Condition>,
    },
    Update {
        key: StoreKey,
        changes: Changes,
        condition: Option<Condition>,
    },
    Delete {
        key: StoreKey,
        condition: Option<Condition>,
    },
    ConditionCheck {
        key: StoreKey,
        condition: Condition,
    },
}

impl TransactOp {
    pub fn key(&self) -> Option<StoreKey> {
        match self {
            TransactOp::Put { item, .. } => StoreKey::from_item(item),
            TransactOp::Update { key, .. }
            | TransactOp::Delete { key, .. }
            | TransactOp::ConditionCheck { key, .. } => Some(key.clone()),
        }
    }

    pub fn condition(&self) -> Option<&Condition> {
        match self {
            TransactOp::Put { condition, .. }
            | TransactOp::Update { condition, .. }
            | TransactOp::Delete { condition, .. } => condition.as_ref(),
            TransactOp::ConditionCheck { condition, .. } => Some(condition),
        }
    }
}
