//! In-memory engine implementation.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use tablestore_core::entity::Changes;
use tablestore_core::item::Item;
use tablestore_core::keys::{Index, StoreKey, PARTITION_KEY, SORT_KEY};
use tablestore_core::storage::{
    BatchGetResponse, BatchWriteResponse, Condition, Engine, Projection, QueryRequest,
    QueryResponse, Result, Select, StoreError, TransactOp, WriteRequest,
};

/// Request size limits enforced by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineLimits {
    pub batch_get: usize,
    pub batch_write: usize,
    pub transact_write: usize,
    /// Maximum rows evaluated per query response, standing in for the
    /// engine's response size cap.
    pub query_page_cap: Option<usize>,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            batch_get: 100,
            batch_write: 25,
            transact_write: 100,
            query_page_cap: None,
        }
    }
}

/// Per-operation request counts. Batch operations record each request's size.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestStats {
    pub get_item: usize,
    pub put_item: usize,
    pub update_item: usize,
    pub delete_item: usize,
    pub query: usize,
    pub batch_get: Vec<usize>,
    pub batch_write: Vec<usize>,
    pub transact_write: Vec<usize>,
}

#[derive(Debug, Default)]
struct FaultPlan {
    throttle_next: usize,
    unprocessed_keys_next: usize,
    unprocessed_items_next: usize,
}

#[derive(Debug, Clone, Copy)]
enum Operation {
    GetItem,
    PutItem,
    UpdateItem,
    DeleteItem,
    Query,
    BatchGet(usize),
    BatchWrite(usize),
    TransactWrite(usize),
}

/// In-memory single-table engine for tests and development.
///
/// Rows live in a `BTreeMap` wrapped in `Arc<RwLock<_>>`; secondary indexes
/// are emulated by scanning index attributes. Clones share the same table.
/// Data is not persisted and will be lost when the last clone is dropped.
#[derive(Debug, Clone)]
pub struct InMemoryEngine {
    rows: Arc<RwLock<BTreeMap<StoreKey, Item>>>,
    limits: EngineLimits,
    latency: Option<Duration>,
    faults: Arc<Mutex<FaultPlan>>,
    stats: Arc<Mutex<RequestStats>>,
}

impl Default for InMemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEngine {
    /// Creates an empty engine with default limits.
    pub fn new() -> Self {
        Self {
            rows: Arc::new(RwLock::new(BTreeMap::new())),
            limits: EngineLimits::default(),
            latency: None,
            faults: Arc::new(Mutex::new(FaultPlan::default())),
            stats: Arc::new(Mutex::new(RequestStats::default())),
        }
    }

    pub fn with_limits(mut self, limits: EngineLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Delays every request by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn limits(&self) -> EngineLimits {
        self.limits
    }

    /// Fails the next `n` requests with a transient throttling error.
    pub async fn throttle_next(&self, n: usize) {
        self.faults.lock().await.throttle_next = n;
    }

    /// Reports `n` keys of the next batch read as unprocessed.
    pub async fn unprocessed_keys_next(&self, n: usize) {
        self.faults.lock().await.unprocessed_keys_next = n;
    }

    /// Reports `n` entries of the next batch write as unprocessed.
    pub async fn unprocessed_items_next(&self, n: usize) {
        self.faults.lock().await.unprocessed_items_next = n;
    }

    pub async fn stats(&self) -> RequestStats {
        self.stats.lock().await.clone()
    }

    pub async fn reset_stats(&self) {
        *self.stats.lock().await = RequestStats::default();
    }

    /// Number of stored rows.
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    /// Raw stored row, bypassing request accounting.
    pub async fn raw_item(&self, key: &StoreKey) -> Option<Item> {
        self.rows.read().await.get(key).cloned()
    }

    /// Records the request and applies latency and throttling faults.
    async fn begin(&self, operation: Operation) -> Result<()> {
        {
            let mut stats = self.stats.lock().await;
            match operation {
                Operation::GetItem => stats.get_item += 1,
                Operation::PutItem => stats.put_item += 1,
                Operation::UpdateItem => stats.update_item += 1,
                Operation::DeleteItem => stats.delete_item += 1,
                Operation::Query => stats.query += 1,
                Operation::BatchGet(n) => stats.batch_get.push(n),
                Operation::BatchWrite(n) => stats.batch_write.push(n),
                Operation::TransactWrite(n) => stats.transact_write.push(n),
            }
        }

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let mut faults = self.faults.lock().await;
        if faults.throttle_next > 0 {
            faults.throttle_next -= 1;
            return Err(StoreError::Transient(format!(
                "{operation:?}: request rate exceeded"
            )));
        }
        Ok(())
    }

    async fn take_unprocessed_keys(&self, available: usize) -> usize {
        let mut faults = self.faults.lock().await;
        let n = faults.unprocessed_keys_next.min(available);
        faults.unprocessed_keys_next = 0;
        n
    }

    async fn take_unprocessed_items(&self, available: usize) -> usize {
        let mut faults = self.faults.lock().await;
        let n = faults.unprocessed_items_next.min(available);
        faults.unprocessed_items_next = 0;
        n
    }
}

fn item_key(item: &Item) -> Result<StoreKey> {
    StoreKey::from_item(item)
        .ok_or_else(|| StoreError::Engine("item is missing its partition key".to_string()))
}

fn check(condition: Option<&Condition>, current: Option<&Item>, key: &StoreKey) -> Result<()> {
    match condition {
        Some(c) if !c.evaluate(current) => Err(StoreError::conflict(key)),
        _ => Ok(()),
    }
}

fn reject_duplicates<'a>(keys: impl Iterator<Item = &'a StoreKey>, operation: &str) -> Result<()> {
    let mut seen = HashSet::new();
    for key in keys {
        if !seen.insert(key) {
            return Err(StoreError::Engine(format!(
                "{operation}: duplicate key {key} in request"
            )));
        }
    }
    Ok(())
}

fn keys_only(item: &Item) -> Item {
    item.iter()
        .filter(|(name, _)| name.as_str() == PARTITION_KEY || name.as_str() == SORT_KEY)
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Position of a row within an index: its index sort value, then its table key.
fn position(item: &Item, index: Index) -> (Option<String>, Option<StoreKey>) {
    let sort = item
        .get(index.sort_attribute())
        .and_then(|v| v.as_s())
        .map(str::to_string);
    (sort, StoreKey::from_item(item))
}

/// Key attributes a query response reports for `item` as the resume marker.
fn marker(item: &Item, index: Index) -> Item {
    let mut attributes = vec![PARTITION_KEY, SORT_KEY];
    if !index.is_table() {
        attributes.push(index.partition_attribute());
        attributes.push(index.sort_attribute());
    }
    attributes
        .into_iter()
        .filter_map(|name| item.get(name).map(|v| (name.to_string(), v.clone())))
        .collect()
}

#[async_trait]
impl Engine for InMemoryEngine {
    async fn get_item(&self, key: &StoreKey, projection: Projection) -> Result<Option<Item>> {
        self.begin(Operation::GetItem).await?;
        let rows = self.rows.read().await;
        Ok(rows.get(key).map(|item| match projection {
            Projection::All => item.clone(),
            Projection::KeysOnly => keys_only(item),
        }))
    }

    async fn put_item(&self, item: Item, condition: Option<&Condition>) -> Result<()> {
        self.begin(Operation::PutItem).await?;
        let key = item_key(&item)?;
        let mut rows = self.rows.write().await;
        check(condition, rows.get(&key), &key)?;
        rows.insert(key, item);
        Ok(())
    }

    async fn update_item(
        &self,
        key: &StoreKey,
        changes: &Changes,
        condition: Option<&Condition>,
    ) -> Result<Item> {
        self.begin(Operation::UpdateItem).await?;
        let mut rows = self.rows.write().await;
        check(condition, rows.get(key), key)?;

        let mut item = rows.get(key).cloned().unwrap_or_else(|| key.to_item());
        changes.apply_to(&mut item);
        // Key attributes are immutable.
        item.extend(key.to_item());
        rows.insert(key.clone(), item.clone());
        Ok(item)
    }

    async fn delete_item(&self, key: &StoreKey, condition: Option<&Condition>) -> Result<()> {
        self.begin(Operation::DeleteItem).await?;
        let mut rows = self.rows.write().await;
        check(condition, rows.get(key), key)?;
        rows.remove(key);
        Ok(())
    }

    async fn query(&self, request: &QueryRequest) -> Result<QueryResponse> {
        self.begin(Operation::Query).await?;
        let index = request.index;
        let rows = self.rows.read().await;

        let mut matched: Vec<&Item> = rows
            .values()
            .filter(|item| {
                let Some(partition) = item.get(index.partition_attribute()).and_then(|v| v.as_s())
                else {
                    // Sparse index: rows without the attribute are not projected.
                    return false;
                };
                let sort = item.get(index.sort_attribute()).and_then(|v| v.as_s());
                request.key_condition.matches(partition, sort)
            })
            .collect();

        matched.sort_by_cached_key(|item| position(item, index));
        if !request.order.is_ascending() {
            matched.reverse();
        }

        if let Some(start) = &request.exclusive_start_key {
            let start = position(start, index);
            let wanted = if request.order.is_ascending() {
                Ordering::Greater
            } else {
                Ordering::Less
            };
            matched.retain(|item| position(item, index).cmp(&start) == wanted);
        }

        let cap = match (request.limit, self.limits.query_page_cap) {
            (Some(limit), Some(cap)) => Some(limit.min(cap)),
            (limit, cap) => limit.or(cap),
        };
        let evaluated = cap.map_or(matched.len(), |c| c.min(matched.len()));
        let last_evaluated_key = if evaluated < matched.len() && evaluated > 0 {
            Some(marker(matched[evaluated - 1], index))
        } else {
            None
        };

        let selected: Vec<&Item> = matched[..evaluated]
            .iter()
            .copied()
            .filter(|item| {
                request
                    .filter
                    .as_ref()
                    .is_none_or(|filter| filter.evaluate(Some(item)))
            })
            .collect();

        let count = selected.len();
        let items = match request.select {
            Select::Items => selected.into_iter().cloned().collect(),
            Select::Count => Vec::new(),
        };

        Ok(QueryResponse {
            items,
            count,
            last_evaluated_key,
        })
    }

    async fn batch_get(&self, keys: &[StoreKey]) -> Result<BatchGetResponse> {
        self.begin(Operation::BatchGet(keys.len())).await?;
        if keys.len() > self.limits.batch_get {
            return Err(StoreError::Engine(format!(
                "batch get of {} keys exceeds limit of {}",
                keys.len(),
                self.limits.batch_get
            )));
        }
        reject_duplicates(keys.iter(), "batch get")?;

        let skipped = self.take_unprocessed_keys(keys.len()).await;
        let (processed, unprocessed) = keys.split_at(keys.len() - skipped);

        let rows = self.rows.read().await;
        Ok(BatchGetResponse {
            items: processed
                .iter()
                .filter_map(|key| rows.get(key).cloned())
                .collect(),
            unprocessed: unprocessed.to_vec(),
        })
    }

    async fn batch_write(&self, requests: Vec<WriteRequest>) -> Result<BatchWriteResponse> {
        self.begin(Operation::BatchWrite(requests.len())).await?;
        if requests.len() > self.limits.batch_write {
            return Err(StoreError::Engine(format!(
                "batch write of {} entries exceeds limit of {}",
                requests.len(),
                self.limits.batch_write
            )));
        }
        let keys = requests
            .iter()
            .map(|r| {
                r.key()
                    .ok_or_else(|| StoreError::Engine("write request without key".to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        reject_duplicates(keys.iter(), "batch write")?;

        let skipped = self.take_unprocessed_items(requests.len()).await;
        let mut requests = requests;
        let unprocessed = requests.split_off(requests.len() - skipped);

        let mut rows = self.rows.write().await;
        for (request, key) in requests.into_iter().zip(keys) {
            match request {
                WriteRequest::Put(item) => {
                    rows.insert(key, item);
                }
                WriteRequest::Delete(_) => {
                    rows.remove(&key);
                }
            }
        }

        Ok(BatchWriteResponse { unprocessed })
    }

    async fn transact_write(&self, operations: Vec<TransactOp>) -> Result<()> {
        self.begin(Operation::TransactWrite(operations.len())).await?;
        if operations.len() > self.limits.transact_write {
            return Err(StoreError::Engine(format!(
                "transaction of {} operations exceeds limit of {}",
                operations.len(),
                self.limits.transact_write
            )));
        }
        let keys = operations
            .iter()
            .map(|op| {
                op.key()
                    .ok_or_else(|| StoreError::Engine("transaction item without key".to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        reject_duplicates(keys.iter(), "transaction")?;

        let mut rows = self.rows.write().await;

        // Every condition is checked before anything is applied.
        for (op, key) in operations.iter().zip(&keys) {
            check(op.condition(), rows.get(key), key)?;
        }

        for (op, key) in operations.into_iter().zip(keys) {
            match op {
                TransactOp::Put { item, .. } => {
                    rows.insert(key, item);
                }
                TransactOp::Update { changes, .. } => {
                    let mut item = rows.get(&key).cloned().unwrap_or_else(|| key.to_item());
                    changes.apply_to(&mut item);
                    item.extend(key.to_item());
                    rows.insert(key, item);
                }
                TransactOp::Delete { .. } => {
                    rows.remove(&key);
                }
                TransactOp::ConditionCheck { .. } => {}
            }
        }

        Ok(())
    }
}
