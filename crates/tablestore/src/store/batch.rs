//! Batched reads, writes and deletes.
//!
//! Every batch is split into chunks no larger than the configured engine
//! limit. Keys or entries the engine reports unprocessed are re-sent with
//! backoff, up to the configured number of retries; whatever is left after
//! that is reported in the result rather than raised.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use tablestore_core::entity::validation::validate_id;
use tablestore_core::entity::Entity;
use tablestore_core::item::{Item, ItemError};
use tablestore_core::keys::StoreKey;
use tablestore_core::storage::{
    BatchDeleteResult, BatchGetResult, BatchWriteResult, Engine, Result, WriteRequest,
};

use super::retry::RetryPolicy;
use super::{clock, Store};

/// Entries left over from a chunked write.
struct WriteOutcome {
    unprocessed: Vec<WriteRequest>,
    cancelled: bool,
}

impl<E: Engine> Store<E> {
    /// Reads many entities by id.
    ///
    /// Duplicate ids are read once. Found entities come back in the order of
    /// their first requested id; missing rows are omitted.
    pub async fn batch_get<T, I>(&self, ids: I) -> Result<BatchGetResult<T>>
    where
        T: Entity,
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let keys = unique_keys::<T, _>(ids)?;
        let limit = self.config.batch_get_limit.max(1);
        let policy = RetryPolicy::from_config(&self.config);

        let mut found: HashMap<StoreKey, Item> = HashMap::with_capacity(keys.len());
        let mut unprocessed = Vec::new();
        let mut cancelled = false;

        'chunks: for (chunk, keys_in_chunk) in keys.chunks(limit).enumerate() {
            if cancelled {
                unprocessed.extend_from_slice(keys_in_chunk);
                continue;
            }

            let mut pending = keys_in_chunk.to_vec();
            let mut attempt = 0;
            loop {
                let Some(response) = self.interruptible(self.engine.batch_get(&pending)).await
                else {
                    warn!(
                        entity_type = T::ENTITY_TYPE,
                        chunk,
                        unprocessed = pending.len(),
                        "Batch get cancelled"
                    );
                    cancelled = true;
                    unprocessed.append(&mut pending);
                    continue 'chunks;
                };
                let response = response?;

                debug!(
                    entity_type = T::ENTITY_TYPE,
                    chunk,
                    attempt,
                    requested = pending.len(),
                    returned = response.items.len(),
                    unprocessed = response.unprocessed.len(),
                    "Batch get chunk"
                );

                for item in response.items {
                    if let Some(key) = StoreKey::from_item(&item) {
                        found.insert(key, item);
                    }
                }
                pending = response.unprocessed;
                if pending.is_empty() {
                    break;
                }

                if attempt >= policy.max_retries {
                    warn!(
                        entity_type = T::ENTITY_TYPE,
                        chunk,
                        attempt,
                        unprocessed = pending.len(),
                        "Batch get retries exhausted"
                    );
                    unprocessed.append(&mut pending);
                    break;
                }

                attempt += 1;
                if !policy.wait(attempt, &self.cancellation).await {
                    warn!(
                        entity_type = T::ENTITY_TYPE,
                        chunk,
                        unprocessed = pending.len(),
                        "Batch get cancelled during backoff"
                    );
                    cancelled = true;
                    unprocessed.append(&mut pending);
                    continue 'chunks;
                }
            }
        }

        let items = keys
            .iter()
            .filter_map(|key| found.remove(key))
            .map(|item| T::from_item(&item))
            .collect::<std::result::Result<Vec<_>, ItemError>>()?;

        Ok(BatchGetResult {
            items,
            unprocessed,
            cancelled,
        })
    }

    /// Writes many entities, replacing existing rows.
    ///
    /// Every entity is validated before any request is sent. Entities sharing
    /// a primary key collapse to the last one. `updatedAt` is stamped on all.
    pub async fn batch_write<T: Entity>(&self, entities: Vec<T>) -> Result<BatchWriteResult<T>> {
        for entity in &entities {
            entity.validate()?;
        }

        let now = clock::now();
        let mut positions: HashMap<StoreKey, usize> = HashMap::new();
        let mut unique: Vec<T> = Vec::with_capacity(entities.len());
        for mut entity in entities {
            entity.timestamps_mut().touch(now);
            match positions.get(&entity.primary_key()) {
                Some(&position) => unique[position] = entity,
                None => {
                    positions.insert(entity.primary_key(), unique.len());
                    unique.push(entity);
                }
            }
        }

        let requests = unique
            .iter()
            .map(|entity| WriteRequest::Put(entity.to_item()))
            .collect();
        let outcome = self.write_chunks(T::ENTITY_TYPE, requests).await?;

        let left: HashSet<StoreKey> = outcome
            .unprocessed
            .iter()
            .filter_map(WriteRequest::key)
            .collect();
        let (unprocessed, succeeded): (Vec<T>, Vec<T>) = unique
            .into_iter()
            .partition(|entity| left.contains(&entity.primary_key()));

        Ok(BatchWriteResult {
            succeeded,
            unprocessed,
            cancelled: outcome.cancelled,
        })
    }

    /// Hard-deletes many entities by id. Absent rows count as deleted.
    pub async fn batch_delete<T, I>(&self, ids: I) -> Result<BatchDeleteResult>
    where
        T: Entity,
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let keys = unique_keys::<T, _>(ids)?;
        let requests = keys.iter().cloned().map(WriteRequest::Delete).collect();
        let outcome = self.write_chunks(T::ENTITY_TYPE, requests).await?;

        let left: HashSet<StoreKey> = outcome
            .unprocessed
            .iter()
            .filter_map(WriteRequest::key)
            .collect();
        let (unprocessed, deleted): (Vec<StoreKey>, Vec<StoreKey>) =
            keys.into_iter().partition(|key| left.contains(key));

        Ok(BatchDeleteResult {
            deleted,
            unprocessed,
            cancelled: outcome.cancelled,
        })
    }

    async fn write_chunks(
        &self,
        entity_type: &'static str,
        requests: Vec<WriteRequest>,
    ) -> Result<WriteOutcome> {
        let limit = self.config.batch_write_limit.max(1);
        let policy = RetryPolicy::from_config(&self.config);

        let mut unprocessed = Vec::new();
        let mut cancelled = false;

        'chunks: for (chunk, requests_in_chunk) in requests.chunks(limit).enumerate() {
            if cancelled {
                unprocessed.extend_from_slice(requests_in_chunk);
                continue;
            }

            let mut pending = requests_in_chunk.to_vec();
            let mut attempt = 0;
            loop {
                let Some(response) = self
                    .interruptible(self.engine.batch_write(pending.clone()))
                    .await
                else {
                    warn!(
                        entity_type,
                        chunk,
                        unprocessed = pending.len(),
                        "Batch write cancelled"
                    );
                    cancelled = true;
                    unprocessed.append(&mut pending);
                    continue 'chunks;
                };
                let response = response?;

                debug!(
                    entity_type,
                    chunk,
                    attempt,
                    requested = pending.len(),
                    unprocessed = response.unprocessed.len(),
                    "Batch write chunk"
                );

                pending = response.unprocessed;
                if pending.is_empty() {
                    break;
                }

                if attempt >= policy.max_retries {
                    warn!(
                        entity_type,
                        chunk,
                        attempt,
                        unprocessed = pending.len(),
                        "Batch write retries exhausted"
                    );
                    unprocessed.append(&mut pending);
                    break;
                }

                attempt += 1;
                if !policy.wait(attempt, &self.cancellation).await {
                    warn!(
                        entity_type,
                        chunk,
                        unprocessed = pending.len(),
                        "Batch write cancelled during backoff"
                    );
                    cancelled = true;
                    unprocessed.append(&mut pending);
                    continue 'chunks;
                }
            }
        }

        Ok(WriteOutcome {
            unprocessed,
            cancelled,
        })
    }
}

/// Validates ids and maps them to primary keys, keeping first occurrences.
fn unique_keys<T, I>(ids: I) -> Result<Vec<StoreKey>>
where
    T: Entity,
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut keys = Vec::new();
    for id in ids {
        let id = id.as_ref();
        validate_id("id", id)?;
        let key = T::key_for(id);
        if seen.insert(key.clone()) {
            keys.push(key);
        }
    }
    Ok(keys)
}
