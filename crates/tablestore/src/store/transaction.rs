use tracing::debug;

use tablestore_core::entity::validation::validate_id;
use tablestore_core::entity::{Entity, Patch, ValidationError, UPDATED_AT};
use tablestore_core::item::format_timestamp;
use tablestore_core::storage::{Condition, Engine, Result, StoreError, TransactOp};

use super::{clock, Store};

/// An all-or-nothing group of writes.
///
/// Entities and patches are validated as they are added, so a transaction
/// that reaches [`Transaction::commit`] only fails on engine state. Any
/// failed condition aborts the whole group with `Conflict`.
///
/// ```rust,ignore
/// let mut tx = store.transaction();
/// tx.create(&mut user)?
///     .update::<Verification>(&verification_id, &patch)?;
/// tx.commit().await?;
/// ```
pub struct Transaction<'a, E> {
    store: &'a Store<E>,
    operations: Vec<TransactOp>,
}

impl<E: Engine> Store<E> {
    /// Starts an empty transaction.
    pub fn transaction(&self) -> Transaction<'_, E> {
        Transaction {
            store: self,
            operations: Vec::new(),
        }
    }
}

impl<'a, E: Engine> Transaction<'a, E> {
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Writes a new entity; aborts if its key is taken.
    ///
    /// Timestamps are stamped on `entity` in place, so the caller holds
    /// exactly what will be written.
    pub fn create<T: Entity>(&mut self, entity: &mut T) -> Result<&mut Self> {
        entity.validate()?;
        let now = clock::now();
        entity.timestamps_mut().created_at = now;
        entity.timestamps_mut().touch(now);

        self.push(TransactOp::Put {
            item: entity.to_item(),
            condition: Some(Condition::ItemNotExists),
        })
    }

    /// Writes an entity unconditionally, replacing any existing row.
    pub fn put<T: Entity>(&mut self, entity: &mut T) -> Result<&mut Self> {
        entity.validate()?;
        entity.timestamps_mut().touch(clock::now());

        self.push(TransactOp::Put {
            item: entity.to_item(),
            condition: None,
        })
    }

    /// Applies a patch; aborts if the row does not exist.
    pub fn update<T: Entity>(&mut self, id: &str, patch: &T::Patch) -> Result<&mut Self> {
        validate_id("id", id)?;
        patch.validate()?;
        let mut changes = patch.changes(id);
        changes.set(UPDATED_AT, format_timestamp(&clock::now()));

        self.push(TransactOp::Update {
            key: T::key_for(id),
            changes,
            condition: Some(Condition::ItemExists),
        })
    }

    /// Deletes a row. An absent row does not abort the transaction.
    pub fn delete<T: Entity>(&mut self, id: &str) -> Result<&mut Self> {
        validate_id("id", id)?;
        self.push(TransactOp::Delete {
            key: T::key_for(id),
            condition: None,
        })
    }

    /// Requires `condition` to hold on a row without writing it.
    pub fn condition_check<T: Entity>(
        &mut self,
        id: &str,
        condition: Condition,
    ) -> Result<&mut Self> {
        validate_id("id", id)?;
        self.push(TransactOp::ConditionCheck {
            key: T::key_for(id),
            condition,
        })
    }

    fn push(&mut self, operation: TransactOp) -> Result<&mut Self> {
        let max = self.store.config.max_transaction_operations;
        if self.operations.len() >= max {
            return Err(StoreError::Validation(ValidationError::TooManyOperations {
                count: self.operations.len() + 1,
                max,
            }));
        }
        self.operations.push(operation);
        Ok(self)
    }

    /// Applies every operation or none. An empty transaction is a no-op.
    pub async fn commit(self) -> Result<()> {
        if self.operations.is_empty() {
            return Ok(());
        }

        let count = self.operations.len();
        self.store
            .guarded(
                "transact_write",
                format!("{count} operations"),
                self.store.engine.transact_write(self.operations),
            )
            .await?;

        debug!(operations = count, "Committed transaction");
        Ok(())
    }
}
