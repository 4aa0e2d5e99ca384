//! DynamoDB engine implementation.
//!
//! Implements `tablestore_core::storage::Engine` on one DynamoDB table.
//! Every expression is rendered through [`ExpressionBuilder`], so attribute
//! names and values always travel as placeholders.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::error::BuildError;
use aws_sdk_dynamodb::types::{
    ConditionCheck, Delete, DeleteRequest, KeysAndAttributes, Put, PutRequest, ReturnValue,
    Select as SdkSelect, TransactWriteItem, Update, WriteRequest as SdkWriteRequest,
};
use aws_sdk_dynamodb::Client;
use tracing::debug;

use tablestore_core::entity::Changes;
use tablestore_core::item::Item;
use tablestore_core::keys::{StoreKey, PARTITION_KEY, SORT_KEY};
use tablestore_core::storage::{
    BatchGetResponse, BatchWriteResponse, Condition, Engine, ExpressionBuilder, Projection,
    QueryRequest, QueryResponse, Result, Select, StoreError, TransactOp, WriteRequest,
};

use super::conversions::{item_from_sdk, item_to_sdk, items_from_sdk, key_to_sdk, SdkItem};
use super::error::{
    map_batch_get_error, map_batch_write_error, map_delete_item_error, map_get_item_error,
    map_put_item_error, map_query_error, map_transact_write_error, map_update_item_error,
};

/// Rendered placeholder maps. Empty maps are omitted from requests.
struct Placeholders {
    names: Option<HashMap<String, String>>,
    values: Option<SdkItem>,
}

impl From<ExpressionBuilder> for Placeholders {
    fn from(builder: ExpressionBuilder) -> Self {
        let (names, values) = builder.into_parts();
        Self {
            names: (!names.is_empty()).then(|| names.into_iter().collect()),
            values: (!values.is_empty()).then(|| item_to_sdk(&values)),
        }
    }
}

fn build_error(err: BuildError) -> StoreError {
    StoreError::Engine(format!("Invalid request: {err}"))
}

/// DynamoDB-based engine.
///
/// Reads are strongly consistent. Index names come resolved on each
/// [`QueryRequest`]; the engine itself only knows its table.
#[derive(Debug, Clone)]
pub struct DynamoDbEngine {
    client: Client,
    table_name: String,
}

impl DynamoDbEngine {
    /// Creates a new engine with the given DynamoDB client and table name.
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    /// Creates a new engine from the environment.
    ///
    /// Uses the AWS SDK default credential and region chain.
    pub async fn from_env(table_name: impl Into<String>) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(Client::new(&config), table_name)
    }

    /// Get the table name.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    fn transact_item(&self, operation: TransactOp) -> Result<TransactWriteItem> {
        let mut expressions = ExpressionBuilder::new();
        let item = match operation {
            TransactOp::Put { item, condition } => {
                let condition = condition.map(|c| expressions.condition(&c));
                let placeholders = Placeholders::from(expressions);
                let put = Put::builder()
                    .table_name(&self.table_name)
                    .set_item(Some(item_to_sdk(&item)))
                    .set_condition_expression(condition)
                    .set_expression_attribute_names(placeholders.names)
                    .set_expression_attribute_values(placeholders.values)
                    .build()
                    .map_err(build_error)?;
                TransactWriteItem::builder().put(put).build()
            }
            TransactOp::Update {
                key,
                changes,
                condition,
            } => {
                let update_expression = expressions.update(&changes);
                if update_expression.is_empty() {
                    return Err(StoreError::Engine(format!("Empty update for {key}")));
                }
                let condition = condition.map(|c| expressions.condition(&c));
                let placeholders = Placeholders::from(expressions);
                let update = Update::builder()
                    .table_name(&self.table_name)
                    .set_key(Some(key_to_sdk(&key)))
                    .update_expression(update_expression)
                    .set_condition_expression(condition)
                    .set_expression_attribute_names(placeholders.names)
                    .set_expression_attribute_values(placeholders.values)
                    .build()
                    .map_err(build_error)?;
                TransactWriteItem::builder().update(update).build()
            }
            TransactOp::Delete { key, condition } => {
                let condition = condition.map(|c| expressions.condition(&c));
                let placeholders = Placeholders::from(expressions);
                let delete = Delete::builder()
                    .table_name(&self.table_name)
                    .set_key(Some(key_to_sdk(&key)))
                    .set_condition_expression(condition)
                    .set_expression_attribute_names(placeholders.names)
                    .set_expression_attribute_values(placeholders.values)
                    .build()
                    .map_err(build_error)?;
                TransactWriteItem::builder().delete(delete).build()
            }
            TransactOp::ConditionCheck { key, condition } => {
                let condition = expressions.condition(&condition);
                let placeholders = Placeholders::from(expressions);
                let check = ConditionCheck::builder()
                    .table_name(&self.table_name)
                    .set_key(Some(key_to_sdk(&key)))
                    .condition_expression(condition)
                    .set_expression_attribute_names(placeholders.names)
                    .set_expression_attribute_values(placeholders.values)
                    .build()
                    .map_err(build_error)?;
                TransactWriteItem::builder().condition_check(check).build()
            }
        };
        Ok(item)
    }
}

fn write_request_to_sdk(request: &WriteRequest) -> Result<SdkWriteRequest> {
    let built = match request {
        WriteRequest::Put(item) => SdkWriteRequest::builder().put_request(
            PutRequest::builder()
                .set_item(Some(item_to_sdk(item)))
                .build()
                .map_err(build_error)?,
        ),
        WriteRequest::Delete(key) => SdkWriteRequest::builder().delete_request(
            DeleteRequest::builder()
                .set_key(Some(key_to_sdk(key)))
                .build()
                .map_err(build_error)?,
        ),
    };
    Ok(built.build())
}

fn write_request_from_sdk(request: &SdkWriteRequest) -> Result<WriteRequest> {
    if let Some(put) = request.put_request() {
        return Ok(WriteRequest::Put(item_from_sdk(put.item())?));
    }
    if let Some(delete) = request.delete_request() {
        let key = StoreKey::from_item(&item_from_sdk(delete.key())?)
            .ok_or_else(|| StoreError::Engine("Unprocessed delete without a key".to_string()))?;
        return Ok(WriteRequest::Delete(key));
    }
    Err(StoreError::Engine("Empty unprocessed write request".to_string()))
}

fn key_from_sdk(key: &SdkItem) -> Result<StoreKey> {
    StoreKey::from_item(&item_from_sdk(key)?)
        .ok_or_else(|| StoreError::Engine("Unprocessed key without a partition".to_string()))
}

#[async_trait]
impl Engine for DynamoDbEngine {
    async fn get_item(&self, key: &StoreKey, projection: Projection) -> Result<Option<Item>> {
        let mut request = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .set_key(Some(key_to_sdk(key)))
            .consistent_read(true);

        if projection == Projection::KeysOnly {
            let mut expressions = ExpressionBuilder::new();
            let projection = expressions.projection(&[PARTITION_KEY, SORT_KEY]);
            request = request
                .projection_expression(projection)
                .set_expression_attribute_names(Placeholders::from(expressions).names);
        }

        let output = request.send().await.map_err(map_get_item_error)?;
        match output.item {
            Some(item) => Ok(Some(item_from_sdk(&item)?)),
            None => Ok(None),
        }
    }

    async fn put_item(&self, item: Item, condition: Option<&Condition>) -> Result<()> {
        let target = StoreKey::from_item(&item)
            .map(|k| k.to_string())
            .unwrap_or_default();
        let mut expressions = ExpressionBuilder::new();
        let condition = condition.map(|c| expressions.condition(c));
        let placeholders = Placeholders::from(expressions);

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item_to_sdk(&item)))
            .set_condition_expression(condition)
            .set_expression_attribute_names(placeholders.names)
            .set_expression_attribute_values(placeholders.values)
            .send()
            .await
            .map_err(|e| map_put_item_error(e, &target))?;

        Ok(())
    }

    async fn update_item(
        &self,
        key: &StoreKey,
        changes: &Changes,
        condition: Option<&Condition>,
    ) -> Result<Item> {
        let mut expressions = ExpressionBuilder::new();
        let update = expressions.update(changes);
        let condition = condition.map(|c| expressions.condition(c));
        let placeholders = Placeholders::from(expressions);

        let output = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .set_key(Some(key_to_sdk(key)))
            .set_update_expression((!update.is_empty()).then_some(update))
            .set_condition_expression(condition)
            .set_expression_attribute_names(placeholders.names)
            .set_expression_attribute_values(placeholders.values)
            .return_values(ReturnValue::AllNew)
            .send()
            .await
            .map_err(|e| map_update_item_error(e, key))?;

        match output.attributes {
            Some(attributes) => Ok(item_from_sdk(&attributes)?),
            None => Ok(key.to_item()),
        }
    }

    async fn delete_item(&self, key: &StoreKey, condition: Option<&Condition>) -> Result<()> {
        let mut expressions = ExpressionBuilder::new();
        let condition = condition.map(|c| expressions.condition(c));
        let placeholders = Placeholders::from(expressions);

        self.client
            .delete_item()
            .table_name(&self.table_name)
            .set_key(Some(key_to_sdk(key)))
            .set_condition_expression(condition)
            .set_expression_attribute_names(placeholders.names)
            .set_expression_attribute_values(placeholders.values)
            .send()
            .await
            .map_err(|e| map_delete_item_error(e, key))?;

        Ok(())
    }

    async fn query(&self, request: &QueryRequest) -> Result<QueryResponse> {
        let mut expressions = ExpressionBuilder::new();
        let key_condition = expressions.key_condition(request.index, &request.key_condition);
        let filter = request.filter.as_ref().map(|f| expressions.condition(f));
        let placeholders = Placeholders::from(expressions);

        let mut query = self
            .client
            .query()
            .table_name(&self.table_name)
            .set_index_name(request.index_name.clone())
            .key_condition_expression(key_condition)
            .set_filter_expression(filter)
            .set_expression_attribute_names(placeholders.names)
            .set_expression_attribute_values(placeholders.values)
            .scan_index_forward(request.order.is_ascending())
            .set_limit(request.limit.map(|l| i32::try_from(l).unwrap_or(i32::MAX)))
            .set_exclusive_start_key(request.exclusive_start_key.as_ref().map(item_to_sdk));

        if request.select == Select::Count {
            query = query.select(SdkSelect::Count);
        }

        let output = query.send().await.map_err(map_query_error)?;
        let items = items_from_sdk(output.items)?;
        let last_evaluated_key = output
            .last_evaluated_key
            .as_ref()
            .map(item_from_sdk)
            .transpose()?;

        Ok(QueryResponse {
            count: usize::try_from(output.count).unwrap_or(items.len()),
            items,
            last_evaluated_key,
        })
    }

    async fn batch_get(&self, keys: &[StoreKey]) -> Result<BatchGetResponse> {
        let request = KeysAndAttributes::builder()
            .set_keys(Some(keys.iter().map(key_to_sdk).collect()))
            .consistent_read(true)
            .build()
            .map_err(build_error)?;

        let mut output = self
            .client
            .batch_get_item()
            .request_items(&self.table_name, request)
            .send()
            .await
            .map_err(map_batch_get_error)?;

        let items = items_from_sdk(
            output
                .responses
                .as_mut()
                .and_then(|r| r.remove(&self.table_name)),
        )?;
        let unprocessed = output
            .unprocessed_keys
            .as_ref()
            .and_then(|u| u.get(&self.table_name))
            .map(|k| k.keys().iter().map(key_from_sdk).collect::<Result<Vec<_>>>())
            .transpose()?
            .unwrap_or_default();

        if !unprocessed.is_empty() {
            debug!(unprocessed = unprocessed.len(), "BatchGetItem left keys unprocessed");
        }
        Ok(BatchGetResponse { items, unprocessed })
    }

    async fn batch_write(&self, requests: Vec<WriteRequest>) -> Result<BatchWriteResponse> {
        let sdk_requests = requests
            .iter()
            .map(write_request_to_sdk)
            .collect::<Result<Vec<_>>>()?;

        let output = self
            .client
            .batch_write_item()
            .request_items(&self.table_name, sdk_requests)
            .send()
            .await
            .map_err(map_batch_write_error)?;

        let unprocessed = output
            .unprocessed_items
            .as_ref()
            .and_then(|u| u.get(&self.table_name))
            .map(|r| r.iter().map(write_request_from_sdk).collect::<Result<Vec<_>>>())
            .transpose()?
            .unwrap_or_default();

        if !unprocessed.is_empty() {
            debug!(
                unprocessed = unprocessed.len(),
                "BatchWriteItem left entries unprocessed"
            );
        }
        Ok(BatchWriteResponse { unprocessed })
    }

    async fn transact_write(&self, operations: Vec<TransactOp>) -> Result<()> {
        let target = format!("{} operations", operations.len());
        let items = operations
            .into_iter()
            .map(|op| self.transact_item(op))
            .collect::<Result<Vec<_>>>()?;

        self.client
            .transact_write_items()
            .set_transact_items(Some(items))
            .send()
            .await
            .map_err(|e| map_transact_write_error(e, &target))?;

        Ok(())
    }
}
