//! DynamoDB error mapping.
//!
//! Maps AWS SDK errors to `StoreError` from `tablestore_core::storage`.
//! Throttling and connectivity failures become `Transient`, failed
//! conditions become `Conflict` and everything else is an `Engine` error.

use std::fmt::{Debug, Display};

use aws_sdk_dynamodb::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::operation::batch_get_item::BatchGetItemError;
use aws_sdk_dynamodb::operation::batch_write_item::BatchWriteItemError;
use aws_sdk_dynamodb::operation::delete_item::DeleteItemError;
use aws_sdk_dynamodb::operation::get_item::GetItemError;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::operation::query::QueryError;
use aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError;
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;
use tablestore_core::storage::StoreError;

const CONDITIONAL_CHECK_FAILED: &str = "ConditionalCheckFailed";

fn throughput_exceeded() -> StoreError {
    StoreError::Transient("Throughput exceeded, please retry".to_string())
}

fn request_limit_exceeded() -> StoreError {
    StoreError::Transient("Request limit exceeded, please retry".to_string())
}

fn internal_server_error() -> StoreError {
    StoreError::Transient("DynamoDB internal server error".to_string())
}

fn transaction_conflict() -> StoreError {
    StoreError::Transient("Transaction conflict, please retry".to_string())
}

/// Errors raised before a response was received.
fn transport_error<E, R>(err: &SdkError<E, R>, operation: &str) -> Option<StoreError> {
    match err {
        SdkError::TimeoutError(_) => Some(StoreError::Transient(format!("{operation} timed out"))),
        SdkError::DispatchFailure(_) => Some(StoreError::Transient(format!(
            "{operation} could not be dispatched"
        ))),
        _ => None,
    }
}

/// Service errors without a dedicated variant.
fn unhandled<E: ProvideErrorMetadata + Debug>(err: E, operation: &str) -> StoreError {
    match err.code() {
        Some("ThrottlingException") => {
            StoreError::Transient(format!("{operation} throttled, please retry"))
        }
        _ => StoreError::Engine(format!("{operation} failed: {err:?}")),
    }
}

/// Map a GetItem SDK error to StoreError.
pub fn map_get_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<GetItemError, R>,
) -> StoreError {
    if let Some(e) = transport_error(&err, "GetItem") {
        return e;
    }
    match err.into_service_error() {
        GetItemError::ResourceNotFoundException(_) => {
            StoreError::Engine("Table not found".to_string())
        }
        GetItemError::ProvisionedThroughputExceededException(_) => throughput_exceeded(),
        GetItemError::RequestLimitExceeded(_) => request_limit_exceeded(),
        GetItemError::InternalServerError(_) => internal_server_error(),
        err => unhandled(err, "GetItem"),
    }
}

/// Map a PutItem SDK error to StoreError.
pub fn map_put_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<PutItemError, R>,
    target: impl Display,
) -> StoreError {
    if let Some(e) = transport_error(&err, "PutItem") {
        return e;
    }
    match err.into_service_error() {
        PutItemError::ConditionalCheckFailedException(_) => StoreError::conflict(target),
        PutItemError::ResourceNotFoundException(_) => {
            StoreError::Engine("Table not found".to_string())
        }
        PutItemError::ProvisionedThroughputExceededException(_) => throughput_exceeded(),
        PutItemError::RequestLimitExceeded(_) => request_limit_exceeded(),
        PutItemError::ItemCollectionSizeLimitExceededException(_) => {
            StoreError::Engine("Item collection size limit exceeded".to_string())
        }
        PutItemError::TransactionConflictException(_) => transaction_conflict(),
        PutItemError::InternalServerError(_) => internal_server_error(),
        err => unhandled(err, "PutItem"),
    }
}

/// Map an UpdateItem SDK error to StoreError.
pub fn map_update_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<UpdateItemError, R>,
    target: impl Display,
) -> StoreError {
    if let Some(e) = transport_error(&err, "UpdateItem") {
        return e;
    }
    match err.into_service_error() {
        UpdateItemError::ConditionalCheckFailedException(_) => StoreError::conflict(target),
        UpdateItemError::ResourceNotFoundException(_) => {
            StoreError::Engine("Table not found".to_string())
        }
        UpdateItemError::ProvisionedThroughputExceededException(_) => throughput_exceeded(),
        UpdateItemError::RequestLimitExceeded(_) => request_limit_exceeded(),
        UpdateItemError::ItemCollectionSizeLimitExceededException(_) => {
            StoreError::Engine("Item collection size limit exceeded".to_string())
        }
        UpdateItemError::TransactionConflictException(_) => transaction_conflict(),
        UpdateItemError::InternalServerError(_) => internal_server_error(),
        err => unhandled(err, "UpdateItem"),
    }
}

/// Map a DeleteItem SDK error to StoreError.
pub fn map_delete_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<DeleteItemError, R>,
    target: impl Display,
) -> StoreError {
    if let Some(e) = transport_error(&err, "DeleteItem") {
        return e;
    }
    match err.into_service_error() {
        DeleteItemError::ConditionalCheckFailedException(_) => StoreError::conflict(target),
        DeleteItemError::ResourceNotFoundException(_) => {
            StoreError::Engine("Table not found".to_string())
        }
        DeleteItemError::ProvisionedThroughputExceededException(_) => throughput_exceeded(),
        DeleteItemError::RequestLimitExceeded(_) => request_limit_exceeded(),
        DeleteItemError::TransactionConflictException(_) => transaction_conflict(),
        DeleteItemError::InternalServerError(_) => internal_server_error(),
        err => unhandled(err, "DeleteItem"),
    }
}

/// Map a Query SDK error to StoreError.
pub fn map_query_error<R: Debug + Send + Sync + 'static>(err: SdkError<QueryError, R>) -> StoreError {
    if let Some(e) = transport_error(&err, "Query") {
        return e;
    }
    match err.into_service_error() {
        QueryError::ResourceNotFoundException(_) => {
            StoreError::Engine("Table or index not found".to_string())
        }
        QueryError::ProvisionedThroughputExceededException(_) => throughput_exceeded(),
        QueryError::RequestLimitExceeded(_) => request_limit_exceeded(),
        QueryError::InternalServerError(_) => internal_server_error(),
        err => unhandled(err, "Query"),
    }
}

/// Map a BatchGetItem SDK error to StoreError.
pub fn map_batch_get_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<BatchGetItemError, R>,
) -> StoreError {
    if let Some(e) = transport_error(&err, "BatchGetItem") {
        return e;
    }
    match err.into_service_error() {
        BatchGetItemError::ResourceNotFoundException(_) => {
            StoreError::Engine("Table not found".to_string())
        }
        BatchGetItemError::ProvisionedThroughputExceededException(_) => throughput_exceeded(),
        BatchGetItemError::RequestLimitExceeded(_) => request_limit_exceeded(),
        BatchGetItemError::InternalServerError(_) => internal_server_error(),
        err => unhandled(err, "BatchGetItem"),
    }
}

/// Map a BatchWriteItem SDK error to StoreError.
pub fn map_batch_write_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<BatchWriteItemError, R>,
) -> StoreError {
    if let Some(e) = transport_error(&err, "BatchWriteItem") {
        return e;
    }
    match err.into_service_error() {
        BatchWriteItemError::ResourceNotFoundException(_) => {
            StoreError::Engine("Table not found".to_string())
        }
        BatchWriteItemError::ProvisionedThroughputExceededException(_) => throughput_exceeded(),
        BatchWriteItemError::RequestLimitExceeded(_) => request_limit_exceeded(),
        BatchWriteItemError::ItemCollectionSizeLimitExceededException(_) => {
            StoreError::Engine("Item collection size limit exceeded".to_string())
        }
        BatchWriteItemError::InternalServerError(_) => internal_server_error(),
        err => unhandled(err, "BatchWriteItem"),
    }
}

/// Map a TransactWriteItems SDK error to StoreError.
///
/// A cancelled transaction is a `Conflict` when any operation's condition
/// failed. Other cancellation reasons (throttling, conflicting transactions)
/// are retryable.
pub fn map_transact_write_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<TransactWriteItemsError, R>,
    target: impl Display,
) -> StoreError {
    if let Some(e) = transport_error(&err, "TransactWriteItems") {
        return e;
    }
    match err.into_service_error() {
        TransactWriteItemsError::TransactionCanceledException(cancelled) => {
            let reasons: Vec<&str> = cancelled
                .cancellation_reasons()
                .iter()
                .filter_map(|r| r.code())
                .collect();
            if reasons.contains(&CONDITIONAL_CHECK_FAILED) {
                StoreError::conflict(target)
            } else {
                StoreError::Transient(format!("Transaction cancelled: {}", reasons.join(", ")))
            }
        }
        TransactWriteItemsError::TransactionInProgressException(_) => transaction_conflict(),
        TransactWriteItemsError::ResourceNotFoundException(_) => {
            StoreError::Engine("Table not found".to_string())
        }
        TransactWriteItemsError::ProvisionedThroughputExceededException(_) => {
            throughput_exceeded()
        }
        TransactWriteItemsError::RequestLimitExceeded(_) => request_limit_exceeded(),
        TransactWriteItemsError::InternalServerError(_) => internal_server_error(),
        err => unhandled(err, "TransactWriteItems"),
    }
}
