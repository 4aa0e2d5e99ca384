//! Storage contracts: the engine boundary, request and result types, the
//! error taxonomy and the typed repository traits.

mod cancellation;
mod condition;
mod config;
mod error;
pub mod expression;
mod http_mapping;
mod traits;
mod types;

pub use cancellation::{CancelHandle, Cancellation};
pub use condition::{Condition, KeyCondition, SortCondition};
pub use config::{
    IndexNames, StoreConfig, DEFAULT_BATCH_GET_LIMIT, DEFAULT_BATCH_RETRY_ATTEMPTS,
    DEFAULT_BATCH_RETRY_BASE_DELAY, DEFAULT_BATCH_WRITE_LIMIT, DEFAULT_MAX_ITEMS,
    DEFAULT_MAX_TRANSACTION_OPERATIONS, DEFAULT_PAGE_SIZE, DEFAULT_TABLE_NAME,
    DEFAULT_TAG_ATTEMPTS,
};
pub use error::{RepositoryError, RepositoryResult, Result, StoreError};
pub use expression::ExpressionBuilder;
pub use http_mapping::{is_retryable, repository_error_to_status_code, store_error_to_status_code};
pub use traits::{Engine, UserRepository, VerificationRepository};
pub use types::{
    BatchDeleteResult, BatchGetResponse, BatchGetResult, BatchWriteResponse, BatchWriteResult,
    CountResult, Order, Projection, QueryAll, QueryAllOptions, QueryOptions, QueryPage,
    QueryRequest, QueryResponse, Select, TransactOp, WriteRequest,
};
