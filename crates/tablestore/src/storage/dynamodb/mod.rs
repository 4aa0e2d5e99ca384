//! DynamoDB engine backend.
//!
//! This module provides a DynamoDB-based implementation of the `Engine`
//! trait using `aws-sdk-dynamodb`. The table is expected to carry the
//! primary key `PK`/`SK` and four global secondary indexes keyed on
//! `GSI1PK`/`GSI1SK` through `GSI4PK`/`GSI4SK`.

mod conversions;
mod engine;
mod error;

pub use engine::DynamoDbEngine;
