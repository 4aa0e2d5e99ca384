//! Functional core of the tablestore single-table data-access layer.
//!
//! Everything in this crate is pure: key derivation, item conversion, entity
//! validation, condition rendering and cursor encoding. The only I/O-facing
//! pieces are trait definitions (`storage::Engine`, the repository traits and
//! `cache::Cache`); their implementations live in the `tablestore` crate.

pub mod cache;
pub mod entity;
pub mod item;
pub mod keys;
pub mod models;
pub mod pagination;
pub mod storage;
