//! SQLite-backed execution for `crosstab` pivots.
//!
//! This crate owns the impure half of the system:
//! - [`EphemeralDataset`]: a disposable in-memory relation holding one
//!   session's records (create, bulk-load, query, truncate), backed by a
//!   private rusqlite connection.
//! - [`PivotEngine`]: orchestration of schema inference, validation, bucket
//!   resolution, query assembly, and execution for single-configuration and
//!   batch requests, with unconditional cleanup on every exit path.
//!
//! The relational engine is consumed only through the narrow surface of
//! `dataset.rs`; rusqlite types never appear in the public API.

#![forbid(unsafe_code)]

mod dataset;
mod engine;

pub use crate::dataset::{EphemeralDataset, StorageError, StorageResult, RELATION_NAME};
pub use crate::engine::{EngineResult, PivotEngine, PivotError};
