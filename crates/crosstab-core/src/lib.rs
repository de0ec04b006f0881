//! Pivot-table compiler for uniform record batches.
//!
//! This crate is the pure half of `crosstab`: it infers a column schema from a
//! sample record, validates a declarative [`PivotConfiguration`] against that
//! schema, resolves cross-tab buckets, and compiles the configuration into a
//! single aggregate SQL query. It performs no I/O; executing the compiled
//! query against an ephemeral relation is the job of `crosstab-engine`.

#![forbid(unsafe_code)]

mod buckets;
mod config;
mod error;
mod result;
mod schema;
mod sql;
mod value;

pub use crate::buckets::{ResolvedBucket, ResolvedBuckets, MAX_DISCOVERED_BUCKETS};
pub use crate::config::{
    AggregateField, BucketSpec, GroupByEntry, PivotColumnSpec, PivotConfiguration,
};
pub use crate::error::{Clause, ConfigError, ConfigResult};
pub use crate::result::PivotResult;
pub use crate::schema::{ColumnSchema, ColumnType};
pub use crate::sql::{assemble_pivot_query, quote_ident, quote_literal};
pub use crate::value::{FieldValue, Record};
