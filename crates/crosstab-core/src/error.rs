use std::fmt;
use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

/// The configuration clause in which an invalid field reference was found.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Clause {
    Aggregation,
    GroupBy,
    SortBy,
    PivotColumn,
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Clause::Aggregation => "aggregation",
            Clause::GroupBy => "group-by",
            Clause::SortBy => "sort-by",
            Clause::PivotColumn => "pivot-column",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("cannot infer a schema from an empty dataset")]
    EmptyDataset,

    #[error("unknown field `{field}` in {clause} clause")]
    UnknownField { field: String, clause: Clause },

    #[error("pivot column produced {distinct} distinct values; the auto-discovery limit is {limit}")]
    BucketLimitExceeded { distinct: usize, limit: usize },

    #[error("expression `{expression}` contains a statement delimiter")]
    UnsafeExpression { expression: String },

    #[error("bucket `{label}` has no predicate values")]
    EmptyBucket { label: String },

    #[error("configuration selects no columns")]
    EmptySelect,
}
