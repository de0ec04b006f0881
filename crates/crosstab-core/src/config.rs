//! Declarative pivot configuration and its eager validation.
//!
//! A [`PivotConfiguration`] is a closed, serialization-friendly structure:
//! an optional cross-tab column, an ordered list of sum measures, and
//! optional group-by / sort-by clauses. It is validated against an inferred
//! [`ColumnSchema`] *before* any relation is created, so malformed
//! configurations never reach the execution engine.

use crate::error::{Clause, ConfigError, ConfigResult};
use crate::schema::ColumnSchema;
use crate::value::FieldValue;
use serde::{Deserialize, Serialize};

/// One requested sum measure: a source column with an optional output alias.
///
/// Untagged, so `"amount"` and `{"column": "amount", "alias": "total"}` both
/// deserialize.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AggregateField {
    Column(String),
    Aliased { column: String, alias: String },
}

impl AggregateField {
    pub fn new(column: impl Into<String>) -> Self {
        AggregateField::Column(column.into())
    }

    pub fn aliased(column: impl Into<String>, alias: impl Into<String>) -> Self {
        AggregateField::Aliased {
            column: column.into(),
            alias: alias.into(),
        }
    }

    pub fn column(&self) -> &str {
        match self {
            AggregateField::Column(column) => column,
            AggregateField::Aliased { column, .. } => column,
        }
    }

    /// The output alias, defaulting to the source column name.
    pub fn alias(&self) -> &str {
        match self {
            AggregateField::Column(column) => column,
            AggregateField::Aliased { alias, .. } => alias,
        }
    }
}

/// One named group of raw case-column values that collapse into a single
/// output column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BucketSpec {
    pub label: String,
    pub values: Vec<FieldValue>,
}

/// The cross-tabulation axis of a configuration.
///
/// When `buckets` is absent, buckets are auto-discovered from the distinct
/// values of `case_column` in the loaded dataset (capped at
/// [`crate::MAX_DISCOVERED_BUCKETS`]). Explicit buckets are an ordered
/// sequence rather than a map so the supplied order is preserved.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PivotColumnSpec {
    pub case_column: String,
    pub sum_column: String,
    #[serde(default)]
    pub buckets: Option<Vec<BucketSpec>>,
}

/// A complete pivot configuration. Immutable once constructed; several
/// configurations may run against one loaded dataset.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PivotConfiguration {
    #[serde(default)]
    pub pivot_column: Option<PivotColumnSpec>,
    #[serde(default)]
    pub aggregation: Vec<AggregateField>,
    #[serde(default)]
    pub group_by: Vec<String>,
    #[serde(default)]
    pub sort_by: Vec<String>,
}

impl PivotConfiguration {
    pub fn new(aggregation: Vec<AggregateField>) -> Self {
        Self {
            aggregation,
            ..Self::default()
        }
    }

    /// Check every field reference against the schema, failing on the first
    /// unresolvable one.
    ///
    /// Checked in clause order: aggregation sources, group-by entries,
    /// sort-by entries, then the pivot case/sum columns. Group-by entries are
    /// parsed once into `{expression, alias}`; synthesized expressions
    /// (whitespace) and the `null` literal bypass schema membership. Sort-by
    /// entries must be bare schema columns, verbatim. Entries whose raw text
    /// is later interpolated unquoted into SQL are also rejected here if they
    /// carry a statement delimiter.
    pub fn validate(&self, schema: &ColumnSchema) -> ConfigResult<()> {
        for field in &self.aggregation {
            if !schema.contains(field.column()) {
                return Err(ConfigError::UnknownField {
                    field: field.column().to_string(),
                    clause: Clause::Aggregation,
                });
            }
        }

        for text in &self.group_by {
            ensure_no_delimiter(text)?;
            let entry = GroupByEntry::parse(text);
            let exempt = entry.is_raw_expression()
                || (entry.alias.is_some() && entry.is_null_literal());
            if !exempt && !schema.contains(&entry.expression) {
                return Err(ConfigError::UnknownField {
                    field: entry.expression,
                    clause: Clause::GroupBy,
                });
            }
        }

        for column in &self.sort_by {
            ensure_no_delimiter(column)?;
            if !schema.contains(column) {
                return Err(ConfigError::UnknownField {
                    field: column.clone(),
                    clause: Clause::SortBy,
                });
            }
        }

        if let Some(pivot) = &self.pivot_column {
            for column in [&pivot.case_column, &pivot.sum_column] {
                if !schema.contains(column) {
                    return Err(ConfigError::UnknownField {
                        field: column.clone(),
                        clause: Clause::PivotColumn,
                    });
                }
            }
        }

        Ok(())
    }
}

/// A group-by entry parsed once into its expression and optional alias.
///
/// The separator is the rightmost case-insensitive ` as ` whose right-hand
/// side is a bare identifier; anything else (for example the `as` inside
/// `cast(x as int)`) stays part of the expression. `text` keeps the original
/// entry so the select list can reproduce it verbatim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupByEntry {
    pub text: String,
    pub expression: String,
    pub alias: Option<String>,
}

impl GroupByEntry {
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        let lower = trimmed.to_ascii_lowercase();

        let mut separator = None;
        let mut from = 0;
        while let Some(pos) = lower[from..].find(" as ") {
            let at = from + pos;
            if is_identifier(trimmed[at + 4..].trim()) {
                separator = Some(at);
            }
            from = at + 1;
        }

        match separator {
            Some(at) => Self {
                text: trimmed.to_string(),
                expression: trimmed[..at].trim().to_string(),
                alias: Some(trimmed[at + 4..].trim().to_string()),
            },
            None => Self {
                text: trimmed.to_string(),
                expression: trimmed.to_string(),
                alias: None,
            },
        }
    }

    /// Synthesized expressions (concatenations, casts, function calls with
    /// spaces) are recognized by embedded whitespace and bypass schema checks.
    pub fn is_raw_expression(&self) -> bool {
        self.expression.chars().any(char::is_whitespace)
    }

    pub fn is_null_literal(&self) -> bool {
        self.expression.eq_ignore_ascii_case("null")
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub(crate) fn ensure_no_delimiter(text: &str) -> ConfigResult<()> {
    if text.contains(';') {
        return Err(ConfigError::UnsafeExpression {
            expression: text.to_string(),
        });
    }
    Ok(())
}
