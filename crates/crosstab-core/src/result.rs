use crate::value::FieldValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The result grid of one executed pivot query.
///
/// Column order is the assembled select-list order: group-by expressions,
/// then bucket columns, then aggregation columns.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PivotResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<FieldValue>>,
}

impl PivotResult {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Look up a value by row index and output column name.
    pub fn value(&self, row: usize, column: &str) -> Option<&FieldValue> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(idx)
    }

    /// Rows as field mappings. When an output column name collides (a bucket
    /// label shadowing an aggregation alias), the later column wins.
    pub fn row_maps(&self) -> Vec<BTreeMap<String, FieldValue>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }
}
