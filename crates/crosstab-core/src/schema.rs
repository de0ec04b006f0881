use crate::error::{ConfigError, ConfigResult};
use crate::value::Record;
use serde::{Deserialize, Serialize};

/// Type tag for an inferred column. Numeric values infer as [`ColumnType::Numeric`];
/// everything else (text, booleans, nulls) infers as [`ColumnType::Text`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Numeric,
    Text,
}

/// A column-name to type map inferred once per dataset.
///
/// Column names are case-sensitive and unique; iteration order is the sample
/// record's field order (lexicographic, since records are ordered maps).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColumnSchema {
    columns: Vec<(String, ColumnType)>,
}

impl ColumnSchema {
    /// Infer a schema from a single representative record.
    ///
    /// Inference reads exactly one sample; fields absent or differently typed
    /// in later records are not reconciled. This is the defined contract, not
    /// an oversight.
    pub fn infer(sample: &Record) -> Self {
        let columns = sample
            .iter()
            .map(|(name, value)| {
                let ty = if value.is_numeric() {
                    ColumnType::Numeric
                } else {
                    ColumnType::Text
                };
                (name.clone(), ty)
            })
            .collect();
        Self { columns }
    }

    /// Infer from the first record of a batch, failing when the batch is empty.
    pub fn infer_from_records(records: &[Record]) -> ConfigResult<Self> {
        let sample = records.first().ok_or(ConfigError::EmptyDataset)?;
        Ok(Self::infer(sample))
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, ColumnType)> {
        self.columns.iter().map(|(name, ty)| (name.as_str(), *ty))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|(n, _)| n == name)
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, ty)| *ty)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
