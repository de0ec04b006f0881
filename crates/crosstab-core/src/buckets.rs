//! Bucket resolution for the cross-tab column.

use crate::config::BucketSpec;
use crate::error::{ConfigError, ConfigResult};
use crate::value::FieldValue;

/// Hard ceiling on auto-discovered bucket cardinality. An unbounded pivot
/// column would turn a bounded aggregate query into a degenerate column
/// explosion; callers needing more must supply explicit buckets.
pub const MAX_DISCOVERED_BUCKETS: usize = 150;

/// One output column of the cross-tab: a label plus the set of raw
/// case-column values that route into it.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedBucket {
    pub label: String,
    pub values: Vec<FieldValue>,
}

/// The ordered bucket sequence a pivot column resolved to.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResolvedBuckets {
    buckets: Vec<ResolvedBucket>,
}

impl ResolvedBuckets {
    /// Resolve explicitly supplied buckets: one per spec entry, in supplied
    /// order, predicate values copied verbatim. Not subject to the discovery
    /// cap.
    pub fn from_spec(specs: &[BucketSpec]) -> Self {
        let buckets = specs
            .iter()
            .map(|spec| ResolvedBucket {
                label: spec.label.clone(),
                values: spec.values.clone(),
            })
            .collect();
        Self { buckets }
    }

    /// Resolve auto-discovered buckets: each distinct value becomes its own
    /// singleton bucket labeled with the value's string form. Exceeding
    /// [`MAX_DISCOVERED_BUCKETS`] is a hard failure.
    pub fn from_discovered(values: Vec<FieldValue>) -> ConfigResult<Self> {
        if values.len() > MAX_DISCOVERED_BUCKETS {
            return Err(ConfigError::BucketLimitExceeded {
                distinct: values.len(),
                limit: MAX_DISCOVERED_BUCKETS,
            });
        }
        let buckets = values
            .into_iter()
            .map(|value| ResolvedBucket {
                label: value.label(),
                values: vec![value],
            })
            .collect();
        Ok(Self { buckets })
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ResolvedBucket> {
        self.buckets.iter()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

impl<'a> IntoIterator for &'a ResolvedBuckets {
    type Item = &'a ResolvedBucket;
    type IntoIter = std::slice::Iter<'a, ResolvedBucket>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
