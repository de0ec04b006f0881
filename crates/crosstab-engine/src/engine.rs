//! Orchestration of one pivot session over an ephemeral dataset.

use crate::dataset::{EphemeralDataset, StorageError, RELATION_NAME};
use crosstab_core::{
    assemble_pivot_query, ColumnSchema, ConfigError, PivotConfiguration, PivotResult, Record,
    ResolvedBuckets,
};
use log::{debug, warn};
use thiserror::Error;

pub type EngineResult<T> = Result<T, PivotError>;

/// Everything a pivot session can fail with. Configuration errors are
/// detected before any relation exists; storage errors always trigger a
/// cleanup attempt first.
#[derive(Debug, Error, PartialEq)]
pub enum PivotError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Runs pivot configurations against an in-memory batch of records.
///
/// Each call provisions its own [`EphemeralDataset`] (its own in-memory
/// database), so concurrent sessions never share a relation. Within a
/// session, the load completes before any query runs and queries execute
/// strictly sequentially; the relation is truncated exactly once at session
/// end, on every exit path.
#[derive(Clone, Copy, Debug, Default)]
pub struct PivotEngine;

impl PivotEngine {
    pub fn new() -> Self {
        Self
    }

    /// Run one configuration: infer schema, validate, create and load the
    /// dataset, resolve buckets, assemble, execute, clear, return rows.
    pub async fn pivot(
        &self,
        records: &[Record],
        config: &PivotConfiguration,
    ) -> EngineResult<PivotResult> {
        let mut results = self
            .run_session(records, std::slice::from_ref(config))
            .await?;
        Ok(results.pop().expect("one configuration yields one result"))
    }

    /// Run several configurations against one loaded dataset, amortizing the
    /// load across them. Results come back in configuration order and are
    /// element-wise identical to independent single runs over the same data.
    pub async fn pivot_batch(
        &self,
        records: &[Record],
        configs: &[PivotConfiguration],
    ) -> EngineResult<Vec<PivotResult>> {
        self.run_session(records, configs).await
    }

    async fn run_session(
        &self,
        records: &[Record],
        configs: &[PivotConfiguration],
    ) -> EngineResult<Vec<PivotResult>> {
        let schema = ColumnSchema::infer_from_records(records)?;

        // Every configuration is validated before the relation is created, so
        // a validation failure leaves no residual state.
        for config in configs {
            config.validate(&schema)?;
        }

        let dataset = EphemeralDataset::create(&schema).await?;
        let outcome = self.load_and_run(&dataset, records, configs).await;

        // Unconditional cleanup. A clear failure is the last failure observed
        // and takes precedence over whatever the session produced.
        if let Err(clear_err) = dataset.clear().await {
            if let Err(session_err) = &outcome {
                warn!("clear failure supersedes earlier session failure: {session_err}");
            }
            return Err(clear_err.into());
        }
        outcome
    }

    async fn load_and_run(
        &self,
        dataset: &EphemeralDataset,
        records: &[Record],
        configs: &[PivotConfiguration],
    ) -> EngineResult<Vec<PivotResult>> {
        dataset.load(records).await?;

        let mut results = Vec::with_capacity(configs.len());
        for config in configs {
            let buckets = self.resolve_buckets(dataset, config).await?;
            let sql = assemble_pivot_query(config, buckets.as_ref(), RELATION_NAME)?;
            debug!("assembled pivot query: {sql}");
            results.push(dataset.query(&sql).await?);
        }
        Ok(results)
    }

    async fn resolve_buckets(
        &self,
        dataset: &EphemeralDataset,
        config: &PivotConfiguration,
    ) -> EngineResult<Option<ResolvedBuckets>> {
        let Some(pivot) = &config.pivot_column else {
            return Ok(None);
        };
        let buckets = match &pivot.buckets {
            Some(specs) => ResolvedBuckets::from_spec(specs),
            None => {
                let distinct = dataset.distinct_values(&pivot.case_column).await?;
                debug!(
                    "discovered {} distinct values for pivot column `{}`",
                    distinct.len(),
                    pivot.case_column
                );
                ResolvedBuckets::from_discovered(distinct)?
            }
        };
        Ok(Some(buckets))
    }
}
