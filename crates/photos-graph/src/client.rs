//! Shared graph client.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use photos_core::config::SpannerConfig;

use crate::error::Result;
use crate::executor::{QueryExecutor, QueryOutcome};
use crate::params::BoundParameters;
use crate::spanner::SpannerStore;
use crate::store::GraphStore;

/// Typed records from a read, plus warnings from degraded store calls.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<T> {
    pub items: Vec<T>,
    pub warnings: Vec<String>,
}

impl<T> Fetched<T> {
    pub fn first(self) -> Option<T> {
        self.items.into_iter().next()
    }
}

/// The single point of access for photo graph reads and writes.
///
/// Holds an injected store; clone is cheap.
#[derive(Clone)]
pub struct GraphClient {
    executor: QueryExecutor,
    graph_name: String,
}

impl GraphClient {
    /// Wrap an already constructed store.
    pub fn new(store: Arc<dyn GraphStore>, graph_name: impl Into<String>) -> Self {
        Self {
            executor: QueryExecutor::new(store),
            graph_name: graph_name.into(),
        }
    }

    /// Connect to Spanner with the given configuration.
    pub async fn connect(config: &SpannerConfig) -> Result<Self> {
        let store = SpannerStore::connect(config).await?;
        Ok(Self::new(Arc::new(store), config.graph.clone()))
    }

    /// Property graph name used in `FROM GRAPH` clauses.
    pub fn graph_name(&self) -> &str {
        &self.graph_name
    }

    pub fn executor(&self) -> &QueryExecutor {
        &self.executor
    }

    pub fn store(&self) -> &Arc<dyn GraphStore> {
        self.executor.store()
    }

    /// Execute a guarded statement and return shaped rows.
    pub async fn execute(
        &self,
        query: &str,
        params: &BoundParameters,
        expected_fields: Option<&[&str]>,
    ) -> Result<QueryOutcome> {
        self.executor.execute(query, params, expected_fields).await
    }

    /// Execute and deserialize each row into `T`.
    ///
    /// Rows that do not fit `T` (for example a NULL in a required column)
    /// are skipped and logged, and a warning is added to the result.
    pub(crate) async fn fetch<T: DeserializeOwned>(
        &self,
        query: &str,
        params: &BoundParameters,
        fields: &[&str],
    ) -> Result<Fetched<T>> {
        let outcome = self.execute(query, params, Some(fields)).await?;
        let mut warnings = outcome.warnings;
        let mut items = Vec::with_capacity(outcome.rows.len());
        for row in outcome.rows {
            match serde_json::from_value::<T>(Value::Object(row)) {
                Ok(item) => items.push(item),
                Err(e) => {
                    tracing::warn!(error = %e, "Row does not match record type, skipping row");
                    warnings.push(format!("Skipped malformed row: {e}"));
                }
            }
        }
        Ok(Fetched { items, warnings })
    }
}
