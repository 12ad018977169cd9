//! Guarded query execution and row shaping.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::{GraphError, Result};
use crate::guard::validate_read_only;
use crate::params::BoundParameters;
use crate::store::GraphStore;

/// One result row keyed by field name, in field order.
pub type Row = Map<String, Value>;

/// Rows from a query plus any warnings raised on the way.
///
/// Warnings carry anticipated store failures (permission, not found,
/// invalid argument, unavailable) that were degraded to an empty result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutcome {
    pub rows: Vec<Row>,
    pub warnings: Vec<String>,
    /// Rows dropped because their arity did not match the field names.
    pub skipped_rows: usize,
}

impl QueryOutcome {
    pub fn is_degraded(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Executes guarded, bound statements against a [`GraphStore`].
#[derive(Clone)]
pub struct QueryExecutor {
    store: Arc<dyn GraphStore>,
}

impl QueryExecutor {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }

    /// Run `query` and zip each row against its field names.
    ///
    /// Field names come from `expected_fields` when given and non-empty,
    /// otherwise from the store's metadata; with neither the call fails with
    /// [`GraphError::UndeterminedSchema`]. Rows of the wrong width are
    /// skipped and logged.
    pub async fn execute(
        &self,
        query: &str,
        params: &BoundParameters,
        expected_fields: Option<&[&str]>,
    ) -> Result<QueryOutcome> {
        if let Err(e) = validate_read_only(query) {
            tracing::error!(error = %e, "Generated statement failed the read-only guard");
            return Err(e);
        }

        tracing::debug!(sql = %query, param_count = params.values().len(), "Executing query");

        let result = match self.store.snapshot_query(query, params).await {
            Ok(result) => result,
            Err(e) if e.kind.is_soft() => {
                tracing::warn!(kind = %e.kind, error = %e.message, "Store error, returning empty result");
                return Ok(QueryOutcome {
                    rows: Vec::new(),
                    warnings: vec![format!("Database error: {e}")],
                    skipped_rows: 0,
                });
            }
            Err(e) => {
                tracing::error!(kind = %e.kind, error = %e.message, "Unexpected store error");
                return Err(GraphError::Store(e));
            }
        };

        let field_names: Vec<String> = match expected_fields {
            Some(fields) if !fields.is_empty() => fields.iter().map(|f| f.to_string()).collect(),
            _ => {
                tracing::debug!("No expected fields supplied, using result metadata");
                match result.fields {
                    Some(fields) if !fields.is_empty() => fields,
                    _ => return Err(GraphError::UndeterminedSchema),
                }
            }
        };

        let mut outcome = QueryOutcome::default();
        for values in result.rows {
            if values.len() != field_names.len() {
                tracing::warn!(
                    fields = field_names.len(),
                    values = values.len(),
                    "Row width does not match field names, skipping row"
                );
                outcome.skipped_rows += 1;
                continue;
            }
            let row: Row = field_names.iter().cloned().zip(values).collect();
            outcome.rows.push(row);
        }

        tracing::info!(
            rows = outcome.rows.len(),
            skipped = outcome.skipped_rows,
            "Query successful"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ResultSet, StoreErrorKind};
    use crate::testing::ScriptedStore;
    use serde_json::json;

    fn executor(store: &Arc<ScriptedStore>) -> QueryExecutor {
        QueryExecutor::new(store.clone())
    }

    #[tokio::test]
    async fn zips_rows_with_expected_fields() {
        let store = Arc::new(ScriptedStore::new().on(
            "FROM Photo",
            ResultSet {
                fields: None,
                rows: vec![vec![json!("ph01"), json!("Goa")]],
            },
        ));

        let outcome = executor(&store)
            .execute(
                "SELECT photo_id, location_name FROM Photo",
                &BoundParameters::new(),
                Some(&["photo_id", "location_name"]),
            )
            .await
            .unwrap();

        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(
            Value::Object(outcome.rows[0].clone()),
            json!({"photo_id": "ph01", "location_name": "Goa"})
        );
        let keys: Vec<&String> = outcome.rows[0].keys().collect();
        assert_eq!(keys, ["photo_id", "location_name"]);
    }

    #[tokio::test]
    async fn every_matching_row_is_returned_in_order() {
        let rows: Vec<Vec<Value>> = (0..5)
            .map(|i| vec![json!(format!("ph0{i}")), json!(i)])
            .collect();
        let store = Arc::new(ScriptedStore::new().on(
            "SELECT",
            ResultSet {
                fields: None,
                rows: rows.clone(),
            },
        ));

        let outcome = executor(&store)
            .execute("SELECT a, b FROM T", &BoundParameters::new(), Some(&["a", "b"]))
            .await
            .unwrap();

        assert_eq!(outcome.rows.len(), rows.len());
        for (row, values) in outcome.rows.iter().zip(&rows) {
            assert_eq!(row["a"], values[0]);
            assert_eq!(row["b"], values[1]);
        }
    }

    #[tokio::test]
    async fn falls_back_to_result_metadata() {
        let store = Arc::new(ScriptedStore::new().on(
            "MATCH",
            ResultSet {
                fields: Some(vec!["name".to_string()]),
                rows: vec![vec![json!("Priya")], vec![json!("Vikram")]],
            },
        ));

        let outcome = executor(&store)
            .execute(
                "SELECT person.name FROM GRAPH PhotosGraph MATCH (person:Person)",
                &BoundParameters::new(),
                None,
            )
            .await
            .unwrap();

        assert_eq!(outcome.rows.len(), 2);
        assert_eq!(outcome.rows[1]["name"], json!("Vikram"));
    }

    #[tokio::test]
    async fn missing_field_names_is_fatal() {
        let store = Arc::new(ScriptedStore::new().on(
            "SELECT",
            ResultSet {
                fields: None,
                rows: vec![vec![json!(1)]],
            },
        ));

        let err = executor(&store)
            .execute("SELECT 1", &BoundParameters::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::UndeterminedSchema));

        let err = executor(&store)
            .execute("SELECT 1", &BoundParameters::new(), Some(&[]))
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::UndeterminedSchema));
    }

    #[tokio::test]
    async fn mismatched_rows_are_skipped() {
        let store = Arc::new(ScriptedStore::new().on(
            "SELECT",
            ResultSet {
                fields: None,
                rows: vec![
                    vec![json!("ph01"), json!("Goa")],
                    vec![json!("ph02")],
                    vec![json!("ph03"), json!("Delhi"), json!("extra")],
                    vec![json!("ph04"), json!("Pune")],
                ],
            },
        ));

        let outcome = executor(&store)
            .execute(
                "SELECT photo_id, location_name FROM Photo",
                &BoundParameters::new(),
                Some(&["photo_id", "location_name"]),
            )
            .await
            .unwrap();

        assert_eq!(outcome.rows.len(), 2);
        assert_eq!(outcome.skipped_rows, 2);
        assert_eq!(outcome.rows[1]["photo_id"], json!("ph04"));
    }

    #[tokio::test]
    async fn rejected_query_never_reaches_store() {
        let store = Arc::new(ScriptedStore::new());

        let err = executor(&store)
            .execute("DELETE FROM Person", &BoundParameters::new(), None)
            .await
            .unwrap_err();

        assert!(matches!(err, GraphError::QueryRejected { .. }));
        assert!(store.executed().is_empty());
    }

    #[tokio::test]
    async fn soft_store_errors_degrade_to_warning() {
        for kind in [
            StoreErrorKind::PermissionDenied,
            StoreErrorKind::NotFound,
            StoreErrorKind::InvalidArgument,
        ] {
            let store = Arc::new(ScriptedStore::new().fail("SELECT", kind, "boom"));
            let outcome = executor(&store)
                .execute("SELECT 1", &BoundParameters::new(), Some(&["one"]))
                .await
                .unwrap();
            assert!(outcome.rows.is_empty());
            assert!(outcome.is_degraded());
            assert!(outcome.warnings[0].contains("boom"));
        }
    }

    #[tokio::test]
    async fn unexpected_store_errors_propagate() {
        let store = Arc::new(ScriptedStore::new().fail("SELECT", StoreErrorKind::Internal, "kaput"));
        let err = executor(&store)
            .execute("SELECT 1", &BoundParameters::new(), Some(&["one"]))
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::Store(_)));
    }

    #[tokio::test]
    async fn empty_result_is_not_an_error() {
        let store = Arc::new(ScriptedStore::new());
        let outcome = executor(&store)
            .execute("SELECT 1", &BoundParameters::new(), Some(&["one"]))
            .await
            .unwrap();
        assert!(outcome.rows.is_empty());
        assert!(!outcome.is_degraded());
        assert_eq!(store.executed(), vec!["SELECT 1".to_string()]);
    }
}
