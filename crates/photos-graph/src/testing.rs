//! Scripted in-memory [`GraphStore`] for tests.
//!
//! Responses are matched by substring against the statement text; the first
//! matching rule wins and unmatched statements return an empty result.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::params::BoundParameters;
use crate::store::{GraphStore, ResultSet, StoreError, StoreErrorKind};

enum Reply {
    Rows(ResultSet),
    Fail(StoreErrorKind, String),
}

/// A statement the store received, with its bound parameters.
#[derive(Debug, Clone)]
pub struct ExecutedQuery {
    pub sql: String,
    pub params: BoundParameters,
}

/// An insert the store received.
#[derive(Debug, Clone)]
pub struct InsertedRows {
    pub table: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

#[derive(Default)]
pub struct ScriptedStore {
    rules: Vec<(String, Reply)>,
    queries: Mutex<Vec<ExecutedQuery>>,
    inserts: Mutex<Vec<InsertedRows>>,
    ddl: Mutex<Vec<String>>,
    insert_failure: Option<(StoreErrorKind, String)>,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer statements containing `pattern` with `result`.
    pub fn on(mut self, pattern: &str, result: ResultSet) -> Self {
        self.rules.push((pattern.to_string(), Reply::Rows(result)));
        self
    }

    /// Fail statements containing `pattern` with an error of `kind`.
    pub fn fail(mut self, pattern: &str, kind: StoreErrorKind, message: &str) -> Self {
        self.rules
            .push((pattern.to_string(), Reply::Fail(kind, message.to_string())));
        self
    }

    /// Fail every insert with an error of `kind`.
    pub fn fail_inserts(mut self, kind: StoreErrorKind, message: &str) -> Self {
        self.insert_failure = Some((kind, message.to_string()));
        self
    }

    /// Statement texts received so far, in order.
    pub fn executed(&self) -> Vec<String> {
        self.queries().into_iter().map(|q| q.sql).collect()
    }

    pub fn queries(&self) -> Vec<ExecutedQuery> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }

    pub fn inserts(&self) -> Vec<InsertedRows> {
        self.inserts.lock().map(|i| i.clone()).unwrap_or_default()
    }

    pub fn ddl(&self) -> Vec<String> {
        self.ddl.lock().map(|d| d.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl GraphStore for ScriptedStore {
    async fn snapshot_query(
        &self,
        sql: &str,
        params: &BoundParameters,
    ) -> Result<ResultSet, StoreError> {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(ExecutedQuery {
                sql: sql.to_string(),
                params: params.clone(),
            });
        }

        let reply = self
            .rules
            .iter()
            .find(|(pattern, _)| sql.contains(pattern.as_str()))
            .map(|(_, reply)| reply);

        match reply {
            Some(Reply::Rows(result)) => Ok(result.clone()),
            Some(Reply::Fail(kind, message)) => Err(StoreError::new(*kind, message.clone())),
            None => Ok(ResultSet::default()),
        }
    }

    async fn insert(
        &self,
        table: &str,
        columns: &[&str],
        rows: Vec<Vec<Value>>,
    ) -> Result<(), StoreError> {
        if let Some((kind, message)) = &self.insert_failure {
            return Err(StoreError::new(*kind, message.clone()));
        }
        if let Ok(mut inserts) = self.inserts.lock() {
            inserts.push(InsertedRows {
                table: table.to_string(),
                columns: columns.iter().map(|c| c.to_string()).collect(),
                rows,
            });
        }
        Ok(())
    }

    async fn update_ddl(&self, statements: &[String]) -> Result<(), StoreError> {
        if let Ok(mut ddl) = self.ddl.lock() {
            ddl.extend(statements.iter().cloned());
        }
        Ok(())
    }
}
