//! Cloud Spanner REST implementation of [`GraphStore`].
//!
//! Reads run in single-use read-only strong transactions, inserts in
//! single-use read-write transactions, schema changes through `updateDdl`.
//! A session is created on connect and recreated once if the store reports
//! it gone.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use photos_core::config::SpannerConfig;

use crate::error::GraphError;
use crate::params::BoundParameters;
use crate::store::{GraphStore, ResultSet, StoreError, StoreErrorKind};

const DDL_POLL_INTERVAL: Duration = Duration::from_secs(2);
const DDL_MAX_WAIT: Duration = Duration::from_secs(360);
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

struct CachedToken {
    token: String,
    expires_at: Instant,
}

enum TokenSource {
    /// Emulator endpoints take no credentials.
    Anonymous,
    Static(String),
    Metadata {
        url: String,
        cached: Mutex<Option<CachedToken>>,
    },
}

/// Spanner database client over the REST API.
pub struct SpannerStore {
    http: reqwest::Client,
    config: SpannerConfig,
    token: TokenSource,
    session: Mutex<Option<String>>,
}

impl SpannerStore {
    /// Build the client and open a session, verifying the database is
    /// reachable.
    pub async fn connect(config: &SpannerConfig) -> Result<Self, GraphError> {
        if config.project.is_empty() {
            return Err(GraphError::InvalidInput(
                "spanner.project must be set".to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| GraphError::Store(transport(e)))?;

        let token = match &config.access_token {
            Some(token) => TokenSource::Static(token.clone()),
            None if config.endpoint.contains("googleapis.com") => TokenSource::Metadata {
                url: config.metadata_token_url.clone(),
                cached: Mutex::new(None),
            },
            None => TokenSource::Anonymous,
        };

        let store = Self {
            http,
            config: config.clone(),
            token,
            session: Mutex::new(None),
        };
        store.session().await?;

        tracing::info!(
            endpoint = %config.endpoint,
            database = %config.database_path(),
            "Connected to Spanner"
        );
        Ok(store)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    async fn bearer(&self) -> Result<Option<String>, StoreError> {
        match &self.token {
            TokenSource::Anonymous => Ok(None),
            TokenSource::Static(token) => Ok(Some(token.clone())),
            TokenSource::Metadata { url, cached } => {
                let mut guard = cached.lock().await;
                if let Some(token) = guard.as_ref() {
                    if token.expires_at > Instant::now() {
                        return Ok(Some(token.token.clone()));
                    }
                }

                let response = self
                    .http
                    .get(url)
                    .header("Metadata-Flavor", "Google")
                    .send()
                    .await
                    .map_err(transport)?;
                let status = response.status();
                let body = response.text().await.map_err(transport)?;
                if !status.is_success() {
                    return Err(StoreError::new(
                        StoreErrorKind::PermissionDenied,
                        format!("metadata token request failed with {status}"),
                    ));
                }
                let body: Value = serde_json::from_str(&body).map_err(decode)?;
                let token = body["access_token"]
                    .as_str()
                    .ok_or_else(|| {
                        StoreError::new(StoreErrorKind::Decode, "token response missing access_token")
                    })?
                    .to_string();
                let lifetime = Duration::from_secs(body["expires_in"].as_u64().unwrap_or(300));

                *guard = Some(CachedToken {
                    token: token.clone(),
                    expires_at: Instant::now() + lifetime.saturating_sub(TOKEN_REFRESH_MARGIN),
                });
                Ok(Some(token))
            }
        }
    }

    async fn call(&self, method: Method, url: &str, body: Option<&Value>) -> Result<Value, StoreError> {
        let mut request = self.http.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        if let Some(token) = self.bearer().await? {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        let text = response.text().await.map_err(transport)?;
        if !status.is_success() {
            return Err(parse_error(status.as_u16(), &text));
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(decode)
    }

    async fn session(&self) -> Result<String, StoreError> {
        let mut guard = self.session.lock().await;
        if let Some(name) = guard.as_ref() {
            return Ok(name.clone());
        }

        let url = self.url(&format!("{}/sessions", self.config.database_path()));
        let body = self.call(Method::POST, &url, Some(&json!({}))).await?;
        let name = body["name"]
            .as_str()
            .ok_or_else(|| StoreError::new(StoreErrorKind::Decode, "session response missing name"))?
            .to_string();

        tracing::debug!(session = %name, "Created Spanner session");
        *guard = Some(name.clone());
        Ok(name)
    }

    /// POST `{session}:{rpc}`, recreating the session once if it expired.
    async fn session_call(&self, rpc: &str, body: &Value) -> Result<Value, StoreError> {
        let session = self.session().await?;
        let url = self.url(&format!("{session}:{rpc}"));
        match self.call(Method::POST, &url, Some(body)).await {
            Err(e) if e.kind == StoreErrorKind::NotFound && e.message.contains("Session not found") => {
                tracing::info!(session = %session, "Session expired, recreating");
                *self.session.lock().await = None;
                let session = self.session().await?;
                let url = self.url(&format!("{session}:{rpc}"));
                self.call(Method::POST, &url, Some(body)).await
            }
            other => other,
        }
    }

    async fn wait_for_operation(&self, mut operation: Value) -> Result<(), StoreError> {
        let started = Instant::now();
        loop {
            if let Some(error) = operation.get("error") {
                let code = error["code"].as_i64().unwrap_or(2);
                let message = error["message"].as_str().unwrap_or("operation failed");
                return Err(StoreError::new(StoreErrorKind::from_code(code), message));
            }
            if operation["done"].as_bool().unwrap_or(false) {
                return Ok(());
            }
            if started.elapsed() > DDL_MAX_WAIT {
                return Err(StoreError::new(
                    StoreErrorKind::Unavailable,
                    "schema operation did not complete in time",
                ));
            }

            let name = operation["name"]
                .as_str()
                .ok_or_else(|| StoreError::new(StoreErrorKind::Decode, "operation missing name"))?
                .to_string();
            tokio::time::sleep(DDL_POLL_INTERVAL).await;
            operation = self.call(Method::GET, &self.url(&name), None).await?;
        }
    }
}

#[async_trait]
impl GraphStore for SpannerStore {
    async fn snapshot_query(
        &self,
        sql: &str,
        params: &BoundParameters,
    ) -> Result<ResultSet, StoreError> {
        let mut body = json!({
            "sql": sql,
            "transaction": { "singleUse": { "readOnly": { "strong": true } } },
        });
        if !params.is_empty() {
            body["params"] = Value::Object(params.values().clone());
        }
        if !params.types().is_empty() {
            body["paramTypes"] = Value::Object(params.type_descriptors());
        }

        let response = self.session_call("executeSql", &body).await?;
        decode_result_set(&response)
    }

    async fn insert(
        &self,
        table: &str,
        columns: &[&str],
        rows: Vec<Vec<Value>>,
    ) -> Result<(), StoreError> {
        let row_count = rows.len();
        let body = json!({
            "singleUseTransaction": { "readWrite": {} },
            "mutations": [{
                "insert": { "table": table, "columns": columns, "values": rows }
            }],
        });
        self.session_call("commit", &body).await?;
        tracing::debug!(table, rows = row_count, "Committed insert");
        Ok(())
    }

    async fn update_ddl(&self, statements: &[String]) -> Result<(), StoreError> {
        let url = self.url(&format!("{}/ddl", self.config.database_path()));
        let operation = self
            .call(Method::PATCH, &url, Some(&json!({ "statements": statements })))
            .await?;
        self.wait_for_operation(operation).await
    }
}

/// Decode an `executeSql` response into a [`ResultSet`].
///
/// `INT64` values arrive as decimal strings and are turned into numbers
/// using the column types from the response metadata.
pub fn decode_result_set(body: &Value) -> Result<ResultSet, StoreError> {
    let columns = body
        .pointer("/metadata/rowType/fields")
        .and_then(Value::as_array);

    let fields = columns.map(|columns| {
        columns
            .iter()
            .map(|c| c["name"].as_str().unwrap_or_default().to_string())
            .collect::<Vec<_>>()
    });
    let types: Vec<Value> = columns
        .map(|columns| columns.iter().map(|c| c["type"].clone()).collect())
        .unwrap_or_default();

    let rows = match body.get("rows") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(rows)) => rows
            .iter()
            .map(|row| match row {
                Value::Array(values) => Ok(values
                    .iter()
                    .enumerate()
                    .map(|(i, v)| decode_value(v, types.get(i)))
                    .collect::<Vec<Value>>()),
                _ => Err(StoreError::new(StoreErrorKind::Decode, "row is not an array")),
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => {
            return Err(StoreError::new(
                StoreErrorKind::Decode,
                "rows is not an array",
            ))
        }
    };

    Ok(ResultSet { fields, rows })
}

fn decode_value(value: &Value, ty: Option<&Value>) -> Value {
    let Some(ty) = ty else {
        return value.clone();
    };
    match (ty["code"].as_str(), value) {
        (Some("INT64"), Value::String(s)) => s
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| value.clone()),
        (Some("ARRAY"), Value::Array(items)) => {
            let element = ty.get("arrayElementType");
            Value::Array(items.iter().map(|v| decode_value(v, element)).collect())
        }
        _ => value.clone(),
    }
}

/// Map a non-success response body to a [`StoreError`].
pub fn parse_error(http_status: u16, body: &str) -> StoreError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let error = parsed.as_ref().and_then(|v| v.get("error"));

    let kind = error
        .and_then(|e| e["status"].as_str())
        .map(StoreErrorKind::from_status)
        .unwrap_or_else(|| StoreErrorKind::from_http(http_status));
    let message = error
        .and_then(|e| e["message"].as_str())
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {http_status}"));

    StoreError::new(kind, message)
}

fn transport(e: reqwest::Error) -> StoreError {
    let kind = if e.is_timeout() || e.is_connect() {
        StoreErrorKind::Unavailable
    } else {
        StoreErrorKind::Transport
    };
    StoreError::new(kind, e.to_string())
}

fn decode(e: serde_json::Error) -> StoreError {
    StoreError::new(StoreErrorKind::Decode, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_rows_by_column_type() {
        let body = json!({
            "metadata": { "rowType": { "fields": [
                { "name": "photo_id", "type": { "code": "STRING" } },
                { "name": "frequency", "type": { "code": "INT64" } },
                { "name": "counts", "type": { "code": "ARRAY", "arrayElementType": { "code": "INT64" } } }
            ] } },
            "rows": [
                ["ph01", "12", ["1", "2"]],
                ["ph02", null, []]
            ]
        });

        let result = decode_result_set(&body).unwrap();
        assert_eq!(
            result.fields,
            Some(vec!["photo_id".to_string(), "frequency".to_string(), "counts".to_string()])
        );
        assert_eq!(result.rows[0], vec![json!("ph01"), json!(12), json!([1, 2])]);
        assert_eq!(result.rows[1][1], Value::Null);
    }

    #[test]
    fn missing_metadata_yields_no_fields() {
        let result = decode_result_set(&json!({ "rows": [["a"]] })).unwrap();
        assert!(result.fields.is_none());
        assert_eq!(result.rows.len(), 1);

        let result = decode_result_set(&json!({})).unwrap();
        assert!(result.rows.is_empty());
    }

    #[test]
    fn malformed_rows_fail_to_decode() {
        let err = decode_result_set(&json!({ "rows": "nope" })).unwrap_err();
        assert_eq!(err.kind, StoreErrorKind::Decode);
        let err = decode_result_set(&json!({ "rows": [{"a": 1}] })).unwrap_err();
        assert_eq!(err.kind, StoreErrorKind::Decode);
    }

    #[test]
    fn parses_google_error_bodies() {
        let body = r#"{"error":{"code":403,"message":"Caller lacks permission","status":"PERMISSION_DENIED"}}"#;
        let err = parse_error(403, body);
        assert_eq!(err.kind, StoreErrorKind::PermissionDenied);
        assert_eq!(err.message, "Caller lacks permission");

        let err = parse_error(503, "<html>bad gateway</html>");
        assert_eq!(err.kind, StoreErrorKind::Unavailable);
        assert_eq!(err.message, "HTTP 503");
    }
}
