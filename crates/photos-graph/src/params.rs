//! Parameter binding for `@param` placeholders.
//!
//! Values are stored in the store's wire encoding: `INT64` travels as a
//! decimal string and `TIMESTAMP` as RFC 3339 text.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

use crate::error::{GraphError, Result};

/// Parameter types understood by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Int64,
    Timestamp,
    /// Only constructed by typed queries in this crate. There is no tag for
    /// it, so generated queries cannot request it.
    StringArray,
}

impl ParamType {
    /// Parse a declared type tag. Only `STRING`, `INT64` and `TIMESTAMP`
    /// are accepted; anything else fails closed.
    pub fn from_tag(name: &str, tag: &str) -> Result<Self> {
        match tag {
            "STRING" => Ok(Self::String),
            "INT64" => Ok(Self::Int64),
            "TIMESTAMP" => Ok(Self::Timestamp),
            _ => Err(GraphError::UnknownParamType {
                name: name.to_string(),
                tag: tag.to_string(),
            }),
        }
    }

    /// The store's JSON type descriptor.
    pub fn descriptor(&self) -> Value {
        match self {
            Self::String => json!({ "code": "STRING" }),
            Self::Int64 => json!({ "code": "INT64" }),
            Self::Timestamp => json!({ "code": "TIMESTAMP" }),
            Self::StringArray => json!({
                "code": "ARRAY",
                "arrayElementType": { "code": "STRING" }
            }),
        }
    }
}

/// Parameter values plus their declared types, ready for execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundParameters {
    values: Map<String, Value>,
    types: BTreeMap<String, ParamType>,
}

impl BoundParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_string(mut self, name: &str, value: impl Into<String>) -> Self {
        self.values.insert(name.to_string(), Value::String(value.into()));
        self.types.insert(name.to_string(), ParamType::String);
        self
    }

    pub fn with_int64(mut self, name: &str, value: i64) -> Self {
        self.values.insert(name.to_string(), Value::String(value.to_string()));
        self.types.insert(name.to_string(), ParamType::Int64);
        self
    }

    pub fn with_timestamp(mut self, name: &str, value: DateTime<Utc>) -> Self {
        self.values
            .insert(name.to_string(), Value::String(value.to_rfc3339()));
        self.types.insert(name.to_string(), ParamType::Timestamp);
        self
    }

    pub fn with_string_array<I, S>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let array = values
            .into_iter()
            .map(|v| Value::String(v.into()))
            .collect();
        self.values.insert(name.to_string(), Value::Array(array));
        self.types.insert(name.to_string(), ParamType::StringArray);
        self
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn types(&self) -> &BTreeMap<String, ParamType> {
        &self.types
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `paramTypes` object for the request body.
    pub fn type_descriptors(&self) -> Map<String, Value> {
        self.types
            .iter()
            .map(|(name, ty)| (name.clone(), ty.descriptor()))
            .collect()
    }
}

/// Bind a flat name→value map against a name→type-tag map.
///
/// Either map may be absent. An absent or empty type map yields an empty
/// type map rather than one filled with placeholders. Values must be
/// scalars. A declared type for a parameter that has no value is rejected.
pub fn bind(
    params: Option<&Map<String, Value>>,
    declared_types: Option<&Map<String, Value>>,
) -> Result<BoundParameters> {
    let mut types = BTreeMap::new();
    if let Some(declared) = declared_types {
        for (name, tag) in declared {
            let tag = tag.as_str().ok_or_else(|| GraphError::Parameter {
                name: name.clone(),
                message: "type tag must be a string".to_string(),
            })?;
            types.insert(name.clone(), ParamType::from_tag(name, tag)?);
        }
    }

    let mut values = Map::new();
    if let Some(params) = params {
        for (name, value) in params {
            let encoded = match types.get(name) {
                Some(ty) => encode(name, value, *ty)?,
                None => encode_untyped(name, value)?,
            };
            values.insert(name.clone(), encoded);
        }
    }

    if let Some(name) = types.keys().find(|name| !values.contains_key(*name)) {
        return Err(GraphError::Parameter {
            name: name.clone(),
            message: "type declared for a parameter with no value".to_string(),
        });
    }

    Ok(BoundParameters { values, types })
}

fn encode(name: &str, value: &Value, ty: ParamType) -> Result<Value> {
    let malformed = |message: &str| GraphError::Parameter {
        name: name.to_string(),
        message: message.to_string(),
    };

    match (ty, value) {
        (_, Value::Null) => Ok(Value::Null),
        (ParamType::String, Value::String(_)) => Ok(value.clone()),
        (ParamType::String, Value::Number(n)) => Ok(Value::String(n.to_string())),
        (ParamType::String, Value::Bool(b)) => Ok(Value::String(b.to_string())),
        (ParamType::Int64, Value::Number(n)) => n
            .as_i64()
            .map(|v| Value::String(v.to_string()))
            .ok_or_else(|| malformed("expected an integer")),
        (ParamType::Int64, Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(|v| Value::String(v.to_string()))
            .map_err(|_| malformed("expected an integer")),
        (ParamType::Timestamp, Value::String(s)) => DateTime::parse_from_rfc3339(s.trim())
            .map(|ts| Value::String(ts.with_timezone(&Utc).to_rfc3339()))
            .map_err(|_| malformed("expected an RFC 3339 timestamp")),
        (ParamType::StringArray, Value::Array(items)) if items.iter().all(Value::is_string) => {
            Ok(value.clone())
        }
        _ => Err(malformed("value does not match declared type")),
    }
}

fn encode_untyped(name: &str, value: &Value) -> Result<Value> {
    match value {
        Value::Array(_) | Value::Object(_) => Err(GraphError::Parameter {
            name: name.to_string(),
            message: "parameter values must be scalars".to_string(),
        }),
        _ => Ok(value.clone()),
    }
}
