//! Language model boundary.
//!
//! The runner only sees [`LanguageModel`]; [`GeminiModel`] implements it
//! over the `generateContent` REST API. Message types follow that API's
//! JSON shape so they serialize without translation.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use photos_core::config::AgentConfig;

use crate::error::{AgentError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    pub name: String,
    pub response: Value,
}

/// One part of a message: text, a call the model makes, or a tool result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_response: Option<FunctionResponse>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn call(call: FunctionCall) -> Self {
        Self {
            function_call: Some(call),
            ..Default::default()
        }
    }

    pub fn response(name: impl Into<String>, response: Value) -> Self {
        Self {
            function_response: Some(FunctionResponse {
                name: name.into(),
                response,
            }),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub role: Role,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Role::User,
            parts,
        }
    }

    pub fn model(parts: Vec<Part>) -> Self {
        Self {
            role: Role::Model,
            parts,
        }
    }
}

/// A tool the model may call, described with a JSON schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// What the model produced in one turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelTurn {
    pub text: Option<String>,
    pub calls: Vec<FunctionCall>,
}

impl ModelTurn {
    pub fn from_parts(parts: &[Part]) -> Self {
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        Self {
            text: Some(text).filter(|t| !t.trim().is_empty()),
            calls: parts.iter().filter_map(|p| p.function_call.clone()).collect(),
        }
    }

    /// The turn as history content, so it can be sent back next turn.
    pub fn to_content(&self) -> Content {
        let mut parts: Vec<Part> = self.text.iter().map(Part::text).collect();
        parts.extend(self.calls.iter().cloned().map(Part::call));
        Content::model(parts)
    }
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(
        &self,
        system_instruction: &str,
        history: &[Content],
        tools: &[FunctionDeclaration],
    ) -> Result<ModelTurn>;

    fn name(&self) -> &str;
}

/// Gemini over the Generative Language REST API.
pub struct GeminiModel {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl GeminiModel {
    pub fn new(config: &AgentConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(AgentError::Model("agent.api_key must be set".to_string()));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }

    /// Request body for `generateContent`.
    pub fn request_body(
        system_instruction: &str,
        history: &[Content],
        tools: &[FunctionDeclaration],
    ) -> Value {
        let mut body = json!({
            "systemInstruction": { "parts": [{ "text": system_instruction }] },
            "contents": history,
            "generationConfig": { "temperature": 0.0 },
        });
        if !tools.is_empty() {
            body["tools"] = json!([{ "functionDeclarations": tools }]);
        }
        body
    }

    /// Extract the first candidate's turn from a response body.
    pub fn parse_response(body: &Value) -> Result<ModelTurn> {
        let candidate = body
            .pointer("/candidates/0")
            .ok_or_else(|| AgentError::Model(block_reason(body)))?;
        let parts: Vec<Part> = match candidate.pointer("/content/parts") {
            Some(parts) => serde_json::from_value(parts.clone())
                .map_err(|e| AgentError::Model(format!("unreadable response parts: {e}")))?,
            None => Vec::new(),
        };
        let turn = ModelTurn::from_parts(&parts);
        if turn.text.is_none() && turn.calls.is_empty() {
            let reason = candidate["finishReason"].as_str().unwrap_or("unknown");
            return Err(AgentError::Model(format!("empty response (finish reason {reason})")));
        }
        Ok(turn)
    }
}

fn block_reason(body: &Value) -> String {
    match body.pointer("/promptFeedback/blockReason").and_then(Value::as_str) {
        Some(reason) => format!("prompt blocked: {reason}"),
        None => "response has no candidates".to_string(),
    }
}

#[async_trait]
impl LanguageModel for GeminiModel {
    async fn generate(
        &self,
        system_instruction: &str,
        history: &[Content],
        tools: &[FunctionDeclaration],
    ) -> Result<ModelTurn> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint, self.model
        );
        let body = Self::request_body(system_instruction, history, tools);

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let payload: Value = response.json().await?;
        if !status.is_success() {
            let message = payload
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("request failed");
            return Err(AgentError::Model(format!("HTTP {}: {message}", status.as_u16())));
        }

        let turn = Self::parse_response(&payload)?;
        tracing::debug!(
            model = %self.model,
            calls = turn.calls.len(),
            has_text = turn.text.is_some(),
            "Model turn"
        );
        Ok(turn)
    }

    fn name(&self) -> &str {
        &self.model
    }
}
