//! Natural-language photo search.
//!
//! The logged-in user's name comes from the graph, never from the request
//! body, and is handed to the agent as the trusted identity.

use std::convert::Infallible;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};

use photos_agent::GENERIC_FAILURE;
use photos_core::AgentEvent;

use crate::api::AppState;
use crate::error::ApiError;

const MISSING_MESSAGE: &str = "Invalid request: 'message' field is required.";

#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {
    pub message: Option<String>,
}

impl ChatRequest {
    fn message(self) -> Result<String, ApiError> {
        self.message
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .ok_or_else(|| ApiError::BadRequest(MISSING_MESSAGE.to_string()))
    }
}

#[derive(Debug, Serialize)]
pub struct PhotoResult {
    pub photo_location: String,
    pub photo_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response_type: &'static str,
    pub data: Vec<PhotoResult>,
}

/// POST /api/chatbot
pub async fn chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = body.map_err(|_| ApiError::BadRequest(MISSING_MESSAGE.to_string()))?;
    let message = request.message()?;
    let user = state.current_user().await.map_err(agent_failure)?;

    let locations = state
        .agent
        .answer(&user.name, &message)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Photo search failed");
            ApiError::Internal(GENERIC_FAILURE.to_string())
        })?;

    let data = locations
        .into_iter()
        .map(|photo_location| PhotoResult {
            photo_url: state.blob.signed_url(&photo_location),
            photo_location,
        })
        .collect();

    Ok(Json(ChatResponse {
        response_type: "photos",
        data,
    }))
}

/// GET /api/chatbot?message=...
///
/// Streams `{type, data}` events and closes after the terminal one.
pub async fn stream_chat(
    State(state): State<AppState>,
    Query(request): Query<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let message = request.message()?;
    let user = state.current_user().await.map_err(agent_failure)?;

    let events = state.agent.clone().stream(user.name, message);
    let stream = stream::unfold((events, false), |(mut events, done)| async move {
        if done {
            return None;
        }
        let event = events.recv().await?;
        let terminal = event.is_terminal();
        Some((Ok::<_, Infallible>(to_sse(&event)), (events, terminal)))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn to_sse(event: &AgentEvent) -> Event {
    let sse = Event::default().event(event.kind());
    match serde_json::to_string(event) {
        Ok(json) => sse.data(json),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize agent event");
            sse.data(format!(r#"{{"type":"error","data":{{"message":"{GENERIC_FAILURE}"}}}}"#))
        }
    }
}

fn agent_failure(e: ApiError) -> ApiError {
    tracing::error!(error = %e, "Could not resolve the logged in user");
    ApiError::Internal(GENERIC_FAILURE.to_string())
}
