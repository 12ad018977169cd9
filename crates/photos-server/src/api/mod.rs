//! Routes and shared state.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use photos_agent::AgentRunner;
use photos_blob::BlobClient;
use photos_core::config::ServerConfig;
use photos_core::{Person, PersonId};
use photos_graph::GraphClient;

use crate::error::ApiError;

pub mod chatbot;
pub mod health;
pub mod memories;
pub mod photos;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub graph: GraphClient,
    pub blob: BlobClient,
    pub agent: Arc<AgentRunner>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn person_id(&self) -> PersonId {
        PersonId::new(self.config.person_id.clone())
    }

    /// The logged-in person.
    pub async fn current_user(&self) -> Result<Person, ApiError> {
        let person_id = self.person_id();
        self.graph
            .person_by_id(&person_id)
            .await?
            .first()
            .ok_or_else(|| ApiError::NotFound(format!("Person {person_id} not found")))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/me", get(photos::me))
        .route("/api/photos", get(photos::list_photos))
        .route(
            "/api/memories",
            get(memories::list_memories).post(memories::create_memory),
        )
        .route("/api/chatbot", get(chatbot::stream_chat).post(chatbot::chat))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
