//! Memories: list the user's memories, create new ones.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use photos_blob::GcsUri;
use photos_core::{Memory, NewMemory, PersonId};

use crate::api::AppState;
use crate::error::ApiError;

/// A memory whose media references are replaced by signed URLs.
///
/// Media that cannot be signed are left out.
#[derive(Debug, Serialize)]
pub struct MemoryView {
    #[serde(flatten)]
    pub memory: Memory,
    pub media_urls: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct MemoriesResponse {
    pub memories: Vec<MemoryView>,
    pub warnings: Vec<String>,
}

/// Body of `POST /api/memories`. Every field is required.
#[derive(Debug, Default, Deserialize)]
pub struct CreateMemoryRequest {
    pub user_id: Option<String>,
    pub memory_title: Option<String>,
    pub memory_description: Option<String>,
    pub memory_media: Option<Vec<String>>,
}

impl CreateMemoryRequest {
    pub fn validate(self) -> Result<NewMemory, ApiError> {
        let user_id = required("user_id", self.user_id)?;
        let memory_title = required("memory_title", self.memory_title)?;
        let memory_description = required("memory_description", self.memory_description)?;

        let memory_media = self.memory_media.unwrap_or_default();
        if memory_media.is_empty() {
            return Err(ApiError::BadRequest("memory_media is required".to_string()));
        }
        if let Some(bad) = memory_media.iter().find(|m| GcsUri::parse(m).is_none()) {
            return Err(ApiError::BadRequest(format!(
                "memory_media entries must be gs://bucket/key references, got {bad:?}"
            )));
        }

        Ok(NewMemory {
            user_id: PersonId::new(user_id),
            memory_title,
            memory_description,
            memory_media,
        })
    }
}

fn required(field: &str, value: Option<String>) -> Result<String, ApiError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError::BadRequest(format!("{field} is required"))),
    }
}

/// GET /api/memories
pub async fn list_memories(
    State(state): State<AppState>,
) -> Result<Json<MemoriesResponse>, ApiError> {
    let fetched = state.graph.memories_by_user(&state.person_id()).await?;
    let memories = fetched
        .items
        .into_iter()
        .map(|memory| {
            let media_urls = state
                .blob
                .sign_all(memory.memory_media.as_slice())
                .into_iter()
                .flatten()
                .collect();
            MemoryView { memory, media_urls }
        })
        .collect();

    Ok(Json(MemoriesResponse {
        memories,
        warnings: fetched.warnings,
    }))
}

/// POST /api/memories
pub async fn create_memory(
    State(state): State<AppState>,
    body: Result<Json<CreateMemoryRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Memory>), ApiError> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let new = request.validate()?;
    let memory = state.graph.insert_memory(new).await?;
    Ok((StatusCode::CREATED, Json(memory)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateMemoryRequest {
        CreateMemoryRequest {
            user_id: Some("p01".to_string()),
            memory_title: Some("Goa trip".to_string()),
            memory_description: Some("Beach day with the cousins".to_string()),
            memory_media: Some(vec!["gs://my-photos-bucket/ph06.jpg".to_string()]),
        }
    }

    #[test]
    fn test_valid_request() {
        let new = request().validate().unwrap();
        assert_eq!(new.user_id.as_str(), "p01");
        assert_eq!(new.memory_media.len(), 1);
    }

    #[test]
    fn test_missing_fields() {
        let cases = [
            CreateMemoryRequest {
                user_id: None,
                ..request()
            },
            CreateMemoryRequest {
                memory_title: Some("  ".to_string()),
                ..request()
            },
            CreateMemoryRequest {
                memory_description: None,
                ..request()
            },
            CreateMemoryRequest {
                memory_media: Some(Vec::new()),
                ..request()
            },
        ];
        for case in cases {
            assert!(matches!(case.validate(), Err(ApiError::BadRequest(_))));
        }
    }

    #[test]
    fn test_media_must_be_storage_references() {
        let bad = CreateMemoryRequest {
            memory_media: Some(vec!["https://example.com/a.jpg".to_string()]),
            ..request()
        };
        let err = bad.validate().unwrap_err();
        assert!(err.to_string().contains("https://example.com/a.jpg"));
    }
}
