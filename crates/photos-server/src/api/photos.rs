//! The logged-in user's profile and photo library.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use photos_blob::BlobClient;
use photos_core::{PersonId, Photo, PhotoId};

use crate::api::AppState;
use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub person_id: PersonId,
    pub name: String,
    pub photo_location: Option<String>,
    pub photo_url: Option<String>,
}

/// A photo with a time-limited URL for its image.
#[derive(Debug, Serialize)]
pub struct PhotoView {
    #[serde(flatten)]
    pub photo: Photo,
    pub photo_url: Option<String>,
}

impl PhotoView {
    fn signed(photo: Photo, blob: &BlobClient) -> Self {
        let photo_url = photo
            .photo_location
            .as_deref()
            .and_then(|location| blob.signed_url(location));
        Self { photo, photo_url }
    }
}

#[derive(Debug, Serialize)]
pub struct PhotosResponse {
    pub photos: Vec<PhotoView>,
    /// Names of the people appearing in each photo, by photo id.
    pub people_in_photos: BTreeMap<String, Vec<String>>,
    pub warnings: Vec<String>,
}

/// GET /api/me
pub async fn me(State(state): State<AppState>) -> Result<Json<MeResponse>, ApiError> {
    let person = state.current_user().await?;
    let photo_url = person
        .photo_location
        .as_deref()
        .and_then(|location| state.blob.signed_url(location));
    Ok(Json(MeResponse {
        person_id: person.person_id,
        name: person.name,
        photo_location: person.photo_location,
        photo_url,
    }))
}

/// GET /api/photos
pub async fn list_photos(State(state): State<AppState>) -> Result<Json<PhotosResponse>, ApiError> {
    let owned = state.graph.photos_by_owner(&state.person_id()).await?;
    let mut warnings = owned.warnings;

    let photo_ids: Vec<PhotoId> = owned.items.iter().map(|p| p.photo_id.clone()).collect();
    let people = state.graph.people_in_photos(&photo_ids).await?;
    warnings.extend(people.warnings);

    let mut people_in_photos: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for person in people.items {
        people_in_photos
            .entry(person.photo_id.0)
            .or_default()
            .push(person.name);
    }

    let photos = owned
        .items
        .into_iter()
        .map(|photo| PhotoView::signed(photo, &state.blob))
        .collect();

    Ok(Json(PhotosResponse {
        photos,
        people_in_photos,
        warnings,
    }))
}
