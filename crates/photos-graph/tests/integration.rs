//! Integration tests for photos-graph against a live Spanner database.
//!
//! Point `PHOTOS__SPANNER__ENDPOINT` at an emulator (for example
//! `http://localhost:9020`) and set `PHOTOS__SPANNER__PROJECT`.
//! Run with: cargo test --package photos-graph --test integration -- --ignored
//!
//! Skipped automatically if the database is not reachable.

use photos_core::{AppConfig, NewMemory, PersonId, RelationshipType};
use photos_graph::{BoundParameters, GraphClient, GraphError, PhotoSearch};

async fn connect_or_skip() -> Option<GraphClient> {
    let config = match AppConfig::load("photos") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Skipping integration test (bad configuration): {e}");
            return None;
        }
    };
    match GraphClient::connect(&config.spanner).await {
        Ok(client) => Some(client),
        Err(e) => {
            eprintln!("Skipping integration test (Spanner not available): {e}");
            None
        }
    }
}

async fn seeded() -> Option<GraphClient> {
    let client = connect_or_skip().await?;
    client.apply_schema().await.unwrap();
    client.seed().await.unwrap();
    Some(client)
}

#[tokio::test]
#[ignore = "requires live Spanner: run with --ignored"]
async fn test_photos_by_owner() {
    let Some(client) = seeded().await else {
        return;
    };

    let fetched = client.photos_by_owner(&PersonId::new("p01")).await.unwrap();
    assert!(fetched.warnings.is_empty());
    assert_eq!(fetched.items.len(), 6);
    // Newest first.
    assert_eq!(fetched.items[0].photo_id.as_str(), "ph03");
}

#[tokio::test]
#[ignore = "requires live Spanner: run with --ignored"]
async fn test_relationship_names_follow_both_directions() {
    let Some(client) = seeded().await else {
        return;
    };

    let family = client
        .relationship_names("Priya", RelationshipType::Family)
        .await
        .unwrap();
    assert!(family.items.contains(&"Rohan".to_string()));
    assert!(family.items.contains(&"Vikram".to_string()));
}

#[tokio::test]
#[ignore = "requires live Spanner: run with --ignored"]
async fn test_photo_search_requires_co_occurrence() {
    let Some(client) = seeded().await else {
        return;
    };

    let search = PhotoSearch {
        person_names: vec!["priya".to_string(), "vikram".to_string(), "maya".to_string()],
        location: None,
        min_matches: 3,
    };
    let fetched = client.photos_with_people(&search).await.unwrap();
    let ids: Vec<&str> = fetched.items.iter().map(|p| p.photo_id.as_str()).collect();
    assert_eq!(ids, ["ph02"]);
}

#[tokio::test]
#[ignore = "requires live Spanner: run with --ignored"]
async fn test_insert_and_list_memory() {
    let Some(client) = seeded().await else {
        return;
    };

    let memory = client
        .insert_memory(NewMemory {
            user_id: PersonId::new("p01"),
            memory_title: "Trek".to_string(),
            memory_description: "Snow at the pass".to_string(),
            memory_media: vec!["gs://my-photos-bucket/ph05.jpg".to_string()],
        })
        .await
        .unwrap();

    let memories = client.memories_by_user(&PersonId::new("p01")).await.unwrap();
    let stored = memories
        .items
        .iter()
        .find(|m| m.memory_id == memory.memory_id)
        .unwrap();
    assert!(stored.creation_timestamp.is_some());
    assert_eq!(stored.memory_media, memory.memory_media);
}

#[tokio::test]
#[ignore = "requires live Spanner: run with --ignored"]
async fn test_mutating_statement_is_rejected() {
    let Some(client) = connect_or_skip().await else {
        return;
    };

    let err = client
        .execute("DELETE FROM Person WHERE true", &BoundParameters::new(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::QueryRejected { .. }));
}
