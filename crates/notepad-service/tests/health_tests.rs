//! Health endpoint integration tests.
//!
//! Tests `/health`, `/ready` and `/metrics` through the `TestNotepadServer`
//! harness.

use notepad_service::repositories::active_sessions::mock::MockSessionCounter;
use notepad_service::repositories::room_metadata::mock::InMemoryRoomMetadataStore;
use notepad_test_utils::TestNotepadServer;

#[tokio::test]
async fn test_health_endpoint_returns_ok() -> Result<(), anyhow::Error> {
    let server = TestNotepadServer::spawn(vec![]).await?;

    let response = reqwest::get(format!("{}/health", server.url())).await?;

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await?, "OK");

    Ok(())
}

#[tokio::test]
async fn test_ready_when_store_answers() -> Result<(), anyhow::Error> {
    let server = TestNotepadServer::spawn(vec![]).await?;

    let response = reqwest::get(format!("{}/ready", server.url())).await?;

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["status"], "ready");
    assert_eq!(body["store"], "healthy");

    Ok(())
}

#[tokio::test]
async fn test_not_ready_when_store_fails() -> Result<(), anyhow::Error> {
    let counter = MockSessionCounter::new();
    counter.fail_count();
    let server =
        TestNotepadServer::spawn_with(vec![], counter, InMemoryRoomMetadataStore::new()).await?;

    let response = reqwest::get(format!("{}/ready", server.url())).await?;

    assert_eq!(response.status(), 503);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["status"], "not_ready");
    // Generic message only
    assert_eq!(body["error"], "Service dependencies unavailable");

    Ok(())
}

#[tokio::test]
async fn test_metrics_endpoint_responds() -> Result<(), anyhow::Error> {
    let server = TestNotepadServer::spawn(vec![]).await?;

    let response = reqwest::get(format!("{}/metrics", server.url())).await?;

    assert_eq!(response.status(), 200);

    Ok(())
}
