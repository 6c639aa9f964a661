//! Shared notepad session lifecycle.
//!
//! # Architecture
//!
//! Session creation is a three-phase protocol with no transaction across
//! the pad host and the shared store:
//! 1. Select the least-loaded live host
//! 2. Create the pad and its read-only alias on that host
//! 3. Reserve the room in the host's active set, then mirror the session
//!    into room metadata
//!
//! A failure in phases 1-2 aborts with nothing counted. A crash between
//! phases 2 and 3 leaves an orphaned pad with no counted load, which only
//! skews balancing. The metadata mirror is best-effort: the pad's existence
//! is authoritative.
//!
//! Cleanup always releases the room from the host's set, even when the
//! remote delete fails, so load accounting never leaks.
//!
//! Callers serialize lifecycle operations per room; there is no lock here.

use crate::errors::NotepadError;
use crate::models::{SessionDescriptor, SharedNotePadFeatures};
use crate::observability::metrics;
use crate::repositories::{ActiveSessionCounter, RoomMetadataStore};
use crate::services::host_registry::HostRegistry;
use crate::services::host_selection::HostSelector;
use crate::services::pad_client::PadClientTrait;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Orchestrates session creation, cleanup and status changes.
#[derive(Clone)]
pub struct SessionCoordinator {
    selector: HostSelector,
    registry: HostRegistry,
    pad_client: Arc<dyn PadClientTrait>,
    counter: Arc<dyn ActiveSessionCounter>,
    metadata: Arc<dyn RoomMetadataStore>,
}

impl SessionCoordinator {
    pub fn new(
        registry: HostRegistry,
        pad_client: Arc<dyn PadClientTrait>,
        counter: Arc<dyn ActiveSessionCounter>,
        metadata: Arc<dyn RoomMetadataStore>,
    ) -> Self {
        let selector = HostSelector::new(registry.clone(), pad_client.clone(), counter.clone());
        Self {
            selector,
            registry,
            pad_client,
            counter,
            metadata,
        }
    }

    /// Create a shared notepad session for a room.
    ///
    /// # Errors
    ///
    /// - `NotepadError::NoHostsConfigured` / `NoLiveHost` - Selection failed
    /// - `NotepadError::RemoteRejected` / `RemoteUnreachable` / `RemoteProtocol`
    ///   - Pad or alias creation failed
    /// - `NotepadError::Store` - The reservation could not be recorded
    ///
    /// Metadata failures are logged and do not fail the operation.
    #[instrument(skip_all, fields(room_id = %room_id))]
    pub async fn create_session(&self, room_id: &str) -> Result<SessionDescriptor, NotepadError> {
        let result = self.create(room_id).await;
        record_outcome("create", &result);
        result
    }

    async fn create(&self, room_id: &str) -> Result<SessionDescriptor, NotepadError> {
        let host = self.selector.select_host().await?;

        let pad_id = Uuid::new_v4();
        let pad_id_str = pad_id.to_string();

        self.pad_client.create_pad(&host, &pad_id_str).await?;
        let read_only_pad_id = self
            .pad_client
            .create_read_only_alias(&host, &pad_id_str)
            .await?;

        // Reserve only once the pad exists on the host
        self.counter.reserve(&host.id, room_id).await?;

        let session = SessionDescriptor {
            pad_id,
            read_only_pad_id,
            host_id: host.id.clone(),
            host_url: host.base_url.clone(),
            is_active: true,
        };

        if let Err(e) = self.mirror_to_metadata(room_id, &session).await {
            warn!(
                target: "np.service.coordinator",
                error = %e,
                room_id = %room_id,
                host_id = %session.host_id,
                "Session created but room metadata was not updated"
            );
        }

        info!(
            target: "np.service.coordinator",
            room_id = %room_id,
            host_id = %session.host_id,
            pad_id = %session.pad_id,
            "Shared notepad session created"
        );

        Ok(session)
    }

    async fn mirror_to_metadata(
        &self,
        room_id: &str,
        session: &SessionDescriptor,
    ) -> Result<(), NotepadError> {
        let mut metadata = self.metadata.load(room_id).await?;
        metadata.notepad_mut().bind_session(session);
        self.metadata.save(room_id, &metadata).await
    }

    /// Retire a session: delete the pad and release the room from the host.
    ///
    /// Safe to repeat. A failed delete is logged; the release still runs.
    ///
    /// # Errors
    ///
    /// - `NotepadError::HostNotFound` - `host_id` is not configured
    /// - `NotepadError::Store` - The release could not be recorded
    #[instrument(skip_all, fields(room_id = %room_id, host_id = %host_id))]
    pub async fn cleanup_session(
        &self,
        room_id: &str,
        host_id: &str,
        pad_id: &str,
    ) -> Result<(), NotepadError> {
        let result = self.cleanup(room_id, host_id, pad_id).await;
        record_outcome("cleanup", &result);
        result
    }

    async fn cleanup(&self, room_id: &str, host_id: &str, pad_id: &str) -> Result<(), NotepadError> {
        let host = self.registry.get(host_id).ok_or_else(|| {
            warn!(
                target: "np.service.coordinator",
                room_id = %room_id,
                host_id = %host_id,
                "No host found for session cleanup"
            );
            NotepadError::HostNotFound(host_id.to_string())
        })?;

        if let Err(e) = self.pad_client.delete_pad(host, pad_id).await {
            warn!(
                target: "np.service.coordinator",
                error = %e,
                room_id = %room_id,
                host_id = %host_id,
                pad_id = %pad_id,
                "Failed to delete pad, releasing session anyway"
            );
        }

        self.counter.release(host_id, room_id).await?;

        info!(
            target: "np.service.coordinator",
            room_id = %room_id,
            host_id = %host_id,
            "Shared notepad session cleaned up"
        );

        Ok(())
    }

    /// Clean up whatever session the ended room's metadata records.
    ///
    /// Only the shared notepad block is read. No-op when the metadata is not
    /// JSON, the feature was never allowed, or no session was ever bound.
    #[instrument(skip_all, fields(room_id = %room_id))]
    pub async fn cleanup_after_room_end(
        &self,
        room_id: &str,
        metadata: &str,
    ) -> Result<(), NotepadError> {
        let block = match SharedNotePadFeatures::from_room_metadata_json(metadata) {
            Ok(block) => block,
            Err(e) => {
                warn!(
                    target: "np.service.coordinator",
                    error = %e,
                    room_id = %room_id,
                    "Ignoring undecodable metadata of ended room"
                );
                return Ok(());
            }
        };

        if !block.allowed {
            debug!(
                target: "np.service.coordinator",
                room_id = %room_id,
                "Shared notepad not allowed for room, nothing to clean"
            );
            return Ok(());
        }
        if block.host_id.is_empty() || block.pad_id.is_empty() {
            warn!(
                target: "np.service.coordinator",
                room_id = %room_id,
                state = ?block.state(),
                "No session recorded for ended room"
            );
            return Ok(());
        }

        let result = self.cleanup(room_id, &block.host_id, &block.pad_id).await;
        record_outcome("room_ended", &result);
        if let Err(e) = &result {
            warn!(
                target: "np.service.coordinator",
                error = %e,
                room_id = %room_id,
                "Cleanup after room end failed"
            );
        }
        result
    }

    /// Flip the recorded `is_active` flag without touching the pad or the
    /// counter.
    ///
    /// # Errors
    ///
    /// Returns the metadata load or save error.
    #[instrument(skip_all, fields(room_id = %room_id, is_active))]
    pub async fn set_session_active(&self, room_id: &str, is_active: bool) -> Result<(), NotepadError> {
        let result = self.set_active(room_id, is_active).await;
        record_outcome("set_active", &result);
        result
    }

    async fn set_active(&self, room_id: &str, is_active: bool) -> Result<(), NotepadError> {
        let mut metadata = self.metadata.load(room_id).await?;
        metadata.notepad_mut().is_active = is_active;
        self.metadata.save(room_id, &metadata).await?;

        debug!(
            target: "np.service.coordinator",
            room_id = %room_id,
            is_active,
            "Shared notepad status changed"
        );

        Ok(())
    }
}

fn record_outcome<T>(operation: &str, result: &Result<T, NotepadError>) {
    let status = match result {
        Ok(_) => "success",
        Err(e) => e.error_type(),
    };
    metrics::record_session_operation(operation, status);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::{PadHost, RoomMetadata, SessionState};
    use crate::repositories::active_sessions::mock::MockSessionCounter;
    use crate::repositories::room_metadata::mock::InMemoryRoomMetadataStore;
    use crate::services::pad_client::mock::{MockPadClient, PadCall};
    use secrecy::SecretString;

    fn host(id: &str) -> PadHost {
        PadHost {
            id: id.to_string(),
            base_url: format!("http://{id}:9001"),
            api_key: SecretString::from("key"),
        }
    }

    fn allowed_room() -> RoomMetadata {
        RoomMetadata::from_json(
            r#"{"room_title":"standup","features":{"shared_note_pad_features":{"allowed_shared_note_pad":true}}}"#,
        )
        .unwrap()
    }

    struct Harness {
        coordinator: SessionCoordinator,
        pad_client: Arc<MockPadClient>,
        counter: Arc<MockSessionCounter>,
        metadata: Arc<InMemoryRoomMetadataStore>,
    }

    impl Harness {
        fn new(
            hosts: &[&str],
            pad_client: MockPadClient,
            counter: MockSessionCounter,
            metadata: InMemoryRoomMetadataStore,
        ) -> Self {
            let registry = HostRegistry::new(hosts.iter().map(|id| host(id)).collect());
            let pad_client = Arc::new(pad_client);
            let counter = Arc::new(counter);
            let metadata = Arc::new(metadata);
            let coordinator = SessionCoordinator::new(
                registry,
                pad_client.clone(),
                counter.clone(),
                metadata.clone(),
            );
            Self {
                coordinator,
                pad_client,
                counter,
                metadata,
            }
        }

        async fn with_room(hosts: &[&str], pad_client: MockPadClient) -> Self {
            let metadata = InMemoryRoomMetadataStore::new()
                .with_room("room-1", allowed_room())
                .await;
            Self::new(hosts, pad_client, MockSessionCounter::new(), metadata)
        }
    }

    #[tokio::test]
    async fn test_create_session_binds_host_and_metadata() {
        let h = Harness::with_room(&["pad-a"], MockPadClient::new()).await;

        let session = h.coordinator.create_session("room-1").await.unwrap();

        assert_eq!(session.host_id, "pad-a");
        assert_eq!(session.host_url, "http://pad-a:9001");
        assert_eq!(session.read_only_pad_id, format!("r.{}", session.pad_id));
        assert!(session.is_active);
        assert!(h.counter.members("pad-a").await.contains("room-1"));

        let stored = h.metadata.get("room-1").await.unwrap();
        let block = stored.notepad();
        assert!(block.allowed);
        assert_eq!(block.state(), SessionState::Active);
        assert_eq!(block.host_id, "pad-a");
        assert_eq!(block.pad_id, session.pad_id.to_string());
        assert_eq!(block.read_only_pad_id, session.read_only_pad_id);
        assert_eq!(stored.extra.get("room_title").unwrap(), "standup");
    }

    #[tokio::test]
    async fn test_create_session_uses_fresh_pad_ids() {
        let h = Harness::with_room(&["pad-a"], MockPadClient::new()).await;

        let first = h.coordinator.create_session("room-1").await.unwrap();
        let second = h.coordinator.create_session("room-2").await.unwrap();

        assert_ne!(first.pad_id, second.pad_id);
    }

    #[tokio::test]
    async fn test_create_then_cleanup_restores_counter() {
        let counter = MockSessionCounter::new().with_load("pad-a", 2).await;
        let h = Harness::new(
            &["pad-a"],
            MockPadClient::new(),
            counter,
            InMemoryRoomMetadataStore::new(),
        );
        let before = h.counter.members("pad-a").await;

        let session = h.coordinator.create_session("room-1").await.unwrap();
        assert_eq!(h.counter.count("pad-a").await.unwrap(), 3);

        h.coordinator
            .cleanup_session("room-1", &session.host_id, &session.pad_id.to_string())
            .await
            .unwrap();

        assert_eq!(h.counter.members("pad-a").await, before);
    }

    #[tokio::test]
    async fn test_rejected_create_pad_reserves_nothing() {
        let h = Harness::with_room(
            &["pad-a"],
            MockPadClient::new().rejecting_create("padID does already exist"),
        )
        .await;

        let err = h.coordinator.create_session("room-1").await.unwrap_err();

        assert!(err.to_string().contains("padID does already exist"));
        assert_eq!(h.counter.mutation_count(), 0);
        assert_eq!(h.metadata.save_count(), 0);
        assert!(!h
            .pad_client
            .pad_calls()
            .iter()
            .any(|c| matches!(c, PadCall::ReadOnlyAlias { .. })));
    }

    #[tokio::test]
    async fn test_alias_failure_aborts_create() {
        let h = Harness::with_room(&["pad-a"], MockPadClient::new().failing_alias()).await;

        let result = h.coordinator.create_session("room-1").await;

        assert!(matches!(result, Err(NotepadError::RemoteUnreachable(_))));
        assert_eq!(h.counter.mutation_count(), 0);
        assert_eq!(h.metadata.save_count(), 0);
    }

    #[tokio::test]
    async fn test_selection_errors_surface_unchanged() {
        let h = Harness::with_room(&[], MockPadClient::new()).await;
        assert!(matches!(
            h.coordinator.create_session("room-1").await,
            Err(NotepadError::NoHostsConfigured)
        ));

        let h = Harness::with_room(&["pad-a"], MockPadClient::new().with_dead_host("pad-a")).await;
        assert!(matches!(
            h.coordinator.create_session("room-1").await,
            Err(NotepadError::NoLiveHost)
        ));
        assert!(h.pad_client.pad_calls().is_empty());
    }

    #[tokio::test]
    async fn test_reserve_failure_fails_create() {
        let h = Harness::with_room(&["pad-a"], MockPadClient::new()).await;
        h.counter.fail_reserve();

        let result = h.coordinator.create_session("room-1").await;

        assert!(matches!(result, Err(NotepadError::Store(_))));
        assert_eq!(h.metadata.save_count(), 0);
    }

    #[tokio::test]
    async fn test_metadata_failures_do_not_fail_create() {
        // No metadata record at all
        let h = Harness::new(
            &["pad-a"],
            MockPadClient::new(),
            MockSessionCounter::new(),
            InMemoryRoomMetadataStore::new(),
        );
        let session = h.coordinator.create_session("room-1").await.unwrap();
        assert!(h.counter.members("pad-a").await.contains("room-1"));
        assert_eq!(session.host_id, "pad-a");

        // Record present but saves fail
        let h = Harness::with_room(&["pad-a"], MockPadClient::new()).await;
        h.metadata.fail_saves();
        h.coordinator.create_session("room-1").await.unwrap();
        assert!(h.counter.members("pad-a").await.contains("room-1"));
    }

    #[tokio::test]
    async fn test_cleanup_unknown_host() {
        let h = Harness::with_room(&["pad-a"], MockPadClient::new()).await;

        let result = h.coordinator.cleanup_session("room-1", "pad-z", "p1").await;

        assert!(matches!(result, Err(NotepadError::HostNotFound(id)) if id == "pad-z"));
        assert!(h.pad_client.pad_calls().is_empty());
        assert_eq!(h.counter.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_cleanup_releases_even_when_delete_fails() {
        let h = Harness::with_room(&["pad-a"], MockPadClient::new().failing_delete()).await;
        h.counter.reserve("pad-a", "room-1").await.unwrap();

        h.coordinator
            .cleanup_session("room-1", "pad-a", "p1")
            .await
            .unwrap();

        assert!(!h.counter.members("pad-a").await.contains("room-1"));
        assert_eq!(
            h.pad_client.pad_calls(),
            vec![PadCall::DeletePad {
                host_id: "pad-a".to_string(),
                pad_id: "p1".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_cleanup_is_idempotent() {
        let h = Harness::with_room(&["pad-a"], MockPadClient::new()).await;
        h.counter.reserve("pad-a", "room-1").await.unwrap();
        h.counter.reserve("pad-a", "room-2").await.unwrap();

        h.coordinator.cleanup_session("room-1", "pad-a", "p1").await.unwrap();
        let once = h.counter.members("pad-a").await;
        h.coordinator.cleanup_session("room-1", "pad-a", "p1").await.unwrap();
        let twice = h.counter.members("pad-a").await;

        assert_eq!(once, twice);
        assert_eq!(twice.len(), 1);
    }

    #[tokio::test]
    async fn test_room_end_not_allowed_is_noop() {
        let h = Harness::with_room(&["pad-a"], MockPadClient::new()).await;
        let raw = r#"{"features":{"shared_note_pad_features":{
            "allowed_shared_note_pad": false,
            "node_id": "pad-a",
            "note_pad_id": "p1"
        }}}"#;

        h.coordinator.cleanup_after_room_end("room-1", raw).await.unwrap();

        assert!(h.pad_client.calls().is_empty());
        assert_eq!(h.counter.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_room_end_without_session_is_noop() {
        let h = Harness::with_room(&["pad-a"], MockPadClient::new()).await;
        let raw = r#"{"features":{"shared_note_pad_features":{"allowed_shared_note_pad": true}}}"#;

        h.coordinator.cleanup_after_room_end("room-1", raw).await.unwrap();

        assert!(h.pad_client.calls().is_empty());
        assert_eq!(h.counter.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_room_end_with_undecodable_metadata_is_noop() {
        let h = Harness::with_room(&["pad-a"], MockPadClient::new()).await;

        h.coordinator
            .cleanup_after_room_end("room-1", "not json")
            .await
            .unwrap();

        assert!(h.pad_client.calls().is_empty());
        assert_eq!(h.counter.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_room_end_cleans_recorded_session() {
        let h = Harness::with_room(&["pad-a", "pad-b"], MockPadClient::new()).await;
        h.counter.reserve("pad-b", "room-1").await.unwrap();
        let raw = r#"{"features":{"shared_note_pad_features":{
            "allowed_shared_note_pad": true,
            "is_active": true,
            "node_id": "pad-b",
            "host": "http://pad-b:9001",
            "note_pad_id": "p1",
            "read_only_pad_id": "r.p1"
        }}}"#;

        h.coordinator.cleanup_after_room_end("room-1", raw).await.unwrap();

        assert!(!h.counter.members("pad-b").await.contains("room-1"));
        assert_eq!(
            h.pad_client.pad_calls(),
            vec![PadCall::DeletePad {
                host_id: "pad-b".to_string(),
                pad_id: "p1".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_room_end_with_null_field_still_cleans() {
        let h = Harness::with_room(&["pad-a"], MockPadClient::new()).await;
        h.counter.reserve("pad-a", "room-1").await.unwrap();
        let raw = r#"{"features":{"shared_note_pad_features":{
            "allowed_shared_note_pad": true,
            "is_active": true,
            "node_id": "pad-a",
            "host": null,
            "note_pad_id": "p1",
            "read_only_pad_id": null
        }}}"#;

        h.coordinator.cleanup_after_room_end("room-1", raw).await.unwrap();

        assert!(!h.counter.members("pad-a").await.contains("room-1"));
        assert_eq!(
            h.pad_client.pad_calls(),
            vec![PadCall::DeletePad {
                host_id: "pad-a".to_string(),
                pad_id: "p1".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_room_end_ignores_malformed_fields_outside_block() {
        let h = Harness::with_room(&["pad-a"], MockPadClient::new()).await;
        h.counter.reserve("pad-a", "room-1").await.unwrap();
        let raw = r#"{
            "room_title": 42,
            "features": {
                "allow_webcams": {"bad": []},
                "shared_note_pad_features": {
                    "allowed_shared_note_pad": true,
                    "node_id": "pad-a",
                    "note_pad_id": "p1"
                }
            }
        }"#;

        h.coordinator.cleanup_after_room_end("room-1", raw).await.unwrap();

        assert!(!h.counter.members("pad-a").await.contains("room-1"));
        assert_eq!(h.pad_client.pad_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_room_end_with_unknown_host_returns_error() {
        let h = Harness::with_room(&["pad-a"], MockPadClient::new()).await;
        let raw = r#"{"features":{"shared_note_pad_features":{
            "allowed_shared_note_pad": true,
            "node_id": "pad-gone",
            "note_pad_id": "p1"
        }}}"#;

        let result = h.coordinator.cleanup_after_room_end("room-1", raw).await;
        assert!(matches!(result, Err(NotepadError::HostNotFound(_))));
    }

    #[tokio::test]
    async fn test_set_session_active_toggles_flag_only() {
        let h = Harness::with_room(&["pad-a"], MockPadClient::new()).await;
        let session = h.coordinator.create_session("room-1").await.unwrap();
        let calls_before = h.pad_client.calls().len();
        let mutations_before = h.counter.mutation_count();

        h.coordinator.set_session_active("room-1", false).await.unwrap();

        let stored = h.metadata.get("room-1").await.unwrap();
        assert_eq!(stored.notepad().state(), SessionState::Inactive);
        assert_eq!(stored.notepad().pad_id, session.pad_id.to_string());
        assert!(stored.notepad().allowed);

        h.coordinator.set_session_active("room-1", true).await.unwrap();
        let stored = h.metadata.get("room-1").await.unwrap();
        assert_eq!(stored.notepad().state(), SessionState::Active);

        assert_eq!(h.pad_client.calls().len(), calls_before);
        assert_eq!(h.counter.mutation_count(), mutations_before);
    }

    #[tokio::test]
    async fn test_set_session_active_surfaces_metadata_errors() {
        let h = Harness::new(
            &["pad-a"],
            MockPadClient::new(),
            MockSessionCounter::new(),
            InMemoryRoomMetadataStore::new(),
        );
        let result = h.coordinator.set_session_active("room-404", true).await;
        assert!(matches!(result, Err(NotepadError::Metadata(_))));

        let h = Harness::with_room(&["pad-a"], MockPadClient::new()).await;
        h.metadata.fail_saves();
        let result = h.coordinator.set_session_active("room-1", true).await;
        assert!(matches!(result, Err(NotepadError::Metadata(_))));
    }
}
