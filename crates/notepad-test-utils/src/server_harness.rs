//! Test server harness for E2E testing.
//!
//! Runs the real router on a random port, wired to in-memory store doubles
//! and a real `RemotePadClient` pointed at [`MockPadHost`](crate::MockPadHost)s.

use metrics_exporter_prometheus::PrometheusBuilder;
use notepad_service::models::PadHost;
use notepad_service::repositories::active_sessions::mock::MockSessionCounter;
use notepad_service::repositories::room_metadata::mock::InMemoryRoomMetadataStore;
use notepad_service::routes::{self, AppState};
use notepad_service::services::{HostRegistry, RemotePadClient, SessionCoordinator};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::mock_pad_host::MOCK_API_VERSION;

/// Test harness for spawning the notepad service.
pub struct TestNotepadServer {
    addr: SocketAddr,
    counter: Arc<MockSessionCounter>,
    metadata: Arc<InMemoryRoomMetadataStore>,
    _handle: JoinHandle<()>,
}

impl TestNotepadServer {
    /// Spawn a server serving `hosts` with empty stores.
    pub async fn spawn(hosts: Vec<PadHost>) -> Result<Self, anyhow::Error> {
        Self::spawn_with(
            hosts,
            MockSessionCounter::new(),
            InMemoryRoomMetadataStore::new(),
        )
        .await
    }

    /// Spawn a server with pre-seeded stores.
    pub async fn spawn_with(
        hosts: Vec<PadHost>,
        counter: MockSessionCounter,
        metadata: InMemoryRoomMetadataStore,
    ) -> Result<Self, anyhow::Error> {
        let counter = Arc::new(counter);
        let metadata = Arc::new(metadata);

        let pad_client = RemotePadClient::new(MOCK_API_VERSION.to_string(), Duration::from_secs(2))
            .map_err(|e| anyhow::anyhow!("Failed to build pad client: {}", e))?;

        let coordinator = SessionCoordinator::new(
            HostRegistry::new(hosts),
            Arc::new(pad_client),
            counter.clone(),
            metadata.clone(),
        );

        let state = Arc::new(AppState {
            coordinator: Arc::new(coordinator),
            store_health: counter.clone(),
        });

        // A recorder that is never installed globally
        let metrics_handle = PrometheusBuilder::new().build_recorder().handle();
        let app = routes::build_routes(state, metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            counter,
            metadata,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Session counter backing the server.
    pub fn counter(&self) -> &MockSessionCounter {
        &self.counter
    }

    /// Metadata store backing the server.
    pub fn metadata(&self) -> &InMemoryRoomMetadataStore {
        &self.metadata
    }
}

impl Drop for TestNotepadServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}
