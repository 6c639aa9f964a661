//! Room metadata records.
//!
//! The room owns its metadata; this service only loads it, rewrites the
//! shared notepad block, and saves it back. Records are JSON documents stored
//! under `{prefix}{room_id}`.

use crate::errors::NotepadError;
use crate::models::RoomMetadata;
use crate::repositories::with_store_timeout;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{error, instrument, warn};

/// Storage of room metadata records.
#[async_trait::async_trait]
pub trait RoomMetadataStore: Send + Sync {
    async fn load(&self, room_id: &str) -> Result<RoomMetadata, NotepadError>;

    async fn save(&self, room_id: &str, metadata: &RoomMetadata) -> Result<(), NotepadError>;
}

/// Redis-backed metadata store.
#[derive(Clone)]
pub struct RedisRoomMetadataStore {
    connection: MultiplexedConnection,
    key_prefix: String,
    timeout: Duration,
}

impl RedisRoomMetadataStore {
    pub fn new(connection: MultiplexedConnection, key_prefix: String, timeout: Duration) -> Self {
        Self {
            connection,
            key_prefix,
            timeout,
        }
    }

    fn key_for(&self, room_id: &str) -> String {
        format!("{}{room_id}", self.key_prefix)
    }
}

#[async_trait::async_trait]
impl RoomMetadataStore for RedisRoomMetadataStore {
    #[instrument(skip_all, fields(room_id = %room_id))]
    async fn load(&self, room_id: &str) -> Result<RoomMetadata, NotepadError> {
        let mut conn = self.connection.clone();
        let key = self.key_for(room_id);

        let raw: Option<String> = with_store_timeout(self.timeout, "get", conn.get(&key))
            .await
            .map_err(|e| {
                warn!(
                    target: "np.repository.room_metadata",
                    error = %e,
                    room_id = %room_id,
                    "Failed to load room metadata"
                );
                NotepadError::Metadata(e.to_string())
            })?;

        let raw = raw.ok_or_else(|| {
            NotepadError::Metadata(format!("No metadata found for room {room_id}"))
        })?;

        RoomMetadata::from_json(&raw).map_err(|e| {
            error!(
                target: "np.repository.room_metadata",
                error = %e,
                room_id = %room_id,
                "Failed to deserialize room metadata"
            );
            NotepadError::Metadata(format!("Failed to deserialize room metadata: {e}"))
        })
    }

    #[instrument(skip_all, fields(room_id = %room_id))]
    async fn save(&self, room_id: &str, metadata: &RoomMetadata) -> Result<(), NotepadError> {
        let json = metadata.to_json().map_err(|e| {
            error!(
                target: "np.repository.room_metadata",
                error = %e,
                "Failed to serialize room metadata"
            );
            NotepadError::Internal
        })?;

        let mut conn = self.connection.clone();
        let key = self.key_for(room_id);

        let _: () = with_store_timeout(self.timeout, "set", conn.set(&key, json))
            .await
            .map_err(|e| {
                warn!(
                    target: "np.repository.room_metadata",
                    error = %e,
                    room_id = %room_id,
                    "Failed to save room metadata"
                );
                NotepadError::Metadata(e.to_string())
            })?;

        Ok(())
    }
}

/// In-memory metadata store for tests.
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    #[derive(Default)]
    pub struct InMemoryRoomMetadataStore {
        rooms: Mutex<HashMap<String, RoomMetadata>>,
        saves: AtomicUsize,
        fail_saves: AtomicBool,
        latency: Option<std::time::Duration>,
    }

    impl InMemoryRoomMetadataStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn with_room(self, room_id: &str, metadata: RoomMetadata) -> Self {
            self.rooms
                .lock()
                .await
                .insert(room_id.to_string(), metadata);
            self
        }

        /// Every load and save takes `latency` before answering.
        pub fn with_latency(mut self, latency: std::time::Duration) -> Self {
            self.latency = Some(latency);
            self
        }

        async fn delay(&self) {
            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }
        }

        /// Make every subsequent `save` fail.
        pub fn fail_saves(&self) {
            self.fail_saves.store(true, Ordering::SeqCst);
        }

        pub async fn get(&self, room_id: &str) -> Option<RoomMetadata> {
            self.rooms.lock().await.get(room_id).cloned()
        }

        /// Number of successful saves.
        pub fn save_count(&self) -> usize {
            self.saves.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl RoomMetadataStore for InMemoryRoomMetadataStore {
        async fn load(&self, room_id: &str) -> Result<RoomMetadata, NotepadError> {
            self.delay().await;
            self.rooms
                .lock()
                .await
                .get(room_id)
                .cloned()
                .ok_or_else(|| NotepadError::Metadata(format!("No metadata found for room {room_id}")))
        }

        async fn save(&self, room_id: &str, metadata: &RoomMetadata) -> Result<(), NotepadError> {
            self.delay().await;
            if self.fail_saves.load(Ordering::SeqCst) {
                return Err(NotepadError::Metadata("mock save failure".to_string()));
            }
            self.rooms
                .lock()
                .await
                .insert(room_id.to_string(), metadata.clone());
            self.saves.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
}
