//! Shared store access for the notepad service.
//!
//! # Components
//!
//! - `active_sessions` - Per-host active session sets (Reserve/Release/Count)
//! - `room_metadata` - Room metadata records
//!
//! Every store call runs under a bounded timeout; a timeout is reported as
//! `NotepadError::Store` like any other store failure.

pub mod active_sessions;
pub mod room_metadata;

pub use active_sessions::{ActiveSessionCounter, RedisSessionCounter};
pub use room_metadata::{RedisRoomMetadataStore, RoomMetadataStore};

use crate::errors::NotepadError;
use redis::aio::MultiplexedConnection;
use redis::{Client, RedisResult};
use secrecy::{ExposeSecret, SecretString};
use std::future::Future;
use std::time::Duration;
use tracing::error;

/// Readiness check against the shared store.
#[async_trait::async_trait]
pub trait StoreHealthCheck: Send + Sync {
    async fn ping(&self) -> Result<(), NotepadError>;
}

/// Open a multiplexed connection to the shared store.
///
/// The returned connection is cheap to clone and safe for concurrent use.
pub async fn connect(
    redis_url: &SecretString,
    timeout: Duration,
) -> Result<MultiplexedConnection, NotepadError> {
    let client = Client::open(redis_url.expose_secret()).map_err(|e| {
        // Do NOT log the URL, it may carry credentials
        error!(target: "np.repository", error = %e, "Failed to open Redis client");
        NotepadError::Store(format!("Failed to open Redis client: {e}"))
    })?;

    with_store_timeout(
        timeout,
        "connect",
        client.get_multiplexed_async_connection(),
    )
    .await
}

/// Run one store call under `timeout`.
pub(crate) async fn with_store_timeout<T, F>(
    timeout: Duration,
    operation: &'static str,
    call: F,
) -> Result<T, NotepadError>
where
    F: Future<Output = RedisResult<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(NotepadError::Store(format!("{operation} failed: {e}"))),
        Err(_) => Err(NotepadError::Store(format!(
            "{operation} timed out after {}ms",
            timeout.as_millis()
        ))),
    }
}
