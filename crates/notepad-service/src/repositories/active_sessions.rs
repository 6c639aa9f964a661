//! Per-host active session sets.
//!
//! Each pad host owns one set in the shared store, keyed
//! `{prefix}{host_id}`, whose members are the ids of rooms holding a session
//! on that host. The set cardinality is the host's load.
//!
//! Reserve and Release map to SADD and SREM, so both are idempotent and
//! atomic in the store. No TTL is set; membership changes only through
//! explicit Reserve/Release.

use crate::errors::NotepadError;
use crate::repositories::{with_store_timeout, StoreHealthCheck};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Load accounting over the shared store.
#[async_trait::async_trait]
pub trait ActiveSessionCounter: Send + Sync {
    /// Record `room_id` as holding a session on `host_id`. Idempotent.
    async fn reserve(&self, host_id: &str, room_id: &str) -> Result<(), NotepadError>;

    /// Remove `room_id` from `host_id`'s set. Removing an absent id is a no-op.
    async fn release(&self, host_id: &str, room_id: &str) -> Result<(), NotepadError>;

    /// Number of rooms currently holding a session on `host_id`.
    async fn count(&self, host_id: &str) -> Result<i64, NotepadError>;
}

/// Redis-backed session counter.
///
/// Cheaply cloneable; the multiplexed connection is shared across tasks.
#[derive(Clone)]
pub struct RedisSessionCounter {
    connection: MultiplexedConnection,
    key_prefix: String,
    timeout: Duration,
}

impl RedisSessionCounter {
    pub fn new(connection: MultiplexedConnection, key_prefix: String, timeout: Duration) -> Self {
        Self {
            connection,
            key_prefix,
            timeout,
        }
    }

    /// Store key of a host's active session set.
    pub fn key_for(&self, host_id: &str) -> String {
        active_set_key(&self.key_prefix, host_id)
    }
}

/// Build the active set key for a host.
pub fn active_set_key(prefix: &str, host_id: &str) -> String {
    format!("{prefix}{host_id}")
}

#[async_trait::async_trait]
impl ActiveSessionCounter for RedisSessionCounter {
    #[instrument(skip_all, fields(host_id = %host_id, room_id = %room_id))]
    async fn reserve(&self, host_id: &str, room_id: &str) -> Result<(), NotepadError> {
        let mut conn = self.connection.clone();
        let key = self.key_for(host_id);

        let added: i64 = with_store_timeout(self.timeout, "sadd", conn.sadd(&key, room_id))
            .await
            .map_err(|e| {
                warn!(
                    target: "np.repository.active_sessions",
                    error = %e,
                    host_id = %host_id,
                    "Failed to reserve session slot"
                );
                e
            })?;

        debug!(
            target: "np.repository.active_sessions",
            host_id = %host_id,
            room_id = %room_id,
            newly_added = added == 1,
            "Reserved session slot"
        );

        Ok(())
    }

    #[instrument(skip_all, fields(host_id = %host_id, room_id = %room_id))]
    async fn release(&self, host_id: &str, room_id: &str) -> Result<(), NotepadError> {
        let mut conn = self.connection.clone();
        let key = self.key_for(host_id);

        let removed: i64 = with_store_timeout(self.timeout, "srem", conn.srem(&key, room_id))
            .await
            .map_err(|e| {
                warn!(
                    target: "np.repository.active_sessions",
                    error = %e,
                    host_id = %host_id,
                    "Failed to release session slot"
                );
                e
            })?;

        debug!(
            target: "np.repository.active_sessions",
            host_id = %host_id,
            room_id = %room_id,
            was_present = removed == 1,
            "Released session slot"
        );

        Ok(())
    }

    #[instrument(skip_all, fields(host_id = %host_id))]
    async fn count(&self, host_id: &str) -> Result<i64, NotepadError> {
        let mut conn = self.connection.clone();
        let key = self.key_for(host_id);

        with_store_timeout(self.timeout, "scard", conn.scard(&key)).await
    }
}

#[async_trait::async_trait]
impl StoreHealthCheck for RedisSessionCounter {
    async fn ping(&self) -> Result<(), NotepadError> {
        let mut conn = self.connection.clone();
        let _: String = with_store_timeout(
            self.timeout,
            "ping",
            redis::cmd("PING").query_async(&mut conn),
        )
        .await?;
        Ok(())
    }
}

/// In-memory session counter for tests.
pub mod mock {
    use super::*;
    use std::collections::{BTreeSet, HashMap};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    /// Mock counter with set semantics and optional failure injection.
    #[derive(Default)]
    pub struct MockSessionCounter {
        sets: Mutex<HashMap<String, BTreeSet<String>>>,
        mutations: AtomicUsize,
        fail_reserve: AtomicBool,
        fail_count: AtomicBool,
    }

    impl MockSessionCounter {
        pub fn new() -> Self {
            Self::default()
        }

        /// Seed `host_id` with `count` placeholder rooms.
        pub async fn with_load(self, host_id: &str, count: usize) -> Self {
            {
                let mut sets = self.sets.lock().await;
                let set = sets.entry(host_id.to_string()).or_default();
                for i in 0..count {
                    set.insert(format!("seed-{host_id}-{i}"));
                }
            }
            self
        }

        /// Make every subsequent `reserve` fail with a store error.
        pub fn fail_reserve(&self) {
            self.fail_reserve.store(true, Ordering::SeqCst);
        }

        /// Make every subsequent `count` fail with a store error.
        pub fn fail_count(&self) {
            self.fail_count.store(true, Ordering::SeqCst);
        }

        /// Room ids currently in `host_id`'s set.
        pub async fn members(&self, host_id: &str) -> BTreeSet<String> {
            self.sets
                .lock()
                .await
                .get(host_id)
                .cloned()
                .unwrap_or_default()
        }

        /// Number of reserve/release calls made.
        pub fn mutation_count(&self) -> usize {
            self.mutations.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl ActiveSessionCounter for MockSessionCounter {
        async fn reserve(&self, host_id: &str, room_id: &str) -> Result<(), NotepadError> {
            self.mutations.fetch_add(1, Ordering::SeqCst);
            if self.fail_reserve.load(Ordering::SeqCst) {
                return Err(NotepadError::Store("mock sadd failure".to_string()));
            }
            self.sets
                .lock()
                .await
                .entry(host_id.to_string())
                .or_default()
                .insert(room_id.to_string());
            Ok(())
        }

        async fn release(&self, host_id: &str, room_id: &str) -> Result<(), NotepadError> {
            self.mutations.fetch_add(1, Ordering::SeqCst);
            if let Some(set) = self.sets.lock().await.get_mut(host_id) {
                set.remove(room_id);
            }
            Ok(())
        }

        async fn count(&self, host_id: &str) -> Result<i64, NotepadError> {
            if self.fail_count.load(Ordering::SeqCst) {
                return Err(NotepadError::Store("mock scard failure".to_string()));
            }
            let len = self
                .sets
                .lock()
                .await
                .get(host_id)
                .map_or(0, BTreeSet::len);
            Ok(len as i64)
        }
    }

    #[async_trait::async_trait]
    impl StoreHealthCheck for MockSessionCounter {
        async fn ping(&self) -> Result<(), NotepadError> {
            if self.fail_count.load(Ordering::SeqCst) {
                return Err(NotepadError::Store("mock ping failure".to_string()));
            }
            Ok(())
        }
    }
}
