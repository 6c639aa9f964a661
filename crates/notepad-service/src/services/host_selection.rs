//! Pad host selection.
//!
//! Probes every configured host, drops the ones that fail, and picks the live
//! host with the smallest active session set. Ties go to the host listed
//! first in the registry.
//!
//! Selection is read-only. It does not reserve capacity, so two nodes
//! selecting at the same moment may both pick the same host; the result is
//! slightly uneven load, never an inconsistent one.

use crate::errors::NotepadError;
use crate::models::PadHost;
use crate::observability::metrics;
use crate::repositories::ActiveSessionCounter;
use crate::services::host_registry::HostRegistry;
use crate::services::pad_client::PadClientTrait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, warn};

/// A live host with its recorded load.
#[derive(Debug, Clone)]
pub struct HostCandidate {
    pub host: PadHost,
    pub active_sessions: i64,
}

/// Service for pad host selection.
#[derive(Clone)]
pub struct HostSelector {
    registry: HostRegistry,
    pad_client: Arc<dyn PadClientTrait>,
    counter: Arc<dyn ActiveSessionCounter>,
}

impl HostSelector {
    pub fn new(
        registry: HostRegistry,
        pad_client: Arc<dyn PadClientTrait>,
        counter: Arc<dyn ActiveSessionCounter>,
    ) -> Self {
        Self {
            registry,
            pad_client,
            counter,
        }
    }

    /// Select the least-loaded live host.
    ///
    /// # Errors
    ///
    /// - `NotepadError::NoHostsConfigured` - The registry is empty
    /// - `NotepadError::NoLiveHost` - Every probe failed
    /// - `NotepadError::Store` - A live host's load could not be read
    #[instrument(skip_all, fields(hosts = self.registry.len()))]
    pub async fn select_host(&self) -> Result<PadHost, NotepadError> {
        let start = Instant::now();
        let result = self.select().await;

        let status = match &result {
            Ok(_) => "success",
            Err(e) => e.error_type(),
        };
        metrics::record_host_selection(status, start.elapsed());

        result
    }

    async fn select(&self) -> Result<PadHost, NotepadError> {
        if self.registry.is_empty() {
            warn!(
                target: "np.service.selection",
                "No shared notepad hosts configured"
            );
            return Err(NotepadError::NoHostsConfigured);
        }

        let candidates = self.live_candidates().await?;

        let selected = least_loaded(&candidates).ok_or_else(|| {
            warn!(
                target: "np.service.selection",
                hosts = self.registry.len(),
                "No live shared notepad host found"
            );
            NotepadError::NoLiveHost
        })?;

        debug!(
            target: "np.service.selection",
            host_id = %selected.host.id,
            active_sessions = selected.active_sessions,
            live_hosts = candidates.len(),
            "Selected pad host"
        );

        Ok(selected.host.clone())
    }

    /// Probe each host in registry order and read the load of live ones.
    async fn live_candidates(&self) -> Result<Vec<HostCandidate>, NotepadError> {
        let mut candidates = Vec::with_capacity(self.registry.len());

        for host in self.registry.iter() {
            if let Err(e) = self.pad_client.probe(host).await {
                debug!(
                    target: "np.service.selection",
                    host_id = %host.id,
                    error = %e,
                    "Excluding pad host that failed its probe"
                );
                continue;
            }

            let active_sessions = self.counter.count(&host.id).await?;
            candidates.push(HostCandidate {
                host: host.clone(),
                active_sessions,
            });
        }

        Ok(candidates)
    }
}

/// Pick the candidate with the smallest load; the first one wins ties.
pub fn least_loaded(candidates: &[HostCandidate]) -> Option<&HostCandidate> {
    candidates.iter().min_by_key(|c| c.active_sessions)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::repositories::active_sessions::mock::MockSessionCounter;
    use crate::services::pad_client::mock::MockPadClient;
    use secrecy::SecretString;

    fn host(id: &str) -> PadHost {
        PadHost {
            id: id.to_string(),
            base_url: format!("http://{id}:9001"),
            api_key: SecretString::from("key"),
        }
    }

    fn candidate(id: &str, load: i64) -> HostCandidate {
        HostCandidate {
            host: host(id),
            active_sessions: load,
        }
    }

    fn selector(
        ids: &[&str],
        pad_client: MockPadClient,
        counter: Arc<MockSessionCounter>,
    ) -> HostSelector {
        let registry = HostRegistry::new(ids.iter().map(|id| host(id)).collect());
        HostSelector::new(registry, Arc::new(pad_client), counter)
    }

    #[test]
    fn test_least_loaded_empty() {
        assert!(least_loaded(&[]).is_none());
    }

    #[test]
    fn test_least_loaded_picks_minimum() {
        let candidates = vec![candidate("a", 5), candidate("b", 2), candidate("c", 7)];
        assert_eq!(least_loaded(&candidates).unwrap().host.id, "b");
    }

    #[test]
    fn test_least_loaded_tie_goes_to_first() {
        let candidates = vec![candidate("a", 4), candidate("b", 1), candidate("c", 1)];
        assert_eq!(least_loaded(&candidates).unwrap().host.id, "b");

        let all_equal = vec![candidate("x", 0), candidate("y", 0)];
        assert_eq!(least_loaded(&all_equal).unwrap().host.id, "x");
    }

    #[test]
    fn test_least_loaded_is_minimal_over_many_distributions() {
        let loads: [[i64; 4]; 5] = [
            [0, 0, 0, 0],
            [9, 3, 3, 8],
            [1, 2, 3, 4],
            [4, 3, 2, 1],
            [7, 0, 7, 0],
        ];

        for distribution in loads {
            let candidates: Vec<HostCandidate> = distribution
                .iter()
                .enumerate()
                .map(|(i, load)| candidate(&format!("h{i}"), *load))
                .collect();
            let min = distribution.iter().min().copied().unwrap();
            let first_min = distribution.iter().position(|l| *l == min).unwrap();

            let selected = least_loaded(&candidates).unwrap();
            assert_eq!(selected.active_sessions, min);
            assert_eq!(selected.host.id, format!("h{first_min}"));
        }
    }

    #[tokio::test]
    async fn test_empty_registry_is_not_configured() {
        let selector = selector(&[], MockPadClient::new(), Arc::new(MockSessionCounter::new()));

        let result = selector.select_host().await;
        assert!(matches!(result, Err(NotepadError::NoHostsConfigured)));
    }

    #[tokio::test]
    async fn test_all_hosts_dead_is_no_live_host() {
        let pad_client = MockPadClient::new()
            .with_dead_host("pad-a")
            .with_dead_host("pad-b");
        let selector = selector(&["pad-a", "pad-b"], pad_client, Arc::new(MockSessionCounter::new()));

        let result = selector.select_host().await;
        assert!(matches!(result, Err(NotepadError::NoLiveHost)));
    }

    #[tokio::test]
    async fn test_dead_host_excluded_even_if_least_loaded() {
        let counter = Arc::new(
            MockSessionCounter::new()
                .with_load("pad-a", 0)
                .await
                .with_load("pad-b", 5)
                .await,
        );
        let pad_client = MockPadClient::new().with_dead_host("pad-a");
        let selector = selector(&["pad-a", "pad-b"], pad_client, counter);

        let selected = selector.select_host().await.unwrap();
        assert_eq!(selected.id, "pad-b");
    }

    #[tokio::test]
    async fn test_selection_follows_counts_after_reserve() {
        let counter = Arc::new(
            MockSessionCounter::new()
                .with_load("pad-a", 3)
                .await
                .with_load("pad-b", 1)
                .await,
        );
        let selector = selector(&["pad-a", "pad-b"], MockPadClient::new(), counter.clone());

        assert_eq!(selector.select_host().await.unwrap().id, "pad-b");

        counter.reserve("pad-b", "room-x").await.unwrap();
        assert_eq!(selector.select_host().await.unwrap().id, "pad-b");

        counter.reserve("pad-b", "room-y").await.unwrap();
        assert_eq!(selector.select_host().await.unwrap().id, "pad-a");
    }

    #[tokio::test]
    async fn test_selection_does_not_reserve() {
        let counter = Arc::new(MockSessionCounter::new());
        let selector = selector(&["pad-a"], MockPadClient::new(), counter.clone());

        selector.select_host().await.unwrap();

        assert_eq!(counter.mutation_count(), 0);
        assert_eq!(counter.count("pad-a").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_count_failure_propagates() {
        let counter = Arc::new(MockSessionCounter::new());
        counter.fail_count();
        let selector = selector(&["pad-a"], MockPadClient::new(), counter);

        let result = selector.select_host().await;
        assert!(matches!(result, Err(NotepadError::Store(_))));
    }
}
