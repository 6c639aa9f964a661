//! Static registry of configured pad hosts.

use crate::models::PadHost;
use std::sync::Arc;

/// Immutable, ordered collection of pad hosts.
///
/// Registry order is significant: it breaks ties during host selection.
#[derive(Debug, Clone, Default)]
pub struct HostRegistry {
    hosts: Arc<[PadHost]>,
}

impl HostRegistry {
    pub fn new(hosts: Vec<PadHost>) -> Self {
        Self {
            hosts: hosts.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PadHost> {
        self.hosts.iter()
    }

    /// Look up a host by id.
    pub fn get(&self, host_id: &str) -> Option<&PadHost> {
        self.hosts.iter().find(|h| h.id == host_id)
    }
}
