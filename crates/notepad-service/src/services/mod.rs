//! Service layer for the notepad service.
//!
//! # Components
//!
//! - `host_registry` - Immutable list of configured pad hosts
//! - `host_selection` - Least-loaded live host selection
//! - `pad_client` - HTTP client for the pad host API
//! - `session_coordinator` - Session create/cleanup/status orchestration

pub mod host_registry;
pub mod host_selection;
pub mod pad_client;
pub mod session_coordinator;

pub use host_registry::HostRegistry;
pub use host_selection::HostSelector;
pub use pad_client::{PadClientTrait, RemotePadClient};
pub use session_coordinator::SessionCoordinator;
