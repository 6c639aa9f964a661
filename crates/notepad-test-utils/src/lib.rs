//! # Notepad Test Utilities
//!
//! Shared test utilities for the notepad service.
//!
//! This crate provides:
//! - Mock pad hosts (`MockPadHost`) speaking the pad host API over wiremock
//! - Server test harness (`TestNotepadServer`)
//! - Room metadata fixtures
//!
//! ## Usage
//!
//! ```rust,ignore
//! use notepad_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let host = MockPadHost::healthy("pad-1").await;
//!     let server = TestNotepadServer::spawn(vec![host.pad_host()]).await?;
//!     // ...
//!     Ok(())
//! }
//! ```

pub mod fixtures;
pub mod mock_pad_host;
pub mod server_harness;

pub use fixtures::*;
pub use mock_pad_host::{MockPadHost, MockPadHostBuilder, MOCK_API_VERSION};
pub use server_harness::TestNotepadServer;
