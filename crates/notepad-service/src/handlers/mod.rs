//! HTTP request handlers for the notepad service.

pub mod health;
pub mod metrics;
pub mod notepad;

pub use health::{health_check, readiness_check};
pub use metrics::metrics_handler;
pub use notepad::{change_status, cleanup_session, create_session, room_ended};
