//! Shared notepad session coordinator.
//!
//! Allocates collaborative-editing sessions ("pads") on a pool of external
//! pad hosts shared by every node of a deployment:
//!
//! - Least-loaded live host selection
//! - Per-host active session accounting in a shared Redis store
//! - Pad and read-only alias creation over the pad host HTTP API
//! - Room metadata mirroring with idempotent cleanup
//!
//! # Architecture
//!
//! Handler -> Service -> Repository:
//!
//! ```text
//! routes/mod.rs -> handlers/*.rs -> services/*.rs -> repositories/*.rs
//! ```
//!
//! # Modules
//!
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - HTTP metrics middleware
//! - `models` - Pad hosts, sessions and room metadata
//! - `observability` - Prometheus metrics
//! - `repositories` - Shared store access
//! - `routes` - Axum router setup
//! - `services` - Host selection, pad client and session coordinator

pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;
