//! Observability for the notepad service.
//!
//! Provides metrics definitions and recording helpers.

pub mod metrics;
