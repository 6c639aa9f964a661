//! Metrics definitions for the notepad service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `np_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `endpoint`: the fixed route table, everything else is `/other`
//! - `operation`: bounded by code (probe, create_pad, create_session, ...)
//! - `status`: `success` or a `NotepadError::error_type` label
//!
//! Host ids, room ids and pad ids are never used as labels.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus recorder and return the handle used to render
/// `/metrics`.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("np_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // Selection probes every host, so it is bounded by the slowest probe
        .set_buckets_for_metric(
            Matcher::Prefix("np_host_selection".to_string()),
            &[0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500],
        )
        .map_err(|e| format!("Failed to set host selection buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("np_pad_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000,
            ],
        )
        .map_err(|e| format!("Failed to set pad request buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion.
///
/// Metric: `np_http_requests_total`, `np_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("np_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("np_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Map a request path onto the route table.
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/health" => "/health",
        "/ready" => "/ready",
        "/metrics" => "/metrics",
        "/api/v1/notepad/sessions" => "/api/v1/notepad/sessions",
        "/api/v1/notepad/cleanup" => "/api/v1/notepad/cleanup",
        "/api/v1/notepad/room-ended" => "/api/v1/notepad/room-ended",
        "/api/v1/notepad/status" => "/api/v1/notepad/status",
        _ => "/other",
    }
}

// ============================================================================
// Host Selection Metrics
// ============================================================================

/// Record a host selection.
///
/// Metric: `np_host_selection_total`, `np_host_selection_duration_seconds`
/// Labels: `status`
pub fn record_host_selection(status: &str, duration: Duration) {
    histogram!("np_host_selection_duration_seconds").record(duration.as_secs_f64());

    counter!("np_host_selection_total",
        "status" => status.to_string()
    )
    .increment(1);
}

// ============================================================================
// Pad Host Metrics
// ============================================================================

/// Record one pad host API call.
///
/// Metric: `np_pad_requests_total`, `np_pad_request_duration_seconds`
/// Labels: `operation`, `status`
pub fn record_pad_request(operation: &str, status: &str, duration: Duration) {
    histogram!("np_pad_request_duration_seconds",
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("np_pad_requests_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

// ============================================================================
// Session Lifecycle Metrics
// ============================================================================

/// Record a coordinator operation outcome.
///
/// Metric: `np_sessions_total`
/// Labels: `operation` (create, cleanup, room_ended, set_active), `status`
pub fn record_session_operation(operation: &str, status: &str) {
    counter!("np_sessions_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}
