//! Pad host HTTP client.
//!
//! Issues the four pad host API calls used by the coordinator:
//!
//! | Operation | Path |
//! |-----------|------|
//! | probe | `GET /api/{version}/getStats` |
//! | create pad | `GET /api/{version}/createPad?padID=..` |
//! | read-only alias | `GET /api/{version}/getReadOnlyID?padID=..` |
//! | delete pad | `GET /api/{version}/deletePad?padID=..` |
//!
//! The API key travels as the `apikey` query parameter. Every response body
//! is an envelope `{code, message, data}`; `code == 0` is success and any
//! other code is a host-reported error whose text is `message`.
//!
//! # Security
//!
//! - Request URLs carry the API key, so they are stripped from transport
//!   errors before logging
//! - Timeouts bound every call; a timeout is reported as unreachable

use crate::errors::NotepadError;
use crate::models::PadHost;
use crate::observability::metrics;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, error, instrument, warn};

/// Upper bound on connection establishment in seconds.
const PAD_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Pad host response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct PadResponse {
    pub code: i64,

    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub data: Option<PadResponseData>,
}

/// Payload fields used from pad host responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PadResponseData {
    #[serde(rename = "readOnlyID", default)]
    pub read_only_id: Option<String>,

    #[serde(rename = "totalPads", default)]
    pub total_pads: Option<i64>,

    #[serde(rename = "totalActivePads", default)]
    pub total_active_pads: Option<i64>,
}

/// Pad host API operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadOperation {
    Probe,
    CreatePad,
    ReadOnlyAlias,
    DeletePad,
}

impl PadOperation {
    /// API method name in the request path.
    pub fn method(self) -> &'static str {
        match self {
            PadOperation::Probe => "getStats",
            PadOperation::CreatePad => "createPad",
            PadOperation::ReadOnlyAlias => "getReadOnlyID",
            PadOperation::DeletePad => "deletePad",
        }
    }

    /// Metric label.
    pub fn label(self) -> &'static str {
        match self {
            PadOperation::Probe => "probe",
            PadOperation::CreatePad => "create_pad",
            PadOperation::ReadOnlyAlias => "read_only_alias",
            PadOperation::DeletePad => "delete_pad",
        }
    }
}

/// Pad host operations (enables mocking).
#[async_trait::async_trait]
pub trait PadClientTrait: Send + Sync {
    /// Succeeds iff the host answers `getStats` with a success envelope.
    async fn probe(&self, host: &PadHost) -> Result<(), NotepadError>;

    async fn create_pad(&self, host: &PadHost, pad_id: &str) -> Result<(), NotepadError>;

    /// Returns the read-only viewer id of an existing pad.
    async fn create_read_only_alias(
        &self,
        host: &PadHost,
        pad_id: &str,
    ) -> Result<String, NotepadError>;

    /// Best-effort; callers treat failure as non-fatal.
    async fn delete_pad(&self, host: &PadHost, pad_id: &str) -> Result<(), NotepadError>;
}

/// HTTP client for pad hosts.
#[derive(Clone)]
pub struct RemotePadClient {
    client: Client,
    api_version: String,
}

impl RemotePadClient {
    /// Create a new pad host client.
    ///
    /// # Errors
    ///
    /// Returns `NotepadError::Internal` if the HTTP client cannot be built.
    pub fn new(api_version: String, request_timeout: Duration) -> Result<Self, NotepadError> {
        let connect_timeout = Duration::from_secs(PAD_CONNECT_TIMEOUT_SECS).min(request_timeout);
        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| {
                error!(target: "np.service.pad_client", error = %e, "Failed to build HTTP client");
                NotepadError::Internal
            })?;

        Ok(Self {
            client,
            api_version,
        })
    }

    fn endpoint(&self, host: &PadHost, operation: PadOperation) -> String {
        format!(
            "{}/api/{}/{}",
            host.base_url.trim_end_matches('/'),
            self.api_version,
            operation.method()
        )
    }

    /// Issue one call and decode its envelope.
    ///
    /// Returns the envelope only when `code == 0`.
    async fn call(
        &self,
        host: &PadHost,
        operation: PadOperation,
        pad_id: Option<&str>,
    ) -> Result<PadResponse, NotepadError> {
        let start = Instant::now();
        let result = self.send(host, operation, pad_id).await;

        let status = match &result {
            Ok(_) => "success",
            Err(e) => e.error_type(),
        };
        metrics::record_pad_request(operation.label(), status, start.elapsed());

        result
    }

    async fn send(
        &self,
        host: &PadHost,
        operation: PadOperation,
        pad_id: Option<&str>,
    ) -> Result<PadResponse, NotepadError> {
        let mut request = self
            .client
            .get(self.endpoint(host, operation))
            .query(&[("apikey", host.api_key.expose_secret())]);
        if let Some(pad_id) = pad_id {
            request = request.query(&[("padID", pad_id)]);
        }

        let response = request.send().await.map_err(|e| {
            let timed_out = e.is_timeout();
            let e = e.without_url();
            warn!(
                target: "np.service.pad_client",
                error = %e,
                host_id = %host.id,
                operation = operation.method(),
                timed_out,
                "Pad host request failed"
            );
            if timed_out {
                NotepadError::RemoteUnreachable(format!("{} timed out", operation.method()))
            } else {
                NotepadError::RemoteUnreachable(format!("can't connect to host {}", host.id))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                target: "np.service.pad_client",
                status = %status,
                host_id = %host.id,
                operation = operation.method(),
                "Pad host returned non-success HTTP status"
            );
            return Err(NotepadError::RemoteUnreachable(format!(
                "error code: {status}"
            )));
        }

        let body = response.bytes().await.map_err(|e| {
            let e = e.without_url();
            warn!(
                target: "np.service.pad_client",
                error = %e,
                host_id = %host.id,
                "Failed to read pad host response body"
            );
            NotepadError::RemoteUnreachable("failed to read response body".to_string())
        })?;

        let envelope: PadResponse = serde_json::from_slice(&body).map_err(|e| {
            warn!(
                target: "np.service.pad_client",
                error = %e,
                host_id = %host.id,
                operation = operation.method(),
                "Malformed pad host response"
            );
            NotepadError::RemoteProtocol(format!("malformed {} response: {e}", operation.method()))
        })?;

        if envelope.code != 0 {
            warn!(
                target: "np.service.pad_client",
                host_id = %host.id,
                operation = operation.method(),
                code = envelope.code,
                message = %envelope.message,
                "Pad host rejected request"
            );
            let message = if envelope.message.is_empty() {
                format!("pad host returned code {}", envelope.code)
            } else {
                envelope.message
            };
            return Err(NotepadError::RemoteRejected(message));
        }

        Ok(envelope)
    }
}

#[async_trait::async_trait]
impl PadClientTrait for RemotePadClient {
    #[instrument(skip_all, fields(host_id = %host.id))]
    async fn probe(&self, host: &PadHost) -> Result<(), NotepadError> {
        let envelope = self.call(host, PadOperation::Probe, None).await?;

        if let Some(data) = envelope.data {
            debug!(
                target: "np.service.pad_client",
                host_id = %host.id,
                total_pads = ?data.total_pads,
                total_active_pads = ?data.total_active_pads,
                "Pad host is live"
            );
        }

        Ok(())
    }

    #[instrument(skip_all, fields(host_id = %host.id, pad_id = %pad_id))]
    async fn create_pad(&self, host: &PadHost, pad_id: &str) -> Result<(), NotepadError> {
        self.call(host, PadOperation::CreatePad, Some(pad_id))
            .await
            .map(|_| ())
    }

    #[instrument(skip_all, fields(host_id = %host.id, pad_id = %pad_id))]
    async fn create_read_only_alias(
        &self,
        host: &PadHost,
        pad_id: &str,
    ) -> Result<String, NotepadError> {
        let envelope = self
            .call(host, PadOperation::ReadOnlyAlias, Some(pad_id))
            .await?;

        envelope
            .data
            .and_then(|d| d.read_only_id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                warn!(
                    target: "np.service.pad_client",
                    host_id = %host.id,
                    "getReadOnlyID response carries no readOnlyID"
                );
                NotepadError::RemoteProtocol("getReadOnlyID response without readOnlyID".to_string())
            })
    }

    #[instrument(skip_all, fields(host_id = %host.id, pad_id = %pad_id))]
    async fn delete_pad(&self, host: &PadHost, pad_id: &str) -> Result<(), NotepadError> {
        self.call(host, PadOperation::DeletePad, Some(pad_id))
            .await
            .map(|_| ())
    }
}

/// Mock pad client module for testing.
pub mod mock {
    use super::*;
    use std::collections::HashSet;
    use std::sync::{Mutex, PoisonError};

    /// A call observed by the mock.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum PadCall {
        Probe { host_id: String },
        CreatePad { host_id: String, pad_id: String },
        ReadOnlyAlias { host_id: String, pad_id: String },
        DeletePad { host_id: String, pad_id: String },
    }

    /// Scriptable pad client.
    ///
    /// All hosts are live and accept every call unless configured otherwise.
    /// Read-only ids are `r.{pad_id}`.
    #[derive(Default)]
    pub struct MockPadClient {
        dead_hosts: HashSet<String>,
        create_rejection: Option<String>,
        alias_unreachable: bool,
        delete_unreachable: bool,
        latency: Option<Duration>,
        calls: Mutex<Vec<PadCall>>,
    }

    impl MockPadClient {
        pub fn new() -> Self {
            Self::default()
        }

        /// Probes of `host_id` fail as unreachable.
        pub fn with_dead_host(mut self, host_id: &str) -> Self {
            self.dead_hosts.insert(host_id.to_string());
            self
        }

        /// `create_pad` answers with a nonzero code and `message`.
        pub fn rejecting_create(mut self, message: &str) -> Self {
            self.create_rejection = Some(message.to_string());
            self
        }

        pub fn failing_alias(mut self) -> Self {
            self.alias_unreachable = true;
            self
        }

        pub fn failing_delete(mut self) -> Self {
            self.delete_unreachable = true;
            self
        }

        /// Every call takes `latency` before answering.
        pub fn with_latency(mut self, latency: Duration) -> Self {
            self.latency = Some(latency);
            self
        }

        pub fn calls(&self) -> Vec<PadCall> {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// Calls other than probes.
        pub fn pad_calls(&self) -> Vec<PadCall> {
            self.calls()
                .into_iter()
                .filter(|c| !matches!(c, PadCall::Probe { .. }))
                .collect()
        }

        async fn record(&self, call: PadCall) {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(call);
            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }
        }
    }

    #[async_trait::async_trait]
    impl PadClientTrait for MockPadClient {
        async fn probe(&self, host: &PadHost) -> Result<(), NotepadError> {
            self.record(PadCall::Probe {
                host_id: host.id.clone(),
            })
            .await;
            if self.dead_hosts.contains(&host.id) {
                return Err(NotepadError::RemoteUnreachable(format!(
                    "can't connect to host {}",
                    host.id
                )));
            }
            Ok(())
        }

        async fn create_pad(&self, host: &PadHost, pad_id: &str) -> Result<(), NotepadError> {
            self.record(PadCall::CreatePad {
                host_id: host.id.clone(),
                pad_id: pad_id.to_string(),
            })
            .await;
            match &self.create_rejection {
                Some(message) => Err(NotepadError::RemoteRejected(message.clone())),
                None => Ok(()),
            }
        }

        async fn create_read_only_alias(
            &self,
            host: &PadHost,
            pad_id: &str,
        ) -> Result<String, NotepadError> {
            self.record(PadCall::ReadOnlyAlias {
                host_id: host.id.clone(),
                pad_id: pad_id.to_string(),
            })
            .await;
            if self.alias_unreachable {
                return Err(NotepadError::RemoteUnreachable(
                    "getReadOnlyID timed out".to_string(),
                ));
            }
            Ok(format!("r.{pad_id}"))
        }

        async fn delete_pad(&self, host: &PadHost, pad_id: &str) -> Result<(), NotepadError> {
            self.record(PadCall::DeletePad {
                host_id: host.id.clone(),
                pad_id: pad_id.to_string(),
            })
            .await;
            if self.delete_unreachable {
                return Err(NotepadError::RemoteUnreachable(
                    "deletePad timed out".to_string(),
                ));
            }
            Ok(())
        }
    }
}
