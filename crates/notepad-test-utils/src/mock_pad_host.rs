//! Mock pad host for integration tests.
//!
//! A wiremock server speaking the pad host API. Each endpoint requires the
//! host's API key; calls with a wrong key get wiremock's default 404.
//!
//! # Example
//!
//! ```rust,ignore
//! use notepad_test_utils::MockPadHost;
//!
//! let host = MockPadHost::builder("pad-1")
//!     .rejecting_create("padID does already exist")
//!     .start()
//!     .await;
//!
//! let pad_host = host.pad_host();
//! ```

use notepad_service::models::PadHost;
use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Pad host API version served by the mock.
pub const MOCK_API_VERSION: &str = "1.2.15";

/// Success envelope with the given payload.
pub fn ok_envelope(data: serde_json::Value) -> serde_json::Value {
    json!({"code": 0, "message": "ok", "data": data})
}

/// Error envelope as pad hosts send it.
pub fn error_envelope(code: i64, message: &str) -> serde_json::Value {
    json!({"code": code, "message": message, "data": null})
}

/// Answers `getReadOnlyID` with `r.{padID}`.
struct ReadOnlyIdResponder;

impl Respond for ReadOnlyIdResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let pad_id = request
            .url
            .query_pairs()
            .find(|(k, _)| k == "padID")
            .map(|(_, v)| v.into_owned())
            .unwrap_or_default();
        ResponseTemplate::new(200).set_body_json(ok_envelope(json!({
            "readOnlyID": format!("r.{pad_id}")
        })))
    }
}

/// Builder for [`MockPadHost`].
#[derive(Debug)]
pub struct MockPadHostBuilder {
    id: String,
    api_key: String,
    down: bool,
    create_rejection: Option<String>,
    failing_delete: bool,
}

impl MockPadHostBuilder {
    /// Use a specific API key (default `key-{id}`).
    #[must_use]
    pub fn api_key(mut self, api_key: &str) -> Self {
        self.api_key = api_key.to_string();
        self
    }

    /// Every endpoint answers 503.
    #[must_use]
    pub fn down(mut self) -> Self {
        self.down = true;
        self
    }

    /// `createPad` answers with code 1 and `message`.
    #[must_use]
    pub fn rejecting_create(mut self, message: &str) -> Self {
        self.create_rejection = Some(message.to_string());
        self
    }

    /// `deletePad` answers 500.
    #[must_use]
    pub fn failing_delete(mut self) -> Self {
        self.failing_delete = true;
        self
    }

    /// Start the server and mount the configured endpoints.
    pub async fn start(self) -> MockPadHost {
        let server = MockServer::start().await;
        let prefix = format!("/api/{MOCK_API_VERSION}");

        if self.down {
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(503))
                .mount(&server)
                .await;
        } else {
            Mock::given(method("GET"))
                .and(path(format!("{prefix}/getStats")))
                .and(query_param("apikey", self.api_key.as_str()))
                .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(json!({
                    "totalPads": 0,
                    "totalSessions": 0,
                    "totalActivePads": 0
                }))))
                .mount(&server)
                .await;

            let create = match &self.create_rejection {
                Some(message) => ResponseTemplate::new(200).set_body_json(error_envelope(1, message)),
                None => ResponseTemplate::new(200).set_body_json(ok_envelope(json!(null))),
            };
            Mock::given(method("GET"))
                .and(path(format!("{prefix}/createPad")))
                .and(query_param("apikey", self.api_key.as_str()))
                .respond_with(create)
                .mount(&server)
                .await;

            Mock::given(method("GET"))
                .and(path(format!("{prefix}/getReadOnlyID")))
                .and(query_param("apikey", self.api_key.as_str()))
                .respond_with(ReadOnlyIdResponder)
                .mount(&server)
                .await;

            let delete = if self.failing_delete {
                ResponseTemplate::new(500)
            } else {
                ResponseTemplate::new(200).set_body_json(ok_envelope(json!(null)))
            };
            Mock::given(method("GET"))
                .and(path(format!("{prefix}/deletePad")))
                .and(query_param("apikey", self.api_key.as_str()))
                .respond_with(delete)
                .mount(&server)
                .await;
        }

        MockPadHost {
            id: self.id,
            api_key: self.api_key,
            server,
        }
    }
}

/// Running mock pad host.
pub struct MockPadHost {
    id: String,
    api_key: String,
    server: MockServer,
}

impl MockPadHost {
    #[must_use]
    pub fn builder(id: &str) -> MockPadHostBuilder {
        MockPadHostBuilder {
            id: id.to_string(),
            api_key: format!("key-{id}"),
            down: false,
            create_rejection: None,
            failing_delete: false,
        }
    }

    /// Start a healthy host that accepts every call.
    pub async fn healthy(id: &str) -> Self {
        Self::builder(id).start().await
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Registry entry pointing at this mock.
    pub fn pad_host(&self) -> PadHost {
        PadHost {
            id: self.id.clone(),
            base_url: self.server.uri(),
            api_key: SecretString::from(self.api_key.clone()),
        }
    }

    /// `NOTEPAD_HOSTS` entry for this mock.
    pub fn config_entry(&self) -> serde_json::Value {
        json!({"id": self.id, "host": self.server.uri(), "api_key": self.api_key})
    }

    /// `padID`s of received calls to `api_method` (e.g. "createPad").
    pub async fn pad_ids(&self, api_method: &str) -> Vec<String> {
        let suffix = format!("/{api_method}");
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.url.path().ends_with(&suffix))
            .filter_map(|r| {
                r.url
                    .query_pairs()
                    .find(|(k, _)| k == "padID")
                    .map(|(_, v)| v.into_owned())
            })
            .collect()
    }

    /// Number of received calls to `api_method`.
    pub async fn call_count(&self, api_method: &str) -> usize {
        let suffix = format!("/{api_method}");
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path().ends_with(&suffix))
            .count()
    }
}
