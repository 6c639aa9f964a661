//! Data models for the notepad service.
//!
//! Room metadata is stored as a JSON object owned by the room. The service
//! only rewrites the shared notepad block and keeps every other key (known or
//! not) intact through `#[serde(flatten)]` catch-all maps.

use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A configured pad host.
///
/// Loaded once at startup and never mutated. Identity is `id`.
#[derive(Debug, Clone, Deserialize)]
pub struct PadHost {
    /// Stable host identifier (used in store keys and room metadata).
    pub id: String,

    /// Base URL of the pad host API (e.g., "https://pad-1.example.com").
    #[serde(rename = "host")]
    pub base_url: String,

    /// API key sent as the `apikey` query parameter.
    pub api_key: SecretString,
}

/// Result of a successful session creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescriptor {
    pub pad_id: Uuid,
    pub read_only_pad_id: String,
    pub host_id: String,
    pub host_url: String,
    pub is_active: bool,
}

/// Lifecycle position of a room's shared notepad, as recorded in metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NoSession,
    Active,
    Inactive,
}

/// Reads an explicit `null` as the type's default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Shared notepad block of the room metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SharedNotePadFeatures {
    /// Whether the room may use a shared notepad at all.
    #[serde(rename = "allowed_shared_note_pad", default, deserialize_with = "null_as_default")]
    pub allowed: bool,

    #[serde(default, deserialize_with = "null_as_default")]
    pub is_active: bool,

    /// Id of the pad host serving the session.
    #[serde(rename = "node_id", default, deserialize_with = "null_as_default")]
    pub host_id: String,

    /// Base URL of the pad host serving the session.
    #[serde(rename = "host", default, deserialize_with = "null_as_default")]
    pub host_url: String,

    #[serde(rename = "note_pad_id", default, deserialize_with = "null_as_default")]
    pub pad_id: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub read_only_pad_id: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SharedNotePadFeatures {
    /// Read only the shared notepad block out of a raw metadata record.
    ///
    /// Everything outside the block is ignored, and block fields that are
    /// null or of the wrong type read as empty. A record without the block
    /// yields the default (not allowed, no session).
    pub fn from_room_metadata_json(raw: &str) -> Result<Self, serde_json::Error> {
        let record: Value = serde_json::from_str(raw)?;
        let Some(block) = record
            .pointer("/features/shared_note_pad_features")
            .and_then(Value::as_object)
        else {
            return Ok(Self::default());
        };

        let flag = |key: &str| block.get(key).and_then(Value::as_bool).unwrap_or(false);
        let text = |key: &str| {
            block
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        Ok(Self {
            allowed: flag("allowed_shared_note_pad"),
            is_active: flag("is_active"),
            host_id: text("node_id"),
            host_url: text("host"),
            pad_id: text("note_pad_id"),
            read_only_pad_id: text("read_only_pad_id"),
            extra: Map::new(),
        })
    }

    /// Rewrite the session fields from a freshly created session.
    ///
    /// `allowed` and unknown keys are left as they were.
    pub fn bind_session(&mut self, session: &SessionDescriptor) {
        self.is_active = session.is_active;
        self.host_id = session.host_id.clone();
        self.host_url = session.host_url.clone();
        self.pad_id = session.pad_id.to_string();
        self.read_only_pad_id = session.read_only_pad_id.clone();
    }

    /// Derive the session state from the recorded fields.
    pub fn state(&self) -> SessionState {
        if self.pad_id.is_empty() || self.host_id.is_empty() {
            SessionState::NoSession
        } else if self.is_active {
            SessionState::Active
        } else {
            SessionState::Inactive
        }
    }
}

/// Feature flags of a room.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomFeatures {
    #[serde(default, deserialize_with = "null_as_default")]
    pub shared_note_pad_features: SharedNotePadFeatures,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Room metadata record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomMetadata {
    #[serde(default)]
    pub features: RoomFeatures,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RoomMetadata {
    /// Parse a metadata record from its JSON text.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Render the record back to JSON text.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn notepad(&self) -> &SharedNotePadFeatures {
        &self.features.shared_note_pad_features
    }

    pub fn notepad_mut(&mut self) -> &mut SharedNotePadFeatures {
        &mut self.features.shared_note_pad_features
    }
}

// ============================================================================
// HTTP request/response types
// ============================================================================

/// Request body for `POST /api/v1/notepad/sessions`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSessionRequest {
    pub room_id: String,
}

/// Response body for a created session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub pad_id: String,
    pub read_only_pad_id: String,
}

impl From<&SessionDescriptor> for CreateSessionResponse {
    fn from(session: &SessionDescriptor) -> Self {
        Self {
            pad_id: session.pad_id.to_string(),
            read_only_pad_id: session.read_only_pad_id.clone(),
        }
    }
}

/// Request body for `POST /api/v1/notepad/cleanup`.
#[derive(Debug, Clone, Deserialize)]
pub struct CleanPadRequest {
    pub room_id: String,
    /// Pad host id the session lives on.
    pub node_id: String,
    pub pad_id: String,
}

/// Request body for `POST /api/v1/notepad/room-ended`.
#[derive(Debug, Clone, Deserialize)]
pub struct RoomEndedRequest {
    pub room_id: String,
    /// Raw room metadata JSON at the time the room ended.
    pub metadata: String,
}

/// Request body for `POST /api/v1/notepad/status`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChangeStatusRequest {
    pub room_id: String,
    pub is_active: bool,
}

/// Readiness probe response.
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_pad_host_deserialize_and_redact() {
        let json = r#"{"id": "pad-1", "host": "https://pad-1:9001", "api_key": "k3y"}"#;
        let host: PadHost = serde_json::from_str(json).unwrap();

        assert_eq!(host.id, "pad-1");
        assert_eq!(host.base_url, "https://pad-1:9001");
        assert_eq!(host.api_key.expose_secret(), "k3y");
        assert!(!format!("{host:?}").contains("k3y"));
    }

    #[test]
    fn test_metadata_preserves_unknown_fields() {
        let raw = r#"{
            "room_title": "Weekly sync",
            "features": {
                "allow_webcams": true,
                "shared_note_pad_features": {
                    "allowed_shared_note_pad": true,
                    "is_active": false,
                    "visible_to": "all"
                }
            }
        }"#;

        let mut meta = RoomMetadata::from_json(raw).unwrap();
        meta.notepad_mut().is_active = true;

        let rewritten: Value = serde_json::from_str(&meta.to_json().unwrap()).unwrap();
        assert_eq!(rewritten["room_title"], "Weekly sync");
        assert_eq!(rewritten["features"]["allow_webcams"], true);
        let block = &rewritten["features"]["shared_note_pad_features"];
        assert_eq!(block["is_active"], true);
        assert_eq!(block["allowed_shared_note_pad"], true);
        assert_eq!(block["visible_to"], "all");
    }

    #[test]
    fn test_metadata_without_features_defaults_to_not_allowed() {
        let meta = RoomMetadata::from_json(r#"{"room_title": "x"}"#).unwrap();
        assert!(!meta.notepad().allowed);
        assert_eq!(meta.notepad().state(), SessionState::NoSession);
    }

    #[test]
    fn test_bind_session_keeps_allowed_flag() {
        let mut block = SharedNotePadFeatures {
            allowed: true,
            ..Default::default()
        };
        let session = SessionDescriptor {
            pad_id: Uuid::nil(),
            read_only_pad_id: "r.abc".to_string(),
            host_id: "pad-2".to_string(),
            host_url: "http://pad-2".to_string(),
            is_active: true,
        };

        block.bind_session(&session);

        assert!(block.allowed);
        assert_eq!(block.host_id, "pad-2");
        assert_eq!(block.pad_id, Uuid::nil().to_string());
        assert_eq!(block.read_only_pad_id, "r.abc");
        assert_eq!(block.state(), SessionState::Active);

        block.is_active = false;
        assert_eq!(block.state(), SessionState::Inactive);
    }

    #[test]
    fn test_feature_block_wire_names() {
        let block = SharedNotePadFeatures {
            allowed: true,
            is_active: true,
            host_id: "pad-1".to_string(),
            host_url: "http://pad-1".to_string(),
            pad_id: "p".to_string(),
            read_only_pad_id: "r".to_string(),
            extra: Map::new(),
        };
        let json = serde_json::to_string(&block).unwrap();

        assert!(json.contains("\"allowed_shared_note_pad\":true"));
        assert!(json.contains("\"node_id\":\"pad-1\""));
        assert!(json.contains("\"host\":\"http://pad-1\""));
        assert!(json.contains("\"note_pad_id\":\"p\""));
        assert!(json.contains("\"read_only_pad_id\":\"r\""));
    }

    #[test]
    fn test_null_block_fields_read_as_empty() {
        let raw = r#"{"features":{"shared_note_pad_features":{
            "allowed_shared_note_pad": true,
            "is_active": null,
            "node_id": "pad-1",
            "host": null,
            "note_pad_id": "p1",
            "read_only_pad_id": null
        }}}"#;

        let meta = RoomMetadata::from_json(raw).unwrap();
        let block = meta.notepad();
        assert!(block.allowed);
        assert!(!block.is_active);
        assert_eq!(block.host_url, "");
        assert_eq!(block.read_only_pad_id, "");
        assert_eq!(block.state(), SessionState::Inactive);

        let meta = RoomMetadata::from_json(r#"{"features":{"shared_note_pad_features":null}}"#).unwrap();
        assert_eq!(meta.notepad().state(), SessionState::NoSession);
    }

    #[test]
    fn test_block_only_read_ignores_rest_of_record() {
        let raw = r#"{
            "room_title": ["not", "a", "string"],
            "features": {
                "allow_webcams": {"nested": [1, 2]},
                "shared_note_pad_features": {
                    "allowed_shared_note_pad": true,
                    "is_active": "yes",
                    "node_id": "pad-1",
                    "note_pad_id": "p1",
                    "read_only_pad_id": null
                }
            }
        }"#;

        let block = SharedNotePadFeatures::from_room_metadata_json(raw).unwrap();

        assert!(block.allowed);
        assert!(!block.is_active);
        assert_eq!(block.host_id, "pad-1");
        assert_eq!(block.pad_id, "p1");
        assert_eq!(block.read_only_pad_id, "");
    }

    #[test]
    fn test_block_only_read_without_block() {
        let block = SharedNotePadFeatures::from_room_metadata_json(r#"{"features": 7}"#).unwrap();
        assert_eq!(block, SharedNotePadFeatures::default());

        assert!(SharedNotePadFeatures::from_room_metadata_json("not json").is_err());
    }
}
