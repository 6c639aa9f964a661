//! Room metadata fixtures.

use notepad_service::models::RoomMetadata;
use serde_json::json;

/// Metadata JSON of a room with the shared notepad allowed or not, and no
/// session yet.
pub fn room_metadata_json(allowed: bool) -> String {
    json!({
        "room_title": "Weekly sync",
        "features": {
            "allow_webcams": true,
            "shared_note_pad_features": {
                "allowed_shared_note_pad": allowed,
                "is_active": false
            }
        }
    })
    .to_string()
}

/// Metadata JSON of a room holding a session on `host_id`.
pub fn room_metadata_with_session_json(host_id: &str, host_url: &str, pad_id: &str) -> String {
    json!({
        "room_title": "Weekly sync",
        "features": {
            "shared_note_pad_features": {
                "allowed_shared_note_pad": true,
                "is_active": true,
                "node_id": host_id,
                "host": host_url,
                "note_pad_id": pad_id,
                "read_only_pad_id": format!("r.{pad_id}")
            }
        }
    })
    .to_string()
}

/// Parsed form of [`room_metadata_json`].
pub fn room_metadata(allowed: bool) -> RoomMetadata {
    RoomMetadata::from_json(&room_metadata_json(allowed)).expect("fixture metadata is valid JSON")
}
