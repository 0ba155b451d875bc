//! JSON text protocol spoken over the live-update WebSocket.
//!
//! Every frame is adjacently tagged with `channel` and an optional `payload`:
//!
//! ```text
//! client → server   {"channel":"join","payload":{"listSlug":"groceries"}}
//!                   {"channel":"ping"}
//!
//! server → client   {"channel":"joined","payload":{"listSlug":"groceries"}}
//!                   {"channel":"ItemsAdded","payload":{"listSlug":…,"items":[…]}}
//!                   {"channel":"ItemCompleted","payload":{"listSlug":…,"item":{…}}}
//!                   {"channel":"ItemDeleted","payload":{"listSlug":…,"itemId":5}}
//!                   {"channel":"pong"}
//!                   {"channel":"error","payload":{"message":"…"}}
//! ```
//!
//! Events are encoded once per publish and shared between all recipients.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use shoplist_core::{ListEvent, ListSlug};
use thiserror::Error;

/// Channels that carry a [`ListEvent`].
pub const EVENT_CHANNELS: [&str; 3] = ["ItemsAdded", "ItemCompleted", "ItemDeleted"];

/// Frames a client may send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "channel",
    content = "payload",
    rename_all = "lowercase",
    rename_all_fields = "camelCase"
)]
pub enum ClientFrame {
    /// Subscribe this connection to a list's room.
    Join { list_slug: ListSlug },
    Ping,
}

/// Non-event frames sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "channel",
    content = "payload",
    rename_all = "lowercase",
    rename_all_fields = "camelCase"
)]
pub enum ControlFrame {
    /// Join acknowledgment; events published from here on are delivered.
    Joined { list_slug: ListSlug },
    Pong,
    Error { message: String },
}

/// Anything the server sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ServerFrame {
    Event(ListEvent),
    Control(ControlFrame),
}

/// Protocol errors.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to decode frame: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("malformed {channel} event: {reason}")]
    MalformedEvent { channel: String, reason: String },
    #[error("invalid handshake header: {0}")]
    InvalidHeader(String),
    #[error("websocket error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("connection closed")]
    ConnectionClosed,
}

impl ClientFrame {
    pub fn join(list_slug: ListSlug) -> Self {
        Self::Join { list_slug }
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Decode)
    }
}

impl ControlFrame {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }
}

impl ServerFrame {
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    /// Decode and validate a server frame.
    ///
    /// Event channels are checked against the event schema so a corrupted
    /// update surfaces as [`ProtocolError::MalformedEvent`] rather than a
    /// generic decode error.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let value: serde_json::Value = serde_json::from_str(text).map_err(ProtocolError::Decode)?;
        let channel = value
            .get("channel")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_owned();

        if !EVENT_CHANNELS.contains(&channel.as_str()) {
            return serde_json::from_value(value)
                .map(ServerFrame::Control)
                .map_err(ProtocolError::Decode);
        }

        let event: ListEvent =
            serde_json::from_value(value).map_err(|e| ProtocolError::MalformedEvent {
                channel: channel.clone(),
                reason: e.to_string(),
            })?;
        event.validate().map_err(|e| ProtocolError::MalformedEvent {
            channel,
            reason: e.to_string(),
        })?;
        Ok(ServerFrame::Event(event))
    }
}

/// Encode an event once for fan-out.
pub fn encode_event(event: &ListEvent) -> Result<Arc<str>, ProtocolError> {
    serde_json::to_string(event)
        .map(Arc::from)
        .map_err(ProtocolError::Encode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shoplist_core::{ItemSnapshot, UserIdentity};

    fn slug() -> ListSlug {
        ListSlug::parse("groceries").unwrap()
    }

    #[test]
    fn test_join_frame_shape() {
        let encoded = ClientFrame::join(slug()).encode().unwrap();
        assert_eq!(
            encoded,
            r#"{"channel":"join","payload":{"listSlug":"groceries"}}"#
        );
        assert_eq!(ClientFrame::decode(&encoded).unwrap(), ClientFrame::join(slug()));
    }

    #[test]
    fn test_ping_has_no_payload() {
        assert_eq!(ClientFrame::Ping.encode().unwrap(), r#"{"channel":"ping"}"#);
        assert_eq!(
            ClientFrame::decode(r#"{"channel":"ping"}"#).unwrap(),
            ClientFrame::Ping
        );
    }

    #[test]
    fn test_join_with_bad_slug_rejected() {
        assert!(ClientFrame::decode(r#"{"channel":"join","payload":{"listSlug":""}}"#).is_err());
        assert!(ClientFrame::decode(r#"{"channel":"join"}"#).is_err());
    }

    #[test]
    fn test_event_frame_is_bare_event() {
        let event = ListEvent::item_deleted(slug(), 5);
        let frame = ServerFrame::Event(event.clone()).encode().unwrap();
        assert_eq!(frame, &*encode_event(&event).unwrap());
        assert_eq!(ServerFrame::decode(&frame).unwrap(), ServerFrame::Event(event));
    }

    #[test]
    fn test_control_frames_decode() {
        let joined = ServerFrame::Control(ControlFrame::Joined { list_slug: slug() });
        let text = joined.encode().unwrap();
        assert_eq!(text, r#"{"channel":"joined","payload":{"listSlug":"groceries"}}"#);
        assert_eq!(ServerFrame::decode(&text).unwrap(), joined);

        let error = ServerFrame::Control(ControlFrame::error("nope"));
        assert_eq!(ServerFrame::decode(&error.encode().unwrap()).unwrap(), error);
    }

    #[test]
    fn test_malformed_event_reported_with_channel() {
        let raw = r#"{"channel":"ItemDeleted","payload":{"listSlug":"groceries","itemId":"five"}}"#;
        match ServerFrame::decode(raw) {
            Err(ProtocolError::MalformedEvent { channel, .. }) => assert_eq!(channel, "ItemDeleted"),
            other => panic!("expected MalformedEvent, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_event_rejected_by_validation() {
        let item = ItemSnapshot::new(3, "Tea", Utc::now(), UserIdentity::new("u1", "Jane"));
        let text = encode_event(&ListEvent::item_completed(slug(), item)).unwrap();
        assert!(matches!(
            ServerFrame::decode(&text),
            Err(ProtocolError::MalformedEvent { .. })
        ));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            ServerFrame::decode("not json"),
            Err(ProtocolError::Decode(_))
        ));
        assert!(matches!(
            ServerFrame::decode(r#"{"channel":"mystery"}"#),
            Err(ProtocolError::Decode(_))
        ));
    }
}
