// SPDX-License-Identifier: Apache-2.0
//
// Pairing wire format.
//
// Messages are JSON with camelCase keys so either end of the channel can be
// a browser or a native peer without translation:
//
// ```json
// {
//   "type": "document",
//   "sessionId": "…",
//   "secretToken": "…",
//   "timestamp": "2026-08-31T12:00:00Z",
//   "payload": { … }
// }
// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Discriminant of a pairing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Handshake announcement (and its acknowledgement).
    Connected,
    /// Captured document data.
    Document,
    /// Captured face data.
    Face,
    /// Validation checklist update.
    Validation,
}

/// One message on the pairing channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub session_id: String,
    pub secret_token: String,
    pub timestamp: DateTime<Utc>,
    pub payload: Value,
}

impl PairingMessage {
    pub fn new(
        kind: MessageKind,
        session_id: impl Into<String>,
        secret_token: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            kind,
            session_id: session_id.into(),
            secret_token: secret_token.into(),
            timestamp: Utc::now(),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_format_is_camel_case() {
        let msg = PairingMessage::new(
            MessageKind::Document,
            "session-1",
            "token-1",
            json!({"passportNumber": "L898902C3"}),
        );
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "document");
        assert_eq!(value["sessionId"], "session-1");
        assert_eq!(value["secretToken"], "token-1");
        assert!(value["timestamp"].is_string());
        assert_eq!(value["payload"]["passportNumber"], "L898902C3");
    }

    #[test]
    fn kind_round_trips() {
        for kind in [
            MessageKind::Connected,
            MessageKind::Document,
            MessageKind::Face,
            MessageKind::Validation,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            let back: MessageKind = serde_json::from_str(&json).unwrap();
            assert_eq!(back, kind);
        }
    }

    #[test]
    fn foreign_peer_message_parses() {
        let raw = r#"{
            "type": "connected",
            "sessionId": "abc",
            "secretToken": "tok",
            "timestamp": "2026-08-31T09:00:00Z",
            "payload": {"role": "secondary"}
        }"#;
        let msg: PairingMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.kind, MessageKind::Connected);
        assert_eq!(msg.payload["role"], "secondary");
    }
}
