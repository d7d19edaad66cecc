// SPDX-License-Identifier: Apache-2.0
//
// Message bus abstraction for the pairing channel.
//
// The channel logic only knows `publish` and `fetch_after`; polling an
// append-only store and a push transport are both valid implementations.
// The in-memory bus is the store both ends share in tests and in
// single-process demos.

use std::sync::Mutex;

use veriport_core::error::Result;

use crate::message::PairingMessage;

/// A message with its position in the bus's append order.
#[derive(Debug, Clone, PartialEq)]
pub struct Sequenced {
    /// 1-based append sequence number, strictly increasing per bus.
    pub seq: u64,
    pub message: PairingMessage,
}

/// Transport between the paired devices.
pub trait MessageBus: Send + Sync {
    /// Append a message, returning its sequence number.
    fn publish(&self, message: PairingMessage) -> Result<u64>;

    /// Messages for `session_id` with a sequence number greater than
    /// `after`, in append order.
    fn fetch_after(&self, session_id: &str, after: u64) -> Result<Vec<Sequenced>>;
}

/// Append-only in-process bus shared by both ends of a session.
#[derive(Debug, Default)]
pub struct InMemoryBus {
    messages: Mutex<Vec<PairingMessage>>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<PairingMessage>> {
        // A poisoned lock means a writer panicked mid-append; the Vec is
        // still structurally sound, so recover rather than cascade.
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl MessageBus for InMemoryBus {
    fn publish(&self, message: PairingMessage) -> Result<u64> {
        let mut messages = self.lock();
        messages.push(message);
        Ok(messages.len() as u64)
    }

    fn fetch_after(&self, session_id: &str, after: u64) -> Result<Vec<Sequenced>> {
        let messages = self.lock();
        Ok(messages
            .iter()
            .enumerate()
            .map(|(idx, message)| Sequenced {
                seq: idx as u64 + 1,
                message: message.clone(),
            })
            .filter(|s| s.seq > after && s.message.session_id == session_id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageKind;
    use serde_json::json;

    fn msg(session: &str, kind: MessageKind) -> PairingMessage {
        PairingMessage::new(kind, session, "tok", json!({}))
    }

    #[test]
    fn publish_assigns_increasing_sequence() {
        let bus = InMemoryBus::new();
        assert_eq!(bus.publish(msg("a", MessageKind::Connected)).unwrap(), 1);
        assert_eq!(bus.publish(msg("a", MessageKind::Document)).unwrap(), 2);
    }

    #[test]
    fn fetch_after_filters_by_session_and_cursor() {
        let bus = InMemoryBus::new();
        bus.publish(msg("a", MessageKind::Connected)).unwrap();
        bus.publish(msg("b", MessageKind::Connected)).unwrap();
        bus.publish(msg("a", MessageKind::Document)).unwrap();
        bus.publish(msg("a", MessageKind::Validation)).unwrap();

        let all_a = bus.fetch_after("a", 0).unwrap();
        assert_eq!(all_a.len(), 3);
        assert!(all_a.iter().all(|s| s.message.session_id == "a"));

        // Cursor skips already-seen messages, including other sessions'.
        let tail = bus.fetch_after("a", all_a[1].seq).unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].message.kind, MessageKind::Validation);

        let none = bus.fetch_after("c", 0).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn bus_is_append_only() {
        let bus = InMemoryBus::new();
        bus.publish(msg("a", MessageKind::Connected)).unwrap();
        let first = bus.fetch_after("a", 0).unwrap();
        bus.publish(msg("a", MessageKind::Document)).unwrap();
        let second = bus.fetch_after("a", 0).unwrap();
        // Earlier messages keep their sequence numbers.
        assert_eq!(first[0], second[0]);
    }
}
