// SPDX-License-Identifier: Apache-2.0
//
// Pairing channel logic: session identity, the secondary device's bounded
// handshake announcements, and the polling consumers on both ends.
//
// # Security
//
// The secret token travels with every message but is only checked for
// presence, not cryptographically bound to the session id. Anyone who can
// read the bus can impersonate a peer. This matches the current deployment
// (single shared in-process bus); a networked bus needs the token folded
// into a MAC over each message before this channel can be trusted across
// hosts.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use veriport_core::config::PairingConfig;
use veriport_core::error::{Result, VeriportError};
use veriport_core::types::{PassportValidation, SessionId};

use crate::bus::MessageBus;
use crate::message::{MessageKind, PairingMessage};

/// Identity of one pairing session, shared between devices via the URL.
#[derive(Debug, Clone, PartialEq)]
pub struct PairingSession {
    pub session_id: SessionId,
    pub secret_token: String,
    pub created_at: DateTime<Utc>,
}

impl PairingSession {
    pub fn new() -> Self {
        Self {
            session_id: SessionId::new(),
            secret_token: Uuid::new_v4().simple().to_string(),
            created_at: Utc::now(),
        }
    }

    /// Reconstruct a session on the secondary device from URL parameters.
    pub fn from_parts(session_id: SessionId, secret_token: impl Into<String>) -> Self {
        Self {
            session_id,
            secret_token: secret_token.into(),
            created_at: Utc::now(),
        }
    }

    /// The URL the secondary device scans or opens.
    pub fn pairing_url(&self, base: &str) -> String {
        format!(
            "{base}?session={}&token={}",
            self.session_id, self.secret_token
        )
    }

    /// Structural validity: a non-empty id and token.
    ///
    /// This is presence checking only — see the module docs for why the
    /// token does not authenticate anything on its own.
    pub fn validate(&self) -> Result<()> {
        if self.secret_token.trim().is_empty() {
            return Err(VeriportError::SessionInvalid(
                "secret token is empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for PairingSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Which end of the pairing this channel instance is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceRole {
    /// The device that created the session (shows the URL).
    Primary,
    /// The device that joined via the URL (captures).
    Secondary,
}

impl DeviceRole {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }
}

/// One end of a pairing session on top of a [`MessageBus`].
pub struct PairingChannel {
    bus: Arc<dyn MessageBus>,
    session: PairingSession,
    role: DeviceRole,
    config: PairingConfig,
    /// Highest bus sequence this end has consumed.
    cursor: AtomicU64,
}

impl PairingChannel {
    pub fn new(
        bus: Arc<dyn MessageBus>,
        session: PairingSession,
        role: DeviceRole,
        config: PairingConfig,
    ) -> Result<Self> {
        session.validate()?;
        Ok(Self {
            bus,
            session,
            role,
            config,
            cursor: AtomicU64::new(0),
        })
    }

    pub fn session(&self) -> &PairingSession {
        &self.session
    }

    /// Build an outgoing message, tagging object payloads with this end's
    /// role so both ends can tell counterpart traffic from their own echo.
    fn message(&self, kind: MessageKind, mut payload: Value) -> PairingMessage {
        if let Value::Object(map) = &mut payload {
            map.insert(
                "role".to_string(),
                Value::String(self.role.as_str().to_string()),
            );
        }
        PairingMessage::new(
            kind,
            self.session.session_id.to_string(),
            self.session.secret_token.clone(),
            payload,
        )
    }

    /// Announce this secondary device until the primary acknowledges.
    ///
    /// Publishes a `connected` message every announce interval, up to the
    /// configured attempt budget, watching for the primary's `connected`
    /// acknowledgement between sends. Exhaustion is the terminal
    /// [`VeriportError::PairingTimeout`]. Flipping `cancel` to `true` stops
    /// the loop without an error.
    #[instrument(skip_all, fields(session = %self.session.session_id))]
    pub async fn announce_connected(&self, cancel: &mut watch::Receiver<bool>) -> Result<bool> {
        let mut interval = tokio::time::interval(self.config.announce_interval());

        for attempt in 0..self.config.max_announce_attempts {
            tokio::select! {
                _ = interval.tick() => {}
                changed = cancel.changed() => {
                    // A dropped sender means nobody can un-cancel us.
                    if changed.is_err() {
                        info!(attempt, "cancel handle dropped; stopping announce loop");
                        return Ok(false);
                    }
                }
            }
            if *cancel.borrow() {
                info!(attempt, "announce loop cancelled");
                return Ok(false);
            }

            self.bus.publish(self.message(
                MessageKind::Connected,
                json!({ "attempt": attempt }),
            ))?;
            debug!(attempt, "announced");

            if self.peer_connected()? {
                info!(attempt, "primary acknowledged");
                return Ok(true);
            }
        }

        warn!(
            attempts = self.config.max_announce_attempts,
            "primary never acknowledged"
        );
        Err(VeriportError::PairingTimeout(
            self.config.max_announce_attempts,
        ))
    }

    /// Wait for the counterpart's `connected` announcement and acknowledge
    /// it. Used on the primary while its UI shows the pairing URL.
    #[instrument(skip_all, fields(session = %self.session.session_id))]
    pub async fn await_connection(&self, cancel: &mut watch::Receiver<bool>) -> Result<bool> {
        let mut interval = tokio::time::interval(self.config.poll_interval());

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                changed = cancel.changed() => {
                    if changed.is_err() {
                        info!("cancel handle dropped; stopping wait");
                        return Ok(false);
                    }
                }
            }
            if *cancel.borrow() {
                return Ok(false);
            }

            if self.peer_connected()? {
                self.bus.publish(self.message(
                    MessageKind::Connected,
                    json!({ "ack": true }),
                ))?;
                info!("secondary connected");
                return Ok(true);
            }
        }
    }

    /// Whether the counterpart role has announced on this session.
    fn peer_connected(&self) -> Result<bool> {
        let session_id = self.session.session_id.to_string();
        let all = self.bus.fetch_after(&session_id, 0)?;
        Ok(all.iter().any(|s| {
            s.message.kind == MessageKind::Connected
                && s.message.payload["role"] != self.role.as_str()
        }))
    }

    /// Publish captured document fields to the counterpart.
    pub fn send_document(&self, payload: Value) -> Result<()> {
        self.bus
            .publish(self.message(MessageKind::Document, payload))?;
        Ok(())
    }

    /// Publish a captured face payload to the counterpart.
    pub fn send_face(&self, payload: Value) -> Result<()> {
        self.bus.publish(self.message(MessageKind::Face, payload))?;
        Ok(())
    }

    /// Publish the current validation checklist.
    pub fn send_validation_update(&self, validation: &PassportValidation) -> Result<()> {
        let payload = serde_json::to_value(validation)?;
        self.bus
            .publish(self.message(MessageKind::Validation, payload))?;
        Ok(())
    }

    /// Drain messages published since the last poll, excluding this end's
    /// own messages. Advances the internal cursor.
    pub fn poll_updates(&self) -> Result<Vec<PairingMessage>> {
        let session_id = self.session.session_id.to_string();
        let after = self.cursor.load(Ordering::SeqCst);
        let batch = self.bus.fetch_after(&session_id, after)?;

        let mut latest = after;
        let mut updates = Vec::new();
        for sequenced in batch {
            latest = latest.max(sequenced.seq);
            // Skip our own traffic; only handshake and counterpart data are
            // surfaced.
            if sequenced.message.payload["role"] == self.role.as_str() {
                continue;
            }
            updates.push(sequenced.message);
        }
        self.cursor.store(latest, Ordering::SeqCst);
        Ok(updates)
    }
}
