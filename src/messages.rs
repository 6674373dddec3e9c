//! Wire envelope and message type taxonomy.
//!
//! Every frame on the channel is a JSON object
//! `{ "type": <string>, "data": <object>, "timestamp": <integer epoch ms> }`.
//! The backend's `pong` reply carries only the `type` field, so `data` and
//! `timestamp` default when absent; only a missing or non-string `type` (or
//! non-JSON input) fails decoding.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DecodeError;

/// Message type discriminator.
///
/// The taxonomy is fixed but open: tags the client does not know about decode
/// into [`EventType::Other`] and are ignored by dispatch rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Server → Client greeting after a successful handshake.
    Connected,
    /// Server → Client heartbeat reply.
    Pong,
    /// Server → Client: a new match was found.
    NewMatch,
    /// Server → Client: the other party accepted a match.
    MatchAccepted,
    /// Server → Client: a match was confirmed by both parties.
    MatchConfirmed,
    /// Server → Client: a match was rejected.
    MatchRejected,
    /// Server → Client: a new chat message arrived.
    NewMessage,
    /// Server → Client: a system notification was created.
    Notification,
    /// Client → Server keep-alive.
    Ping,
    /// Any tag not in the fixed taxonomy.
    #[serde(untagged)]
    Other(String),
}

impl EventType {
    /// Returns the wire tag for this type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Connected => "connected",
            Self::Pong => "pong",
            Self::NewMatch => "new_match",
            Self::MatchAccepted => "match_accepted",
            Self::MatchConfirmed => "match_confirmed",
            Self::MatchRejected => "match_rejected",
            Self::NewMessage => "new_message",
            Self::Notification => "notification",
            Self::Ping => "ping",
            Self::Other(tag) => tag,
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single unit of data exchanged over the channel.
///
/// Envelopes are immutable once received and never persisted; a frame missed
/// while disconnected is permanently lost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Message type tag.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Type-specific payload, opaque to the connection layer.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
    /// Epoch milliseconds at which the sender produced the envelope.
    #[serde(default)]
    pub timestamp: i64,
}

impl Envelope {
    /// Creates an envelope stamped with the current time.
    #[must_use]
    pub fn new(event_type: EventType, data: Value) -> Self {
        Self {
            event_type,
            data,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// Creates the keep-alive envelope sent on each heartbeat.
    #[must_use]
    pub fn ping() -> Self {
        Self::new(EventType::Ping, Value::Null)
    }
}

/// Decodes a text frame into an [`Envelope`].
///
/// # Errors
///
/// Returns a [`DecodeError`] for non-JSON input or a missing/ill-typed
/// `type` field. The caller logs and discards the frame.
pub fn decode(raw: &str) -> Result<Envelope, DecodeError> {
    serde_json::from_str(raw).map_err(DecodeError::from)
}

/// Encodes an [`Envelope`] as a text frame.
///
/// # Errors
///
/// Returns a [`DecodeError`] if serialization fails.
pub fn encode(envelope: &Envelope) -> Result<String, DecodeError> {
    serde_json::to_string(envelope).map_err(DecodeError::from)
}
