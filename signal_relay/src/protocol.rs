//! Wire messages exchanged with browser peers
//!
//! Every frame is a single JSON object carrying a `type` discriminator.
//! Inbound frames are decoded once into [`ClientMessage`]; anything that does
//! not fit becomes a [`ClientRequestError`] whose text is sent back verbatim.

use crate::error::ClientRequestError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Process-unique peer identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerId(pub Uuid);

impl PeerId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// First five characters of the hyphenated id, used for default names
    pub fn short(&self) -> String {
        self.0.to_string().chars().take(5).collect()
    }
}

impl From<Uuid> for PeerId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for PeerId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(PeerId)
    }
}

/// The three negotiation messages that are routed to a single target peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Offer => "offer",
            SignalKind::Answer => "answer",
            SignalKind::IceCandidate => "ice-candidate",
        }
    }
}

/// A validated inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// `{"type": "join", "room": "...", "name": "..."}`; `room` is trimmed
    Join { room: String, name: Option<String> },
    /// `offer`, `answer` or `ice-candidate`; `to` and the payload are kept
    /// as sent
    Signal {
        kind: SignalKind,
        to: Value,
        payload: Value,
    },
    /// `{"type": "text", "message": "..."}`
    Text { message: String },
    /// `{"type": "leave"}`
    Leave,
}

/// Loosely typed view of a frame before validation.
///
/// JSON `null` is treated the same as an absent field.
#[derive(Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: Option<Value>,
    room: Option<Value>,
    name: Option<Value>,
    to: Option<Value>,
    sdp: Option<Value>,
    candidate: Option<Value>,
    message: Option<Value>,
}

/// Strings pass through; any other JSON value is rendered as JSON text.
fn coerce_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// `null`, `false`, zero and empty strings, arrays or objects
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
    }
}

impl FromStr for ClientMessage {
    type Err = ClientRequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: Value = serde_json::from_str(s).map_err(|_| ClientRequestError::InvalidJson)?;
        if !value.is_object() {
            return Err(ClientRequestError::UnknownType);
        }
        let frame: RawFrame =
            serde_json::from_value(value).map_err(|_| ClientRequestError::UnknownType)?;

        let kind = match frame.kind {
            Some(Value::String(kind)) => kind,
            _ => return Err(ClientRequestError::UnknownType),
        };

        let signal = match kind.as_str() {
            "join" => {
                let room = frame.room.map(coerce_text).unwrap_or_default();
                return Ok(ClientMessage::Join {
                    room: room.trim().to_string(),
                    name: frame.name.map(coerce_text).filter(|name| !name.is_empty()),
                });
            }
            "text" => {
                return Ok(ClientMessage::Text {
                    message: frame.message.map(coerce_text).unwrap_or_default(),
                });
            }
            "leave" => return Ok(ClientMessage::Leave),
            "offer" => SignalKind::Offer,
            "answer" => SignalKind::Answer,
            "ice-candidate" => SignalKind::IceCandidate,
            _ => return Err(ClientRequestError::UnknownType),
        };

        let to = frame
            .to
            .filter(|to| !is_blank(to))
            .ok_or(ClientRequestError::MissingTarget)?;
        let payload = match signal {
            SignalKind::Offer | SignalKind::Answer => frame.sdp,
            SignalKind::IceCandidate => frame.candidate,
        };

        Ok(ClientMessage::Signal {
            kind: signal,
            to,
            payload: payload.unwrap_or(Value::Null),
        })
    }
}

/// Id and display name of a joined peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerSummary {
    pub id: PeerId,
    pub name: String,
}

/// Messages sent from the relay to a peer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Reply to a successful join with the members that were already present
    Joined {
        #[serde(rename = "selfId")]
        self_id: PeerId,
        peers: Vec<PeerSummary>,
    },
    /// Someone joined the room
    NewPeer { id: PeerId, name: String },
    Offer { from: PeerId, sdp: Value },
    Answer { from: PeerId, sdp: Value },
    IceCandidate { from: PeerId, candidate: Value },
    /// The target of a routed message is not connected; `to` is echoed as sent
    PeerUnavailable { to: Value },
    /// Chat text, delivered to the whole room
    Text {
        from: PeerSummary,
        message: String,
        timestamp: String,
    },
    /// Someone left the room, voluntarily or by disconnecting
    Leave { id: PeerId },
    /// Acknowledges a `leave` request
    Left,
    Error { message: String },
}

impl ServerMessage {
    pub fn signal(kind: SignalKind, from: PeerId, payload: Value) -> Self {
        match kind {
            SignalKind::Offer => ServerMessage::Offer { from, sdp: payload },
            SignalKind::Answer => ServerMessage::Answer { from, sdp: payload },
            SignalKind::IceCandidate => ServerMessage::IceCandidate {
                from,
                candidate: payload,
            },
        }
    }

    pub fn error(err: &ClientRequestError) -> Self {
        ServerMessage::Error {
            message: err.to_string(),
        }
    }
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}
