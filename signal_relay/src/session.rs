//! Per-connection lifecycle
//!
//! A session starts `Unjoined`, moves to `Joined` on a successful join, back
//! to `Unjoined` on leave, and ends `Terminated` once the connection is gone.

use crate::broadcast::{broadcast_room, deliver};
use crate::connection::ConnectionHandle;
use crate::error::ClientRequestError;
use crate::handler;
use crate::protocol::{PeerId, PeerSummary, ServerMessage, SignalKind};
use crate::state::{Departure, Registry, RoomId};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unjoined,
    Joined { room: RoomId, name: String },
    Terminated,
}

/// One connected peer
pub struct Session {
    id: PeerId,
    registry: Registry,
    connection: ConnectionHandle,
    state: SessionState,
}

impl Session {
    /// Create a session for a freshly accepted connection with a new peer id
    pub fn new(registry: Registry, connection: ConnectionHandle) -> Self {
        Self {
            id: PeerId::random(),
            registry,
            connection,
            state: SessionState::Unjoined,
        }
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_terminated(&self) -> bool {
        self.state == SessionState::Terminated
    }

    fn room(&self) -> Option<&RoomId> {
        match &self.state {
            SessionState::Joined { room, .. } => Some(room),
            _ => None,
        }
    }

    /// Decode and act on one inbound text frame
    pub async fn handle_frame(&mut self, frame: &str) {
        handler::dispatch(self, frame).await;
    }

    /// Send a message back to this peer. Failures are logged only.
    pub(crate) async fn reply(&self, message: ServerMessage) {
        if let Err(err) = self.connection.send(message.to_string()).await {
            warn!(peer = %self.id, %err, "Failed to reply");
        }
    }

    pub(crate) async fn reject(&self, err: ClientRequestError) {
        debug!(peer = %self.id, %err, "Rejected client request");
        self.reply(ServerMessage::error(&err)).await;
    }

    pub(crate) async fn join(&mut self, room: String, name: Option<String>) {
        if room.is_empty() {
            self.reject(ClientRequestError::RoomRequired).await;
            return;
        }
        let room = RoomId(room);
        let name = name.unwrap_or_else(|| format!("User-{}", self.id.short()));

        let outcome = self.registry.join(
            room.clone(),
            self.id,
            name.clone(),
            Arc::clone(&self.connection),
        );
        if let Some(previous) = &outcome.vacated {
            info!(peer = %self.id, room = %previous.room, "Peer moved out of room");
            self.announce_departure(previous).await;
        }
        info!(peer = %self.id, %room, %name, existing = outcome.peers.len(), "Peer joined room");
        self.state = SessionState::Joined {
            room: room.clone(),
            name: name.clone(),
        };

        self.reply(ServerMessage::Joined {
            self_id: self.id,
            peers: outcome.peers,
        })
        .await;
        // Only the members captured with the snapshot; later joiners already
        // see this peer in their own snapshot.
        let new_peer = ServerMessage::NewPeer { id: self.id, name };
        deliver(&outcome.announce_to, &new_peer).await;
    }

    /// Voluntary leave. Always acknowledged, even when not joined.
    pub(crate) async fn leave(&mut self) {
        if let Some(departure) = self.registry.leave(&self.id) {
            info!(peer = %self.id, room = %departure.room, "Peer left room");
            self.announce_departure(&departure).await;
        }
        self.state = SessionState::Unjoined;
        self.reply(ServerMessage::Left).await;
    }

    /// Route an offer, answer or candidate to exactly one peer
    pub(crate) async fn forward(&self, kind: SignalKind, to: Value, payload: Value) {
        let target = to
            .as_str()
            .and_then(|to| to.parse::<PeerId>().ok())
            .and_then(|id| self.registry.resolve_target(&id, self.room()));

        let Some(target) = target else {
            debug!(peer = %self.id, %to, kind = kind.as_str(), "Target peer unavailable");
            self.reply(ServerMessage::PeerUnavailable { to }).await;
            return;
        };

        debug!(peer = %self.id, %to, kind = kind.as_str(), "Forwarding signal");
        let message = ServerMessage::signal(kind, self.id, payload);
        deliver(&[target], &message).await;
    }

    /// Chat text goes to the whole room, sender included
    pub(crate) async fn chat(&self, message: String) {
        let SessionState::Joined { room, name } = &self.state else {
            debug!(peer = %self.id, "Dropping text from unjoined peer");
            return;
        };
        let text = ServerMessage::Text {
            from: PeerSummary {
                id: self.id,
                name: name.clone(),
            },
            message,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        broadcast_room(&self.registry, room, &text, None).await;
    }

    /// Clean up after the connection closed. Runs at most once.
    pub async fn disconnect(&mut self) {
        if self.is_terminated() {
            return;
        }
        if let Some(departure) = self.registry.leave(&self.id) {
            self.announce_departure(&departure).await;
        }
        self.state = SessionState::Terminated;
        if let Err(err) = self.connection.close().await {
            debug!(peer = %self.id, %err, "Close after disconnect failed");
        }
        info!(peer = %self.id, "Peer disconnected");
    }

    async fn announce_departure(&self, departure: &Departure) {
        let leave = ServerMessage::Leave { id: self.id };
        deliver(&departure.remaining, &leave).await;
    }
}
