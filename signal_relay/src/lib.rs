//! WebSocket signaling relay for WebRTC peers
//!
//! Browser peers connect to a single WebSocket endpoint, join a named room and
//! then exchange offers, answers and ICE candidates with each other by peer
//! id. The relay never looks inside those payloads and keeps nothing on disk.
//!
//! # Protocol
//!
//! One JSON object per text frame, discriminated by `type`.
//!
//! ## Client → server
//!
//! - `{"type": "join", "room": "<name>", "name": "<display name>"}`
//! - `{"type": "offer" | "answer", "to": "<peer id>", "sdp": ...}`
//! - `{"type": "ice-candidate", "to": "<peer id>", "candidate": ...}`
//! - `{"type": "text", "message": "..."}`
//! - `{"type": "leave"}`
//!
//! ## Server → client
//!
//! - `{"type": "joined", "selfId": "<uuid>", "peers": [{"id", "name"}]}` - Your id and who was already there
//! - `{"type": "new-peer", "id": "<uuid>", "name": "..."}` - New peer joined
//! - `{"type": "leave", "id": "<uuid>"}` - Peer left or disconnected
//! - `{"type": "offer" | "answer", "from": "<uuid>", "sdp": ...}` - Signal from peer
//! - `{"type": "ice-candidate", "from": "<uuid>", "candidate": ...}`
//! - `{"type": "text", "from": {"id", "name"}, "message": "...", "timestamp": "<rfc3339>"}`
//! - `{"type": "peer-unavailable", "to": "..."}` - Target is not connected
//! - `{"type": "left"}` - Your leave was processed
//! - `{"type": "error", "message": "..."}`
//!
//! # Example
//!
//! ```bash
//! # Start the server
//! signal-relay --port 8001
//!
//! # Health check
//! curl http://127.0.0.1:8001/api/health
//!
//! # Signaling endpoint
//! websocat ws://127.0.0.1:8001/api/ws
//! ```

#![forbid(unsafe_code)]

pub mod broadcast;
pub mod config;
pub mod connection;
pub mod error;
pub mod handler;
pub mod protocol;
pub mod server;
pub mod session;
pub mod state;

pub use config::Config;
pub use connection::{ChannelConnection, Connection, ConnectionHandle};
pub use error::{ClientRequestError, SignalingError};
pub use protocol::{ClientMessage, PeerId, ServerMessage};
pub use server::{build_app, serve};
pub use session::Session;
pub use state::{Registry, RoomId};
