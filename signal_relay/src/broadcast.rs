//! Fan-out of one message to several peers

use crate::connection::ConnectionHandle;
use crate::protocol::{PeerId, ServerMessage};
use crate::state::{Registry, RoomId};
use tracing::warn;

/// Send `message` to every connection in turn.
///
/// A failed send is logged and skipped; the remaining connections still get
/// the message. Returns how many sends succeeded.
pub async fn deliver(connections: &[ConnectionHandle], message: &ServerMessage) -> usize {
    let payload = message.to_string();
    let mut delivered = 0;
    for connection in connections {
        match connection.send(payload.clone()).await {
            Ok(()) => delivered += 1,
            Err(err) => warn!(%err, "Failed to deliver message"),
        }
    }
    delivered
}

/// Send `message` to the members of a room, optionally skipping one peer.
///
/// Membership is snapshotted first; the registry lock is released before
/// anything goes out on the wire.
pub async fn broadcast_room(
    registry: &Registry,
    room_id: &RoomId,
    message: &ServerMessage,
    exclude: Option<&PeerId>,
) -> usize {
    let targets = registry.snapshot_room(room_id, exclude);
    deliver(&targets, message).await
}
