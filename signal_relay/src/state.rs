//! Registry of rooms and joined peers
//!
//! This module is the single source of truth for "who is where". All
//! mutation goes through one mutex that is held for the bookkeeping only and
//! never across a network send.

use crate::connection::ConnectionHandle;
use crate::protocol::{PeerId, PeerSummary};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Room identifier
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct RoomId(pub String);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(room: &str) -> Self {
        Self(room.to_string())
    }
}

/// Metadata of a joined peer
struct PeerState {
    name: String,
    room: RoomId,
    connection: ConnectionHandle,
}

#[derive(Default)]
struct InnerState {
    /// Map of peer ID -> peer state
    peers: HashMap<PeerId, PeerState>,
    /// Map of room -> members in join order
    rooms: HashMap<RoomId, Vec<PeerId>>,
}

impl InnerState {
    /// Drop a peer from its room and from the peer map, evicting the room if
    /// it became empty. Returns the room the peer was in and who is left.
    fn remove_peer(&mut self, peer_id: &PeerId) -> Option<Departure> {
        let peer = self.peers.remove(peer_id)?;
        let mut remaining = Vec::new();
        if let Some(members) = self.rooms.get_mut(&peer.room) {
            members.retain(|id| id != peer_id);
            if members.is_empty() {
                self.rooms.remove(&peer.room);
            } else {
                remaining = members
                    .iter()
                    .filter_map(|id| self.peers.get(id))
                    .map(|member| Arc::clone(&member.connection))
                    .collect();
            }
        }
        Some(Departure {
            room: peer.room,
            remaining,
        })
    }
}

/// A peer's removal from a room, as seen under the registry lock
pub struct Departure {
    /// Room the peer was in
    pub room: RoomId,
    /// Connections of the members still in that room
    pub remaining: Vec<ConnectionHandle>,
}

/// Result of [`Registry::join`]
pub struct JoinOutcome {
    /// Members that were already in the room, in join order
    pub peers: Vec<PeerSummary>,
    /// Connections of those same members, to announce the newcomer to
    pub announce_to: Vec<ConnectionHandle>,
    /// Room the peer was moved out of, if it was joined elsewhere
    pub vacated: Option<Departure>,
}

/// Shared registry handle. Clones refer to the same state.
#[derive(Default, Clone)]
pub struct Registry {
    inner: Arc<Mutex<InnerState>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, InnerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Put a peer into a room and return who was there before it.
    ///
    /// The snapshot, the announcement targets and the insertion happen under
    /// the same lock, so a peer joining concurrently either shows up in the
    /// snapshot or is announced to, never both.
    pub fn join(
        &self,
        room_id: RoomId,
        peer_id: PeerId,
        name: String,
        connection: ConnectionHandle,
    ) -> JoinOutcome {
        let mut state = self.lock();

        let previous_room = state.peers.get(&peer_id).map(|peer| peer.room.clone());
        let vacated = match previous_room {
            Some(previous) if previous != room_id => state.remove_peer(&peer_id),
            _ => None,
        };

        let InnerState { peers, rooms } = &mut *state;
        let members = rooms.entry(room_id.clone()).or_default();

        // Get existing peers in the room before adding the new one
        let (snapshot, announce_to): (Vec<PeerSummary>, Vec<ConnectionHandle>) = members
            .iter()
            .filter(|id| **id != peer_id)
            .filter_map(|id| {
                peers.get(id).map(|peer| {
                    let summary = PeerSummary {
                        id: *id,
                        name: peer.name.clone(),
                    };
                    (summary, Arc::clone(&peer.connection))
                })
            })
            .unzip();

        if !members.contains(&peer_id) {
            members.push(peer_id);
        }
        peers.insert(
            peer_id,
            PeerState {
                name,
                room: room_id,
                connection,
            },
        );

        JoinOutcome {
            peers: snapshot,
            announce_to,
            vacated,
        }
    }

    /// Remove a peer from its room. Returns the room it left together with
    /// the members to notify, or `None` if it was not joined, so calling this
    /// twice is harmless.
    pub fn leave(&self, peer_id: &PeerId) -> Option<Departure> {
        self.lock().remove_peer(peer_id)
    }

    /// Find the connection of `peer_id`.
    ///
    /// `preferred` is searched first; when the peer is not there every other
    /// room is scanned too, so a peer can address someone in a different room.
    pub fn resolve_target(
        &self,
        peer_id: &PeerId,
        preferred: Option<&RoomId>,
    ) -> Option<ConnectionHandle> {
        let state = self.lock();
        let in_preferred = preferred
            .and_then(|room| state.rooms.get(room))
            .is_some_and(|members| members.contains(peer_id));
        let found = in_preferred || state.rooms.values().any(|members| members.contains(peer_id));
        if !found {
            return None;
        }
        state
            .peers
            .get(peer_id)
            .map(|peer| Arc::clone(&peer.connection))
    }

    /// Point-in-time list of member connections, in join order.
    pub fn snapshot_room(&self, room_id: &RoomId, exclude: Option<&PeerId>) -> Vec<ConnectionHandle> {
        let state = self.lock();
        let Some(members) = state.rooms.get(room_id) else {
            return Vec::new();
        };
        members
            .iter()
            .filter(|id| Some(*id) != exclude)
            .filter_map(|id| state.peers.get(id))
            .map(|peer| Arc::clone(&peer.connection))
            .collect()
    }

    /// Ids and names of a room's members, in join order.
    pub fn room_members(&self, room_id: &RoomId) -> Vec<PeerSummary> {
        let state = self.lock();
        state
            .rooms
            .get(room_id)
            .map(|members| {
                members
                    .iter()
                    .filter_map(|id| {
                        state.peers.get(id).map(|peer| PeerSummary {
                            id: *id,
                            name: peer.name.clone(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Room a peer is currently joined to
    pub fn room_of(&self, peer_id: &PeerId) -> Option<RoomId> {
        self.lock().peers.get(peer_id).map(|peer| peer.room.clone())
    }

    /// Number of rooms with at least one member
    pub fn room_count(&self) -> usize {
        self.lock().rooms.len()
    }

    /// Number of peers currently joined to a room
    pub fn peer_count(&self) -> usize {
        self.lock().peers.len()
    }
}
