//! Inbound message dispatch
//!
//! Each text frame is decoded into a [`ClientMessage`] and routed to the
//! matching session operation. Decode failures are answered with a single
//! `error` reply and leave all state untouched.

use crate::protocol::ClientMessage;
use crate::session::Session;

/// Handle one inbound frame for `session`
pub async fn dispatch(session: &mut Session, frame: &str) {
    if session.is_terminated() {
        return;
    }

    let message = match frame.parse::<ClientMessage>() {
        Ok(message) => message,
        Err(err) => {
            session.reject(err).await;
            return;
        }
    };

    match message {
        ClientMessage::Join { room, name } => session.join(room, name).await,
        ClientMessage::Signal { kind, to, payload } => session.forward(kind, to, payload).await,
        ClientMessage::Text { message } => session.chat(message).await,
        ClientMessage::Leave => session.leave().await,
    }
}

#[cfg(test)]
mod tests {
    use crate::connection::ChannelConnection;
    use crate::protocol::{PeerSummary, ServerMessage};
    use crate::session::{Session, SessionState};
    use crate::state::Registry;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tokio::sync::mpsc::UnboundedReceiver;

    struct Peer {
        session: Session,
        rx: UnboundedReceiver<String>,
    }

    impl Peer {
        fn connect(registry: &Registry) -> Self {
            let (connection, rx) = ChannelConnection::new();
            Self {
                session: Session::new(registry.clone(), Arc::new(connection)),
                rx,
            }
        }

        async fn send(&mut self, frame: Value) {
            self.session.handle_frame(&frame.to_string()).await;
        }

        fn received(&mut self) -> Vec<Value> {
            let mut messages = Vec::new();
            while let Ok(text) = self.rx.try_recv() {
                messages.push(serde_json::from_str(&text).unwrap());
            }
            messages
        }

        fn id(&self) -> String {
            self.session.id().to_string()
        }
    }

    async fn joined(registry: &Registry, room: &str, name: &str) -> Peer {
        let mut peer = Peer::connect(registry);
        peer.send(json!({"type": "join", "room": room, "name": name})).await;
        peer.received();
        peer
    }

    #[tokio::test]
    async fn joiner_gets_snapshot_and_others_get_new_peer() {
        let registry = Registry::new();
        let mut alice = Peer::connect(&registry);
        alice.send(json!({"type": "join", "room": "e2e", "name": "Alice"})).await;
        assert_eq!(
            alice.received(),
            [json!({"type": "joined", "selfId": alice.id(), "peers": []})]
        );

        let mut bob = Peer::connect(&registry);
        bob.send(json!({"type": "join", "room": "e2e", "name": "Bob"})).await;
        assert_eq!(
            bob.received(),
            [json!({
                "type": "joined",
                "selfId": bob.id(),
                "peers": [{"id": alice.id(), "name": "Alice"}],
            })]
        );
        assert_eq!(
            alice.received(),
            [json!({"type": "new-peer", "id": bob.id(), "name": "Bob"})]
        );
    }

    #[tokio::test]
    async fn signals_are_forwarded_verbatim_with_sender() {
        let registry = Registry::new();
        let mut alice = joined(&registry, "room", "Alice").await;
        let mut bob = joined(&registry, "room", "Bob").await;
        alice.received();

        let sdp = json!({"type": "offer", "sdp": "v=0\r\n"});
        alice.send(json!({"type": "offer", "to": bob.id(), "sdp": sdp})).await;
        assert_eq!(
            bob.received(),
            [json!({"type": "offer", "from": alice.id(), "sdp": sdp})]
        );

        bob.send(json!({"type": "answer", "to": alice.id(), "sdp": "answer-sdp"})).await;
        assert_eq!(
            alice.received(),
            [json!({"type": "answer", "from": bob.id(), "sdp": "answer-sdp"})]
        );

        let candidate = json!({"candidate": "candidate:0 1 UDP 2122252543 10.0.0.1 5000 typ host", "sdpMLineIndex": 0});
        alice
            .send(json!({"type": "ice-candidate", "to": bob.id(), "candidate": candidate}))
            .await;
        assert_eq!(
            bob.received(),
            [json!({"type": "ice-candidate", "from": alice.id(), "candidate": candidate})]
        );
        assert!(alice.received().is_empty());
    }

    #[tokio::test]
    async fn unknown_target_gets_peer_unavailable() {
        let registry = Registry::new();
        let mut alice = joined(&registry, "room", "Alice").await;

        alice.send(json!({"type": "offer", "to": "nobody", "sdp": "x"})).await;
        assert_eq!(
            alice.received(),
            [json!({"type": "peer-unavailable", "to": "nobody"})]
        );

        let ghost = uuid::Uuid::new_v4().to_string();
        alice.send(json!({"type": "ice-candidate", "to": ghost, "candidate": "c"})).await;
        assert_eq!(
            alice.received(),
            [json!({"type": "peer-unavailable", "to": ghost})]
        );
    }

    #[tokio::test]
    async fn missing_target_is_an_error() {
        let registry = Registry::new();
        let mut alice = joined(&registry, "room", "Alice").await;
        let mut bob = joined(&registry, "room", "Bob").await;
        alice.received();

        alice.send(json!({"type": "offer", "sdp": "x"})).await;
        assert_eq!(
            alice.received(),
            [json!({"type": "error", "message": "missing 'to'"})]
        );
        assert!(bob.received().is_empty());
    }

    #[tokio::test]
    async fn non_string_target_is_echoed_as_sent() {
        let registry = Registry::new();
        let mut alice = joined(&registry, "room", "Alice").await;
        let mut bob = joined(&registry, "room", "Bob").await;
        alice.received();

        alice.send(json!({"type": "offer", "to": 5, "sdp": "x"})).await;
        assert_eq!(
            alice.received(),
            [json!({"type": "peer-unavailable", "to": 5})]
        );

        alice.send(json!({"type": "answer", "to": {"id": bob.id()}, "sdp": "x"})).await;
        assert_eq!(
            alice.received(),
            [json!({"type": "peer-unavailable", "to": {"id": bob.id()}})]
        );

        for to in [json!(0), json!(false), json!([])] {
            alice.send(json!({"type": "offer", "to": to, "sdp": "x"})).await;
            assert_eq!(
                alice.received(),
                [json!({"type": "error", "message": "missing 'to'"})],
                "{to}"
            );
        }
        assert!(bob.received().is_empty());
    }

    #[tokio::test]
    async fn blank_room_while_joined_keeps_current_room() {
        let registry = Registry::new();
        let mut alice = joined(&registry, "lobby", "Alice").await;
        let mut bob = joined(&registry, "lobby", "Bob").await;
        alice.received();
        let members_before = registry.room_members(&"lobby".into());

        bob.send(json!({"type": "join", "room": "  ", "name": "Bobby"})).await;

        assert_eq!(
            bob.received(),
            [json!({"type": "error", "message": "room required"})]
        );
        assert_eq!(
            bob.session.state(),
            &SessionState::Joined {
                room: "lobby".into(),
                name: "Bob".into(),
            }
        );
        assert_eq!(registry.room_members(&"lobby".into()), members_before);
        assert_eq!(registry.room_count(), 1);
        assert!(alice.received().is_empty());
    }

    #[tokio::test]
    async fn text_reaches_whole_room_including_sender() {
        let registry = Registry::new();
        let mut alice = joined(&registry, "room", "Alice").await;
        let mut bob = joined(&registry, "room", "Bob").await;
        let mut carol = joined(&registry, "elsewhere", "Carol").await;
        alice.received();

        alice.send(json!({"type": "text", "message": "hello"})).await;

        for received in [alice.received(), bob.received()] {
            assert_eq!(received.len(), 1);
            let text = &received[0];
            assert_eq!(text["type"], "text");
            assert_eq!(text["from"], json!({"id": alice.id(), "name": "Alice"}));
            assert_eq!(text["message"], "hello");
            let timestamp = text["timestamp"].as_str().unwrap();
            assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
        }
        assert!(carol.received().is_empty());
    }

    #[tokio::test]
    async fn text_from_unjoined_peer_is_dropped() {
        let registry = Registry::new();
        let mut alice = joined(&registry, "room", "Alice").await;
        let mut stranger = Peer::connect(&registry);

        stranger.send(json!({"type": "text", "message": "anyone?"})).await;

        assert!(stranger.received().is_empty());
        assert!(alice.received().is_empty());
    }

    #[tokio::test]
    async fn leave_notifies_room_and_acknowledges() {
        let registry = Registry::new();
        let mut alice = joined(&registry, "room", "Alice").await;
        let mut bob = joined(&registry, "room", "Bob").await;
        alice.received();

        bob.send(json!({"type": "leave"})).await;

        assert_eq!(bob.received(), [json!({"type": "left"})]);
        assert_eq!(alice.received(), [json!({"type": "leave", "id": bob.id()})]);
        assert_eq!(bob.session.state(), &SessionState::Unjoined);

        bob.send(json!({"type": "leave"})).await;
        assert_eq!(bob.received(), [json!({"type": "left"})]);
        assert!(alice.received().is_empty());
    }

    #[tokio::test]
    async fn bad_frames_get_one_error_and_no_mutation() {
        let registry = Registry::new();
        let mut alice = joined(&registry, "room", "Alice").await;
        let members_before = registry.room_members(&"room".into());

        alice.session.handle_frame("not json at all").await;
        assert_eq!(
            alice.received(),
            [json!({"type": "error", "message": "Invalid JSON"})]
        );

        alice.send(json!({"type": "subscribe", "room": "other"})).await;
        assert_eq!(
            alice.received(),
            [json!({"type": "error", "message": "Unknown message type"})]
        );

        assert_eq!(registry.room_members(&"room".into()), members_before);
        assert_eq!(registry.room_count(), 1);
        assert!(matches!(alice.session.state(), SessionState::Joined { .. }));
    }

    #[tokio::test]
    async fn terminated_session_ignores_frames() {
        let registry = Registry::new();
        let mut alice = joined(&registry, "room", "Alice").await;
        alice.session.disconnect().await;

        alice.send(json!({"type": "join", "room": "room", "name": "Alice"})).await;

        assert!(alice.received().is_empty());
        assert_eq!(registry.peer_count(), 0);
    }

    #[tokio::test]
    async fn disconnect_removes_peer_from_later_snapshots() {
        let registry = Registry::new();
        let mut alice = joined(&registry, "room", "Alice").await;
        let mut bob = joined(&registry, "room", "Bob").await;
        alice.received();

        bob.session.disconnect().await;
        assert_eq!(alice.received(), [json!({"type": "leave", "id": bob.id()})]);

        let mut carol = Peer::connect(&registry);
        carol.send(json!({"type": "join", "room": "room", "name": "Carol"})).await;
        let reply: ServerMessage = serde_json::from_value(carol.received().remove(0)).unwrap();
        match reply {
            ServerMessage::Joined { peers, .. } => assert_eq!(
                peers,
                [PeerSummary {
                    id: alice.session.id(),
                    name: "Alice".into(),
                }]
            ),
            other => panic!("unexpected reply: {other:?}"),
        }
    }
}
