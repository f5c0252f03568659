//! Outbound half of a peer connection
//!
//! The registry and broadcaster only ever see a [`ConnectionHandle`]. Inbound
//! frames are read by whoever owns the receiving half (see [`crate::server`]).

use crate::error::SignalingError;
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::SinkExt;
use futures::stream::SplitSink;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;

/// A channel that text frames can be pushed into
#[async_trait]
pub trait Connection: Send + Sync {
    /// Send one text frame, waiting until it has been handed to the transport
    async fn send(&self, text: String) -> Result<(), SignalingError>;

    /// Close the channel. Closing twice must not panic.
    async fn close(&self) -> Result<(), SignalingError>;
}

/// Shared handle stored in the registry
pub type ConnectionHandle = Arc<dyn Connection>;

/// Sending half of an upgraded axum WebSocket
pub struct WebSocketConnection {
    sink: tokio::sync::Mutex<SplitSink<WebSocket, Message>>,
}

impl WebSocketConnection {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self {
            sink: tokio::sync::Mutex::new(sink),
        }
    }
}

#[async_trait]
impl Connection for WebSocketConnection {
    async fn send(&self, text: String) -> Result<(), SignalingError> {
        let mut sink = self.sink.lock().await;
        sink.send(Message::Text(text.into())).await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), SignalingError> {
        let mut sink = self.sink.lock().await;
        sink.close().await?;
        Ok(())
    }
}

/// In-memory connection backed by an unbounded channel.
///
/// Useful for embedding the relay behind another transport and for tests.
pub struct ChannelConnection {
    tx: Mutex<Option<mpsc::UnboundedSender<String>>>,
}

impl ChannelConnection {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection = Self {
            tx: Mutex::new(Some(tx)),
        };
        (connection, rx)
    }

    pub fn is_closed(&self) -> bool {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

#[async_trait]
impl Connection for ChannelConnection {
    async fn send(&self, text: String) -> Result<(), SignalingError> {
        let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        match tx.as_ref() {
            Some(tx) => tx
                .send(text)
                .map_err(|e| SignalingError::SendError(e.to_string())),
            None => Err(SignalingError::Closed),
        }
    }

    async fn close(&self) -> Result<(), SignalingError> {
        self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
        Ok(())
    }
}
