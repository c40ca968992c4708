//! WebSocket client for connecting an editor to the hub.
//!
//! Provides:
//! - Connection lifecycle (connect, disconnect)
//! - Buffer and cursor sends
//! - A typed event stream of everything the hub pushes
//!
//! Sends are fire-and-forget: while disconnected they are dropped, never
//! queued, since the next edit supersedes them anyway.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::tungstenite::Message;

use crate::protocol::{ClientEvent, CursorPosition, CursorUpdate, ProtocolError, ServerEvent, Stats};

/// Client connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Events emitted by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubEvent {
    /// Connection established
    Connected,
    /// Connection lost
    Disconnected,
    /// Buffer at the time of joining
    InitialCode(String),
    /// Another participant replaced the buffer
    CodeUpdate(String),
    /// Another participant moved their cursor
    CursorUpdate(CursorUpdate),
    /// Participant count changed
    Stats(Stats),
}

impl From<ServerEvent> for HubEvent {
    fn from(event: ServerEvent) -> Self {
        match event {
            ServerEvent::InitialCode(code) => Self::InitialCode(code),
            ServerEvent::CodeUpdate(code) => Self::CodeUpdate(code),
            ServerEvent::CursorUpdate(update) => Self::CursorUpdate(update),
            ServerEvent::Stats(stats) => Self::Stats(stats),
        }
    }
}

/// The hub client.
pub struct HubClient {
    /// Connection state
    state: Arc<RwLock<ConnectionState>>,

    /// Channel to the WebSocket writer task
    outgoing_tx: Option<mpsc::Sender<Message>>,

    /// Event receiver for the application
    event_rx: Option<mpsc::Receiver<HubEvent>>,

    /// Event sender (held by the reader task)
    event_tx: mpsc::Sender<HubEvent>,

    /// Hub URL
    server_url: String,
}

impl HubClient {
    /// Create a client for `server_url` (e.g. `ws://localhost:3001`).
    pub fn new(server_url: impl Into<String>) -> Self {
        let (event_tx, event_rx) = mpsc::channel(256);
        Self {
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            outgoing_tx: None,
            event_rx: Some(event_rx),
            event_tx,
            server_url: server_url.into(),
        }
    }

    /// Take the event receiver (can only be called once).
    pub fn take_event_rx(&mut self) -> Option<mpsc::Receiver<HubEvent>> {
        self.event_rx.take()
    }

    /// Connect to the hub.
    ///
    /// Spawns background tasks for reading and writing WebSocket messages.
    pub async fn connect(&mut self) -> Result<(), ProtocolError> {
        *self.state.write().await = ConnectionState::Connecting;

        let ws_stream = match tokio_tungstenite::connect_async(&self.server_url).await {
            Ok((ws_stream, _)) => ws_stream,
            Err(e) => {
                log::warn!("Could not connect to {}: {e}", self.server_url);
                *self.state.write().await = ConnectionState::Disconnected;
                return Err(ProtocolError::ConnectionClosed);
            }
        };
        let (mut ws_writer, mut ws_reader) = ws_stream.split();

        // Writer task: forward outgoing channel to WebSocket
        let (out_tx, mut out_rx) = mpsc::channel::<Message>(256);
        self.outgoing_tx = Some(out_tx);
        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                if ws_writer.send(msg).await.is_err() {
                    break;
                }
            }
            let _ = ws_writer.close().await;
        });

        *self.state.write().await = ConnectionState::Connected;
        let _ = self.event_tx.send(HubEvent::Connected).await;

        // Reader task: decode hub events
        let event_tx = self.event_tx.clone();
        let state = self.state.clone();
        tokio::spawn(async move {
            while let Some(msg) = ws_reader.next().await {
                match msg {
                    Ok(Message::Text(text)) => match ServerEvent::decode(text.as_str()) {
                        Ok(event) => {
                            if event_tx.send(event.into()).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => log::warn!("Ignoring undecodable hub message: {e}"),
                    },
                    Ok(Message::Close(_)) | Err(_) => break,
                    _ => {}
                }
            }

            *state.write().await = ConnectionState::Disconnected;
            let _ = event_tx.send(HubEvent::Disconnected).await;
        });

        Ok(())
    }

    /// Close the connection. Pending sends are flushed first.
    pub async fn disconnect(&mut self) {
        // Dropping the sender ends the writer task, which closes the socket.
        self.outgoing_tx = None;
        *self.state.write().await = ConnectionState::Disconnected;
    }

    /// Replace the shared buffer.
    pub async fn send_code(&self, code: impl Into<String>) -> Result<(), ProtocolError> {
        self.send(ClientEvent::CodeChange(code.into())).await
    }

    /// Report the local cursor.
    pub async fn send_cursor(&self, position: CursorPosition) -> Result<(), ProtocolError> {
        self.send(ClientEvent::CursorPosition(position)).await
    }

    async fn send(&self, event: ClientEvent) -> Result<(), ProtocolError> {
        let encoded = event.encode()?;
        self.send_message(Message::text(encoded)).await
    }

    async fn send_message(&self, msg: Message) -> Result<(), ProtocolError> {
        if *self.state.read().await != ConnectionState::Connected {
            log::debug!("Not connected, dropping outgoing message");
            return Ok(());
        }

        if let Some(ref tx) = self.outgoing_tx {
            tx.send(msg)
                .await
                .map_err(|_| ProtocolError::ConnectionClosed)?;
        }
        Ok(())
    }

    /// Get the current connection state.
    pub async fn connection_state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Get the server URL.
    pub fn server_url(&self) -> &str {
        &self.server_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = HubClient::new("ws://localhost:3001");
        assert_eq!(client.server_url(), "ws://localhost:3001");
    }

    #[tokio::test]
    async fn test_client_initial_state() {
        let client = HubClient::new("ws://localhost:3001");
        assert_eq!(client.connection_state().await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_send_while_disconnected_is_dropped() {
        let client = HubClient::new("ws://localhost:3001");
        client.send_code("let a = 1;").await.unwrap();
        client.send_cursor(CursorPosition::new(1, 1)).await.unwrap();
        assert_eq!(client.connection_state().await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_connect_failure_resets_state() {
        // Grab a port and release it so nothing is listening there.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut client = HubClient::new(format!("ws://127.0.0.1:{port}"));
        assert!(client.connect().await.is_err());
        assert_eq!(client.connection_state().await, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_take_event_rx() {
        let mut client = HubClient::new("ws://localhost:3001");
        assert!(client.take_event_rx().is_some());
        assert!(client.take_event_rx().is_none());
    }

    #[test]
    fn test_server_event_conversion() {
        assert_eq!(
            HubEvent::from(ServerEvent::CodeUpdate("x".into())),
            HubEvent::CodeUpdate("x".into())
        );
        assert_eq!(
            HubEvent::from(ServerEvent::Stats(Stats::connected(4))),
            HubEvent::Stats(Stats::connected(4))
        );
    }
}
