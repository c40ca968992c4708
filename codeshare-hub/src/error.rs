//! Error types shared across the hub.

use std::io;

use crate::protocol::ProtocolError;

/// Listener bootstrap failures.
#[derive(Debug, thiserror::Error)]
pub enum BindError {
    /// Every port in the probed range was already in use.
    #[error("could not find an available port after {attempts} attempts (tried {first}..={last})")]
    PortsExhausted { first: u16, last: u16, attempts: u16 },
    /// Any other bind failure; not retried.
    #[error("failed to bind port {port}: {source}")]
    Io {
        port: u16,
        #[source]
        source: io::Error,
    },
}

/// Invalid environment configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {var} value {value:?}: {reason}")]
    InvalidVar {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Runtime errors of the hub and its connections.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error(transparent)]
    Bind(#[from] BindError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    /// Failure on a participant socket accepted by the server.
    #[error("socket error: {0}")]
    Socket(#[from] axum::Error),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    /// The hub task has stopped; no further commands are accepted.
    #[error("hub is no longer running")]
    HubClosed,
}
