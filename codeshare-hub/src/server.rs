//! WebSocket hub server.
//!
//! ```text
//! TcpListener ── accept ──► hyper http1 ──► Router ──┬── upgrade (any path) ──► participant task ◄──► HubHandle
//!                                                    └── other ───────────────► static assets
//! ```
//!
//! Each participant task owns its socket. Inbound frames become hub
//! commands; the participant's [`Subscription`](crate::broadcast::Subscription)
//! feeds the outbound side. A slow socket only ever delays its own task.

use std::future::Future;
use std::io;
use std::path::Path;
use std::time::Duration;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use hyper::server::conn::http1;
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::assets;
use crate::bootstrap::bind_with_retry;
use crate::config::HubConfig;
use crate::error::HubError;
use crate::hub::{self, HubHandle, HubState};
use crate::ids::{IdGenerator, RandomIds};
use crate::protocol::{ClientEvent, ParticipantId, ProtocolError, ServerEvent};

/// Pause after a failed `accept` before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// A hub bound to its listener, ready to [`run`](HubServer::run).
pub struct HubServer {
    listener: TcpListener,
    port: u16,
    hub: HubHandle,
    router: Router,
    http: http1::Builder,
}

impl HubServer {
    /// Acquire a port per `config` and start the hub task.
    pub async fn bind(config: HubConfig) -> Result<Self, HubError> {
        Self::bind_with_ids(config, Box::new(RandomIds)).await
    }

    /// [`bind`](Self::bind) with an explicit participant id source.
    pub async fn bind_with_ids(
        config: HubConfig,
        ids: Box<dyn IdGenerator>,
    ) -> Result<Self, HubError> {
        let (listener, port) =
            bind_with_retry(&config.host, config.port, config.max_port_attempts).await?;
        Ok(Self::from_listener(listener, port, config, ids))
    }

    /// Serve the hub on an already bound listener.
    pub fn from_listener(
        listener: TcpListener,
        port: u16,
        config: HubConfig,
        ids: Box<dyn IdGenerator>,
    ) -> Self {
        let state = HubState::new(config.initial_buffer, config.outbound_capacity, ids);
        let hub = hub::spawn(state, config.command_capacity);
        let router = router(hub.clone(), config.asset_dir.as_deref());

        let mut http = http1::Builder::new();
        http.timer(TokioTimer::new())
            .header_read_timeout(config.header_read_timeout);

        Self {
            listener,
            port,
            hub,
            router,
            http,
        }
    }

    /// The bound port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Handle to the running hub.
    pub fn hub(&self) -> &HubHandle {
        &self.hub
    }

    /// Accept connections until the task is dropped.
    ///
    /// Failed accepts (descriptor exhaustion, aborted handshakes) are logged
    /// and retried; they never stop the listener.
    pub async fn run(self) {
        log::info!("Hub listening on port {}", self.port);

        let listener = &self.listener;
        loop {
            let (stream, addr) = accept_with_backoff(|| listener.accept()).await;
            log::debug!("New TCP connection from {addr}");

            let service = TowerToHyperService::new(self.router.clone());
            let connection = self
                .http
                .serve_connection(TokioIo::new(stream), service)
                .with_upgrades();
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    log::debug!("Connection from {addr} ended: {e}");
                }
            });
        }
    }
}

/// Retry `accept` until it yields a connection.
async fn accept_with_backoff<T, F, Fut>(mut accept: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<T>>,
{
    loop {
        match accept().await {
            Ok(conn) => return conn,
            Err(e) => {
                log::warn!("Failed to accept connection: {e}");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}

/// Routes of the hub port: WebSocket upgrades on any path, static assets otherwise.
pub fn router(hub: HubHandle, asset_dir: Option<&Path>) -> Router {
    assets::routes(asset_dir)
        .layer(middleware::from_fn_with_state(hub, upgrade_any_path))
        .layer(CorsLayer::new().allow_origin(Any))
}

async fn upgrade_any_path(
    State(hub): State<HubHandle>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    request: Request,
    next: Next,
) -> Response {
    match upgrade {
        Ok(ws) => ws.on_upgrade(move |socket| async move {
            if let Err(e) = serve_participant(socket, hub).await {
                log::error!("Participant connection error: {e}");
            }
        }),
        Err(rejection) if wants_websocket(&request) => {
            log::warn!("Rejected WebSocket upgrade to {}: {rejection}", request.uri());
            rejection.into_response()
        }
        Err(_) => next.run(request).await,
    }
}

fn wants_websocket(request: &Request) -> bool {
    request
        .headers()
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}

/// Run one participant from admission to disconnect.
async fn serve_participant(ws: WebSocket, hub: HubHandle) -> Result<(), HubError> {
    let (mut ws_sender, mut ws_receiver) = ws.split();

    let admission = hub.connect().await?;
    let participant_id = admission.participant_id;
    let mut subscription = admission.subscription;
    log::info!("WebSocket connection established as {participant_id}");

    let result = async {
        let initial = ServerEvent::InitialCode(admission.initial_code).encode()?;
        ws_sender.send(Message::Text(initial.into())).await?;

        loop {
            tokio::select! {
                msg = ws_receiver.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            dispatch(&hub, &participant_id, text.as_str()).await?;
                        }
                        Some(Ok(Message::Binary(data))) => {
                            match std::str::from_utf8(&data) {
                                Ok(text) => dispatch(&hub, &participant_id, text).await?,
                                Err(e) => log::warn!(
                                    "Discarding binary frame from {participant_id}: {}",
                                    ProtocolError::from(e)
                                ),
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            log::info!("Connection closed by {participant_id}");
                            break;
                        }
                        Some(Err(e)) => {
                            log::info!("Connection of {participant_id} dropped: {e}");
                            break;
                        }
                        // Pings are answered by the socket itself.
                        Some(Ok(_)) => {}
                    }
                }

                envelope = subscription.recv() => {
                    let Some(envelope) = envelope else { break };
                    let encoded = envelope.event.encode()?;
                    ws_sender.send(Message::Text(encoded.into())).await?;
                }
            }
        }
        Ok::<(), HubError>(())
    }
    .await;

    // Leave the group first so the departure stats only reach the others.
    drop(subscription);
    if let Err(e) = hub.disconnect(participant_id.clone()).await {
        log::warn!("Failed to unregister {participant_id}: {e}");
    }
    result
}

/// Decode one inbound frame and forward it to the hub.
///
/// Malformed payloads are logged and dropped; the connection stays open.
async fn dispatch(hub: &HubHandle, from: &ParticipantId, text: &str) -> Result<(), HubError> {
    match ClientEvent::decode(text) {
        Ok(ClientEvent::CodeChange(value)) => hub.change_buffer(from.clone(), value).await,
        Ok(ClientEvent::CursorPosition(position)) => hub.move_cursor(from.clone(), position).await,
        Err(e) => {
            log::warn!("Discarding malformed message from {from}: {e}");
            Ok(())
        }
    }
}
