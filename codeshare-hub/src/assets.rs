//! Static client assets served next to the hub.
//!
//! `/` maps to `index.html` (host view) and `/client` to `client.html`
//! (participant view); other paths resolve inside the asset directory.

use std::path::Path;

use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use tower_http::services::{ServeDir, ServeFile};

pub const BANNER: &str = "codeshare hub is running. Connect a WebSocket client to this address.\n";

/// Routes for the static surface. Without a root only the banner is served.
pub fn routes<S>(root: Option<&Path>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let Some(root) = root else {
        return Router::new().route("/", get(banner)).fallback(not_found);
    };

    Router::new()
        .route_service("/", ServeFile::new(root.join("index.html")))
        .route_service("/client", ServeFile::new(root.join("client.html")))
        .fallback_service(ServeDir::new(root).append_index_html_on_directories(false))
}

async fn banner() -> &'static str {
    BANNER
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "not found\n")
}
