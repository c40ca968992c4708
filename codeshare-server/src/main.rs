//! codeshare server: runs the synchronization hub on the local network.
//!
//! Binds port 3001 (or `PORT`), walking up to ten ports higher if it is
//! taken, then serves participants until interrupted.

use codeshare_hub::{HubConfig, HubServer, ServerUrls};
use log::{error, info};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match HubConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };
    if let Some(dir) = &config.asset_dir {
        info!("Serving client assets from {}", dir.display());
    }

    let server = match HubServer::bind(config).await {
        Ok(server) => server,
        // Port exhaustion and other bind failures leave no degraded mode.
        Err(e) => {
            error!("Failed to start server: {e}");
            std::process::exit(1);
        }
    };

    let urls = ServerUrls::for_port(server.port());
    info!("Server running on:");
    info!("- Local: {}", urls.local);
    info!("- Network: {}", urls.network);

    tokio::select! {
        () = server.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }
}
