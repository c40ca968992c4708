//! # codeshare-hub: shared-buffer synchronization hub
//!
//! Holds the one authoritative copy of a shared text buffer and relays
//! edits and cursor moves between any number of WebSocket participants.
//! Conflicts are last-write-wins: every edit replaces the whole buffer.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     WebSocket      ┌─────────────┐
//! │ HubClient   │ ◄─────────────────► │ HubServer   │
//! │ (per editor)│     JSON events     │ (one port)  │
//! └─────────────┘                     └──────┬──────┘
//!                                            │ HubCommand
//!                                            ▼
//!                                     ┌─────────────┐
//!                                     │ HubState    │
//!                                     │ buffer +    │
//!                                     │ registry    │
//!                                     └──────┬──────┘
//!                                            │
//!                                    ┌───────┴───────┐
//!                                    │ BroadcastGroup│
//!                                    │ (fan-out)     │
//!                                    └───────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`]: JSON wire events (`code-change`, `cursor-update`, `stats`, ...)
//! - [`hub`]: serialized hub state and its command loop
//! - [`broadcast`]: fan-out with per-participant drop-oldest queues
//! - [`bootstrap`]: port acquisition with retry on adjacent ports
//! - [`server`]: axum router for WebSocket upgrades, accept loop on the hub port
//! - [`assets`]: static client pages and files
//! - [`client`]: WebSocket client for editors and tests

pub mod assets;
pub mod bootstrap;
pub mod broadcast;
pub mod client;
pub mod config;
pub mod error;
pub mod hub;
pub mod ids;
pub mod net;
pub mod protocol;
pub mod registry;
pub mod server;

// Re-exports for convenience
pub use bootstrap::bind_with_retry;
pub use broadcast::{BroadcastGroup, BroadcastStats, Envelope, Subscription};
pub use client::{ConnectionState, HubClient, HubEvent};
pub use config::HubConfig;
pub use error::{BindError, ConfigError, HubError};
pub use hub::{Admission, HubHandle, HubSnapshot, HubState, HubStats};
pub use ids::{IdGenerator, RandomIds, SequentialIds};
pub use net::{lan_address, ServerUrls};
pub use protocol::{
    ClientEvent, CursorPosition, CursorUpdate, ParticipantId, ProtocolError, ServerEvent, Stats,
};
pub use server::HubServer;
