//! The hub: canonical shared buffer, participant registry and fan-out.
//!
//! ```text
//! connection task A ──┐                         ┌──► Subscription A
//! connection task B ──┼─► mpsc<HubCommand> ─► HubState ─► BroadcastGroup ─┼──► Subscription B
//! connection task C ──┘     (one consumer)     buffer     (drop-oldest)   └──► Subscription C
//!                                              registry
//! ```
//!
//! [`HubState`] is a plain synchronous state machine, testable without a
//! socket. [`spawn`] moves it into a single task that applies commands in
//! arrival order, so buffer replacements are serialized and the last one
//! processed wins.

use tokio::sync::{mpsc, oneshot};

use crate::broadcast::{BroadcastGroup, Subscription};
use crate::error::HubError;
use crate::ids::IdGenerator;
use crate::protocol::{CursorPosition, CursorUpdate, ParticipantId, ServerEvent, Stats};
use crate::registry::ConnectionRegistry;

/// Everything a freshly connected participant needs.
pub struct Admission {
    pub participant_id: ParticipantId,
    /// Buffer value at the moment of connect, to be sent as `initial-code`
    pub initial_code: String,
    /// Outbound events from this point on
    pub subscription: Subscription,
}

/// Hub counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HubStats {
    pub connected_users: usize,
    pub total_connections: u64,
    pub buffer_changes: u64,
    pub cursor_moves: u64,
    pub events_sent: u64,
    pub events_dropped: u64,
}

/// Point-in-time copy of the hub state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubSnapshot {
    pub buffer: String,
    pub stats: HubStats,
}

/// Owned hub state. All mutation goes through `&mut self`.
pub struct HubState {
    buffer: String,
    registry: ConnectionRegistry,
    group: BroadcastGroup,
    ids: Box<dyn IdGenerator>,
    total_connections: u64,
    buffer_changes: u64,
    cursor_moves: u64,
}

impl HubState {
    pub fn new(
        initial_buffer: impl Into<String>,
        outbound_capacity: usize,
        ids: Box<dyn IdGenerator>,
    ) -> Self {
        Self {
            buffer: initial_buffer.into(),
            registry: ConnectionRegistry::new(),
            group: BroadcastGroup::new(outbound_capacity),
            ids,
            total_connections: 0,
            buffer_changes: 0,
            cursor_moves: 0,
        }
    }

    /// Register a new participant.
    ///
    /// The subscription is created before the stats broadcast so the new
    /// participant sees its own arrival in the count.
    pub fn connect(&mut self) -> Admission {
        let participant_id = self.ids.next_id();
        self.registry.insert(participant_id.clone());
        self.total_connections += 1;

        let subscription = self.group.subscribe(participant_id.clone());
        let initial_code = self.buffer.clone();
        self.broadcast_stats();

        log::info!(
            "Participant {participant_id} connected ({} total)",
            self.registry.len()
        );

        Admission {
            participant_id,
            initial_code,
            subscription,
        }
    }

    /// Replace the whole buffer and fan the new value out to everyone else.
    pub fn change_buffer(&mut self, from: &ParticipantId, value: String) {
        log::debug!("Buffer replaced by {from} ({} bytes)", value.len());
        self.buffer_changes += 1;
        self.buffer.clone_from(&value);
        self.group.send_others(from, ServerEvent::CodeUpdate(value));
    }

    /// Relay a cursor move to everyone else. The buffer is untouched.
    pub fn move_cursor(&mut self, from: &ParticipantId, position: CursorPosition) {
        log::trace!("Cursor from {from} at {}:{}", position.line, position.column);
        self.cursor_moves += 1;
        self.group.send_others(
            from,
            ServerEvent::CursorUpdate(CursorUpdate {
                participant_id: from.clone(),
                position,
            }),
        );
    }

    /// Remove a participant. Unknown ids are ignored; returns whether one was removed.
    pub fn disconnect(&mut self, id: &ParticipantId) -> bool {
        if !self.registry.remove(id) {
            return false;
        }
        log::info!(
            "Participant {id} disconnected ({} remaining)",
            self.registry.len()
        );
        self.broadcast_stats();
        true
    }

    fn broadcast_stats(&self) {
        self.group
            .send_all(ServerEvent::Stats(Stats::connected(self.registry.len())));
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn connected_users(&self) -> usize {
        self.registry.len()
    }

    pub fn stats(&self) -> HubStats {
        let broadcast = self.group.stats();
        HubStats {
            connected_users: self.registry.len(),
            total_connections: self.total_connections,
            buffer_changes: self.buffer_changes,
            cursor_moves: self.cursor_moves,
            events_sent: broadcast.events_sent,
            events_dropped: broadcast.events_dropped,
        }
    }

    pub fn snapshot(&self) -> HubSnapshot {
        HubSnapshot {
            buffer: self.buffer.clone(),
            stats: self.stats(),
        }
    }

    fn apply(&mut self, command: HubCommand) {
        match command {
            HubCommand::Connect { reply } => {
                let admission = self.connect();
                let id = admission.participant_id.clone();
                // Connection task went away before admission: undo it.
                if reply.send(admission).is_err() {
                    self.disconnect(&id);
                }
            }
            HubCommand::BufferChange { from, value } => self.change_buffer(&from, value),
            HubCommand::CursorMove { from, position } => self.move_cursor(&from, position),
            HubCommand::Disconnect { id } => {
                self.disconnect(&id);
            }
            HubCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
        }
    }
}

/// Inbound hub events, applied strictly in arrival order.
pub enum HubCommand {
    Connect {
        reply: oneshot::Sender<Admission>,
    },
    BufferChange {
        from: ParticipantId,
        value: String,
    },
    CursorMove {
        from: ParticipantId,
        position: CursorPosition,
    },
    Disconnect {
        id: ParticipantId,
    },
    Snapshot {
        reply: oneshot::Sender<HubSnapshot>,
    },
}

/// Cloneable handle to a running hub task.
///
/// The task stops once every handle is dropped.
#[derive(Clone)]
pub struct HubHandle {
    commands: mpsc::Sender<HubCommand>,
}

/// Move `state` into its own task and return a handle to it.
pub fn spawn(state: HubState, command_capacity: usize) -> HubHandle {
    let (commands, rx) = mpsc::channel(command_capacity.max(1));
    tokio::spawn(run(state, rx));
    HubHandle { commands }
}

async fn run(mut state: HubState, mut rx: mpsc::Receiver<HubCommand>) {
    while let Some(command) = rx.recv().await {
        state.apply(command);
    }
    log::debug!("Hub task stopped");
}

impl HubHandle {
    async fn send(&self, command: HubCommand) -> Result<(), HubError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| HubError::HubClosed)
    }

    pub async fn connect(&self) -> Result<Admission, HubError> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::Connect { reply }).await?;
        rx.await.map_err(|_| HubError::HubClosed)
    }

    pub async fn change_buffer(&self, from: ParticipantId, value: String) -> Result<(), HubError> {
        self.send(HubCommand::BufferChange { from, value }).await
    }

    pub async fn move_cursor(
        &self,
        from: ParticipantId,
        position: CursorPosition,
    ) -> Result<(), HubError> {
        self.send(HubCommand::CursorMove { from, position }).await
    }

    pub async fn disconnect(&self, id: ParticipantId) -> Result<(), HubError> {
        self.send(HubCommand::Disconnect { id }).await
    }

    pub async fn snapshot(&self) -> Result<HubSnapshot, HubError> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::Snapshot { reply }).await?;
        rx.await.map_err(|_| HubError::HubClosed)
    }
}
