//! Participant identifier generation.
//!
//! The hub never derives identity from the transport; it asks an
//! [`IdGenerator`] for a fresh id on every accepted connection.

use uuid::Uuid;

use crate::protocol::ParticipantId;

/// Source of unique participant identifiers.
///
/// Implementations must never hand out the same id twice.
pub trait IdGenerator: Send + 'static {
    fn next_id(&mut self) -> ParticipantId;
}

/// Random UUID v4 ids in simple (hyphen-free) form.
#[derive(Debug, Default)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn next_id(&mut self) -> ParticipantId {
        ParticipantId::new(Uuid::new_v4().simple().to_string())
    }
}

/// Monotonic ids `p-1`, `p-2`, … for deterministic runs.
#[derive(Debug, Default)]
pub struct SequentialIds {
    last: u64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&mut self) -> ParticipantId {
        self.last += 1;
        ParticipantId::new(format!("p-{}", self.last))
    }
}
