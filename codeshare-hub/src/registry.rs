//! Set of currently connected participants.

use std::collections::HashSet;

use crate::protocol::ParticipantId;

/// Live participants. Its size is the number of open connections.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    live: HashSet<ParticipantId>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the id was already registered.
    pub fn insert(&mut self, id: ParticipantId) -> bool {
        self.live.insert(id)
    }

    /// Returns `false` if the id was not registered.
    pub fn remove(&mut self, id: &ParticipantId) -> bool {
        self.live.remove(id)
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_remove() {
        let mut registry = ConnectionRegistry::new();
        let alice = ParticipantId::new("alice");

        assert!(registry.insert(alice.clone()));
        assert!(!registry.insert(alice.clone()));
        assert_eq!(registry.len(), 1);

        assert!(registry.remove(&alice));
        assert!(!registry.remove(&alice));
        assert!(registry.is_empty());
    }
}
