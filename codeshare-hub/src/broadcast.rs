//! Fan-out of hub events to every participant with per-participant backpressure.
//!
//! Uses a tokio broadcast channel: one `send` reaches every subscriber, and
//! each subscriber has its own cursor into a ring of `capacity` events. A
//! subscriber that falls more than `capacity` events behind skips the oldest
//! ones (drop-oldest) while everyone else keeps receiving. Sending never waits
//! on a receiver.
//!
//! Events carry their originator so a participant's own edits and cursor
//! moves are filtered out on its side of the channel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

use crate::protocol::{ParticipantId, ServerEvent};

/// One fanned-out event.
#[derive(Debug)]
pub struct Envelope {
    /// Participant excluded from delivery (`None` = everyone)
    pub origin: Option<ParticipantId>,
    pub event: ServerEvent,
}

/// Statistics for monitoring broadcast health.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastStats {
    pub events_sent: u64,
    pub events_dropped: u64,
}

/// Counters shared between the group and its subscriptions.
#[derive(Debug, Default)]
struct AtomicBroadcastStats {
    events_sent: AtomicU64,
    events_dropped: AtomicU64,
}

/// The hub's single broadcast group.
pub struct BroadcastGroup {
    sender: broadcast::Sender<Arc<Envelope>>,
    stats: Arc<AtomicBroadcastStats>,
}

impl BroadcastGroup {
    /// Create a group buffering up to `capacity` events per participant.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            stats: Arc::new(AtomicBroadcastStats::default()),
        }
    }

    /// Subscribe a participant. Only events sent after this call are seen.
    pub fn subscribe(&self, participant_id: ParticipantId) -> Subscription {
        Subscription {
            participant_id,
            receiver: self.sender.subscribe(),
            stats: self.stats.clone(),
        }
    }

    /// Send to every subscriber.
    pub fn send_all(&self, event: ServerEvent) -> usize {
        self.send(Envelope { origin: None, event })
    }

    /// Send to every subscriber except `origin`.
    pub fn send_others(&self, origin: &ParticipantId, event: ServerEvent) -> usize {
        self.send(Envelope {
            origin: Some(origin.clone()),
            event,
        })
    }

    fn send(&self, envelope: Envelope) -> usize {
        // No subscribers is not an error: the event simply has nobody to reach.
        let count = self.sender.send(Arc::new(envelope)).unwrap_or(0);
        self.stats.events_sent.fetch_add(1, Ordering::Relaxed);
        count
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn stats(&self) -> BroadcastStats {
        BroadcastStats {
            events_sent: self.stats.events_sent.load(Ordering::Relaxed),
            events_dropped: self.stats.events_dropped.load(Ordering::Relaxed),
        }
    }
}

/// One participant's outbound queue.
pub struct Subscription {
    participant_id: ParticipantId,
    receiver: broadcast::Receiver<Arc<Envelope>>,
    stats: Arc<AtomicBroadcastStats>,
}

impl Subscription {
    /// Wait for the next event addressed to this participant.
    ///
    /// Returns `None` once the group is gone.
    pub async fn recv(&mut self) -> Option<Arc<Envelope>> {
        loop {
            match self.receiver.recv().await {
                Ok(envelope) if self.is_own(&envelope) => continue,
                Ok(envelope) => return Some(envelope),
                Err(RecvError::Lagged(n)) => self.record_lag(n),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv); `None` when nothing is queued.
    pub fn try_recv(&mut self) -> Option<Arc<Envelope>> {
        loop {
            match self.receiver.try_recv() {
                Ok(envelope) if self.is_own(&envelope) => continue,
                Ok(envelope) => return Some(envelope),
                Err(TryRecvError::Lagged(n)) => self.record_lag(n),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    fn is_own(&self, envelope: &Envelope) -> bool {
        envelope.origin.as_ref() == Some(&self.participant_id)
    }

    fn record_lag(&self, n: u64) {
        log::warn!("Participant {} lagged, dropped {n} oldest events", self.participant_id);
        self.stats.events_dropped.fetch_add(n, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Stats;

    fn pid(s: &str) -> ParticipantId {
        ParticipantId::new(s)
    }

    #[test]
    fn test_send_all_reaches_everyone() {
        let group = BroadcastGroup::new(16);
        let mut a = group.subscribe(pid("a"));
        let mut b = group.subscribe(pid("b"));

        assert_eq!(group.send_all(ServerEvent::Stats(Stats::connected(2))), 2);

        assert_eq!(a.try_recv().unwrap().event, ServerEvent::Stats(Stats::connected(2)));
        assert_eq!(b.try_recv().unwrap().event, ServerEvent::Stats(Stats::connected(2)));
    }

    #[test]
    fn test_send_others_skips_origin() {
        let group = BroadcastGroup::new(16);
        let mut a = group.subscribe(pid("a"));
        let mut b = group.subscribe(pid("b"));

        group.send_others(&pid("a"), ServerEvent::CodeUpdate("x".into()));

        assert!(a.try_recv().is_none());
        assert_eq!(b.try_recv().unwrap().event, ServerEvent::CodeUpdate("x".into()));
    }

    #[test]
    fn test_late_subscriber_sees_only_new_events() {
        let group = BroadcastGroup::new(16);
        let _a = group.subscribe(pid("a"));
        group.send_all(ServerEvent::CodeUpdate("old".into()));

        let mut b = group.subscribe(pid("b"));
        assert!(b.try_recv().is_none());
        group.send_all(ServerEvent::CodeUpdate("new".into()));
        assert_eq!(b.try_recv().unwrap().event, ServerEvent::CodeUpdate("new".into()));
    }

    #[test]
    fn test_slow_subscriber_drops_oldest() {
        let group = BroadcastGroup::new(4);
        let mut slow = group.subscribe(pid("slow"));
        let mut fast = group.subscribe(pid("fast"));

        for i in 0..10 {
            group.send_all(ServerEvent::CodeUpdate(format!("v{i}")));
            // fast keeps up
            assert_eq!(
                fast.try_recv().unwrap().event,
                ServerEvent::CodeUpdate(format!("v{i}"))
            );
        }

        // slow only sees the newest `capacity` events
        let mut seen = Vec::new();
        while let Some(envelope) = slow.try_recv() {
            seen.push(envelope.event.clone());
        }
        let expected: Vec<_> = (6..10).map(|i| ServerEvent::CodeUpdate(format!("v{i}"))).collect();
        assert_eq!(seen, expected);
        assert_eq!(group.stats().events_dropped, 6);
        assert_eq!(group.stats().events_sent, 10);
    }

    #[test]
    fn test_subscriber_count_tracks_drops() {
        let group = BroadcastGroup::new(8);
        let a = group.subscribe(pid("a"));
        let _b = group.subscribe(pid("b"));
        assert_eq!(group.subscriber_count(), 2);
        drop(a);
        assert_eq!(group.subscriber_count(), 1);
    }

    #[test]
    fn test_send_without_subscribers() {
        let group = BroadcastGroup::new(8);
        assert_eq!(group.send_all(ServerEvent::Stats(Stats::connected(0))), 0);
        assert_eq!(group.stats().events_sent, 1);
    }

    #[tokio::test]
    async fn test_recv_returns_none_when_group_dropped() {
        let group = BroadcastGroup::new(8);
        let mut a = group.subscribe(pid("a"));
        group.send_all(ServerEvent::CodeUpdate("last".into()));
        drop(group);

        assert_eq!(a.recv().await.unwrap().event, ServerEvent::CodeUpdate("last".into()));
        assert!(a.recv().await.is_none());
    }
}
