use super::registry::ConnectionId;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Waiting {
    connection: ConnectionId,
    since: Instant,
}

/// Quick-play queue (pure, no transport concerns). Strict FIFO.
#[derive(Debug, Default)]
pub struct MatchQueue {
    waiting: VecDeque<Waiting>,
}

impl MatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }

    fn contains(&self, connection: ConnectionId) -> bool {
        self.waiting.iter().any(|w| w.connection == connection)
    }

    /// Appends to the tail. Returns false if the connection was already waiting.
    pub fn enqueue(&mut self, connection: ConnectionId) -> bool {
        if self.contains(connection) {
            return false;
        }
        self.waiting.push_back(Waiting {
            connection,
            since: Instant::now(),
        });
        true
    }

    /// Pops the two longest-waiting connections, oldest first.
    pub fn take_pair(&mut self) -> Option<(ConnectionId, ConnectionId)> {
        if self.waiting.len() < 2 {
            return None;
        }
        let first = self.waiting.pop_front()?;
        let second = self.waiting.pop_front()?;
        Some((first.connection, second.connection))
    }

    /// Removes a connection wherever it sits. Returns whether it was queued.
    pub fn cancel(&mut self, connection: ConnectionId) -> bool {
        let before = self.waiting.len();
        self.waiting.retain(|w| w.connection != connection);
        self.waiting.len() != before
    }

    /// Drops entries that have waited at least `max_wait`.
    pub fn expire(&mut self, now: Instant, max_wait: Duration) -> Vec<ConnectionId> {
        let mut expired = Vec::new();
        self.waiting.retain(|w| {
            let stale = now.saturating_duration_since(w.since) >= max_wait;
            if stale {
                expired.push(w.connection);
            }
            !stale
        });
        expired
    }
}
