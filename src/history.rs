// ABOUTME: Bounded per-endpoint message history with FIFO eviction.
// ABOUTME: Insertion beyond capacity evicts the oldest entry first.

use std::collections::VecDeque;

use crate::backend::RawMessage;
use crate::error::{Error, Result};

/// Fixed-capacity ordered message buffer.
///
/// Owned by an [`Endpoint`](crate::endpoint::Endpoint) and mutated only
/// through it; created and destroyed with the endpoint.
#[derive(Debug, Clone)]
pub struct MessageHistory {
    messages: VecDeque<RawMessage>,
    capacity: usize,
}

impl MessageHistory {
    /// Create a history holding at most `capacity` messages.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::Invalid(
                "history capacity must be a positive integer".into(),
            ));
        }
        Ok(Self {
            messages: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Resize the buffer. Shrinking evicts the oldest entries.
    pub fn set_capacity(&mut self, capacity: usize) -> Result<()> {
        if capacity == 0 {
            return Err(Error::Invalid(
                "history capacity must be a positive integer".into(),
            ));
        }
        self.capacity = capacity;
        while self.messages.len() > self.capacity {
            self.messages.pop_front();
        }
        Ok(())
    }

    /// Append one message, evicting the oldest if the buffer is full.
    pub fn push(&mut self, message: RawMessage) {
        if self.messages.len() == self.capacity {
            self.messages.pop_front();
        }
        self.messages.push_back(message);
    }

    /// Append many messages in order.
    pub fn extend(&mut self, messages: impl IntoIterator<Item = RawMessage>) {
        for message in messages {
            self.push(message);
        }
    }

    /// Copy of all messages in insertion order.
    pub fn get_all(&self) -> Vec<RawMessage> {
        self.messages.iter().cloned().collect()
    }

    /// Drop up to `count` messages from the front (oldest first).
    ///
    /// `None`, or a count at or above the current length, clears everything.
    /// Returns how many messages were actually removed.
    pub fn clear(&mut self, count: Option<usize>) -> usize {
        let len = self.messages.len();
        match count {
            None => {
                self.messages.clear();
                len
            }
            Some(n) if n >= len => {
                self.messages.clear();
                len
            }
            Some(n) => {
                for _ in 0..n {
                    self.messages.pop_front();
                }
                n
            }
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RawMessage;

    fn msg(body: &str) -> RawMessage {
        RawMessage::friend("alice", "alice", body)
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(MessageHistory::new(0).is_err());
    }

    #[test]
    fn test_push_within_capacity() {
        let mut history = MessageHistory::new(3).unwrap();
        history.push(msg("a"));
        history.push(msg("b"));
        assert_eq!(history.len(), 2);
        let bodies: Vec<_> = history.get_all().into_iter().map(|m| m.body).collect();
        assert_eq!(bodies, ["a", "b"]);
    }

    #[test]
    fn test_fifo_eviction_beyond_capacity() {
        let mut history = MessageHistory::new(3).unwrap();
        for body in ["a", "b", "c", "d", "e"] {
            history.push(msg(body));
        }
        // after N+k inserts, exactly the last N remain, in insertion order
        let bodies: Vec<_> = history.get_all().into_iter().map(|m| m.body).collect();
        assert_eq!(bodies, ["c", "d", "e"]);
    }

    #[test]
    fn test_extend() {
        let mut history = MessageHistory::new(2).unwrap();
        history.extend([msg("a"), msg("b"), msg("c")]);
        let bodies: Vec<_> = history.get_all().into_iter().map(|m| m.body).collect();
        assert_eq!(bodies, ["b", "c"]);
    }

    #[test]
    fn test_clear_partial_front_first() {
        let mut history = MessageHistory::new(5).unwrap();
        history.extend([msg("a"), msg("b"), msg("c")]);
        assert_eq!(history.clear(Some(2)), 2);
        let bodies: Vec<_> = history.get_all().into_iter().map(|m| m.body).collect();
        assert_eq!(bodies, ["c"]);
    }

    #[test]
    fn test_clear_all_variants() {
        let mut history = MessageHistory::new(5).unwrap();
        history.extend([msg("a"), msg("b")]);
        assert_eq!(history.clear(None), 2);
        assert!(history.is_empty());

        history.extend([msg("a"), msg("b")]);
        assert_eq!(history.clear(Some(10)), 2);
        assert!(history.is_empty());

        assert_eq!(history.clear(Some(0)), 0);
    }

    #[test]
    fn test_shrink_capacity_evicts_oldest() {
        let mut history = MessageHistory::new(4).unwrap();
        history.extend([msg("a"), msg("b"), msg("c"), msg("d")]);
        history.set_capacity(2).unwrap();
        let bodies: Vec<_> = history.get_all().into_iter().map(|m| m.body).collect();
        assert_eq!(bodies, ["c", "d"]);
        assert!(history.set_capacity(0).is_err());
    }
}
