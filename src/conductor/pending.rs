//! Per-peer store-and-forward queues.

use crate::core::{now, Timestamp};
use crate::messages::Message;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// A send that found no deliverable connection.
#[derive(Clone, Debug)]
pub struct PendingMessage {
    pub message: Message,
    pub to_key: String,
    pub from_key: Option<String>,
    pub queued_at: Timestamp,
}

impl PendingMessage {
    pub fn new(message: Message, to_key: &str, from_key: Option<&str>) -> Self {
        Self {
            message,
            to_key: to_key.to_string(),
            from_key: from_key.map(str::to_string),
            queued_at: now(),
        }
    }
}

/// Peer key to FIFO of pending sends. Queues are created on first use and
/// dropped once drained.
#[derive(Default)]
pub struct PendingQueues {
    queues: Mutex<HashMap<String, VecDeque<PendingMessage>>>,
}

impl PendingQueues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the peer's queue; returns its new length.
    pub fn push(&self, peer: &str, item: PendingMessage) -> usize {
        let mut queues = self.queues.lock().unwrap();
        let queue = queues.entry(peer.to_string()).or_default();
        queue.push_back(item);
        queue.len()
    }

    /// Put an item back at the head after a failed delivery.
    pub fn push_front(&self, peer: &str, item: PendingMessage) {
        self.queues
            .lock()
            .unwrap()
            .entry(peer.to_string())
            .or_default()
            .push_front(item);
    }

    /// Take the head of the peer's queue together with the count left behind.
    pub fn pop(&self, peer: &str) -> Option<(PendingMessage, usize)> {
        let mut queues = self.queues.lock().unwrap();
        let queue = queues.get_mut(peer)?;
        let item = queue.pop_front()?;
        let remaining = queue.len();
        if remaining == 0 {
            queues.remove(peer);
        }
        Some((item, remaining))
    }

    pub fn len(&self, peer: &str) -> usize {
        self.queues
            .lock()
            .unwrap()
            .get(peer)
            .map(VecDeque::len)
            .unwrap_or(0)
    }

    /// Total pending across all peers.
    pub fn total(&self) -> usize {
        self.queues.lock().unwrap().values().map(VecDeque::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(n: u64) -> PendingMessage {
        let mut msg = Message::with_type("did:test:1/pending/1.0/item").unwrap();
        msg.insert("n", n.into()).unwrap();
        PendingMessage::new(msg, "peer", Some("me"))
    }

    #[test]
    fn test_push_pop_fifo() {
        let queues = PendingQueues::new();
        assert_eq!(queues.push("peer", item(1)), 1);
        assert_eq!(queues.push("peer", item(2)), 2);
        assert_eq!(queues.push("other", item(9)), 1);
        assert_eq!(queues.total(), 3);

        let (first, remaining) = queues.pop("peer").unwrap();
        assert_eq!(first.message.get("n").unwrap(), 1);
        assert_eq!(first.from_key.as_deref(), Some("me"));
        assert_eq!(remaining, 1);

        let (second, remaining) = queues.pop("peer").unwrap();
        assert_eq!(second.message.get("n").unwrap(), 2);
        assert_eq!(remaining, 0);
        assert!(queues.pop("peer").is_none());
        assert_eq!(queues.len("peer"), 0);
    }

    #[test]
    fn test_push_front_restores_head() {
        let queues = PendingQueues::new();
        queues.push("peer", item(1));
        queues.push("peer", item(2));
        let (head, _) = queues.pop("peer").unwrap();
        queues.push_front("peer", head);
        assert_eq!(queues.pop("peer").unwrap().0.message.get("n").unwrap(), 1);
    }
}
