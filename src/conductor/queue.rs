//! Inbound message queue with a join counter.

use crate::messages::Message;
use tokio::sync::{mpsc, watch, Mutex};

/// Unbounded FIFO of decoded messages awaiting the application.
///
/// Every `put` raises the unfinished count and every `task_done` lowers it;
/// `join` resolves once it reaches zero.
pub struct MessageQueue {
    tx: mpsc::UnboundedSender<Message>,
    rx: Mutex<mpsc::UnboundedReceiver<Message>>,
    unfinished: watch::Sender<usize>,
    closed: watch::Sender<bool>,
}

impl MessageQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (unfinished, _) = watch::channel(0);
        let (closed, _) = watch::channel(false);
        Self {
            tx,
            rx: Mutex::new(rx),
            unfinished,
            closed,
        }
    }

    /// Enqueue a message.
    pub fn put(&self, msg: Message) {
        self.unfinished.send_modify(|n| *n += 1);
        // The receiver lives as long as the queue
        let _ = self.tx.send(msg);
    }

    /// Next message, or `None` once the queue is closed.
    pub async fn get(&self) -> Option<Message> {
        let mut closed = self.closed.subscribe();
        let mut rx = self.rx.lock().await;
        tokio::select! {
            biased;
            msg = rx.recv() => msg,
            _ = closed.wait_for(|closed| *closed) => None,
        }
    }

    /// Take a message without waiting.
    pub fn try_get(&self) -> Option<Message> {
        self.rx.try_lock().ok()?.try_recv().ok()
    }

    /// Mark one previously fetched message as processed.
    pub fn task_done(&self) {
        self.unfinished.send_modify(|n| *n = n.saturating_sub(1));
    }

    /// Messages put but not yet marked done.
    pub fn unfinished(&self) -> usize {
        *self.unfinished.borrow()
    }

    /// Wait until every message put has been marked done.
    pub async fn join(&self) {
        let mut rx = self.unfinished.subscribe();
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    /// Wake all pending and future `get` calls with `None`.
    pub fn close(&self) {
        self.closed.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new()
    }
}
