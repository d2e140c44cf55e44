//! Connection abstraction.
//!
//! A [`Connection`] is one logical exchange with a peer. Transports decide how
//! many inbound chunks it yields and whether it can carry a reply; the
//! conductor only relies on this trait.

use crate::core::Result;
use async_trait::async_trait;
use tokio::sync::{watch, Mutex, MutexGuard};
use uuid::Uuid;

/// Direction a connection was created for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionType {
    /// Accepted from a peer
    Recv,
    /// Opened toward a peer
    Send,
    /// Both directions
    Bidi,
}

impl std::fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionType::Recv => write!(f, "recv"),
            ConnectionType::Send => write!(f, "send"),
            ConnectionType::Bidi => write!(f, "bidi"),
        }
    }
}

/// Lifecycle state shared by every connection implementation.
pub struct ConnectionState {
    id: String,
    conn_type: ConnectionType,
    closed: watch::Sender<bool>,
    recv_lock: Mutex<()>,
}

impl ConnectionState {
    /// Create an open connection state.
    pub fn new(conn_type: ConnectionType) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            id: Uuid::new_v4().to_string(),
            conn_type,
            closed,
            recv_lock: Mutex::new(()),
        }
    }

    /// Unique id, used in logs.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Direction tag.
    pub fn conn_type(&self) -> ConnectionType {
        self.conn_type
    }

    /// Mark closed. Returns `true` only for the call that closed it.
    pub fn close(&self) -> bool {
        !self.closed.send_replace(true)
    }

    /// Whether the connection has been closed.
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Resolve once the connection is closed.
    pub async fn wait(&self) {
        let mut rx = self.closed.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Take exclusive read access.
    pub async fn lock_recv(&self) -> MutexGuard<'_, ()> {
        self.recv_lock.lock().await
    }

    /// Whether some task currently holds read access.
    pub fn is_recv_locked(&self) -> bool {
        self.recv_lock.try_lock().is_err()
    }
}

/// A single logical exchange with a peer.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Shared lifecycle state.
    fn state(&self) -> &ConnectionState;

    /// Next inbound chunk, or `None` when the transport has nothing more.
    async fn recv(&self) -> Option<Vec<u8>>;

    /// Send bytes to the peer. Fails with `ConnectionClosed` once closed.
    async fn send(&self, bytes: Vec<u8>) -> Result<()>;

    /// Whether the transport can still produce inbound data.
    fn can_recv(&self) -> bool;

    /// Whether the transport can still accept outbound data.
    fn can_send(&self) -> bool;

    /// Close the connection; idempotent.
    fn close(&self) {
        self.state().close();
    }

    fn is_closed(&self) -> bool {
        self.state().is_closed()
    }

    /// Resolve once the connection is closed.
    async fn wait(&self) {
        self.state().wait().await
    }

    fn id(&self) -> &str {
        self.state().id()
    }
}
