//! Transports
//!
//! Pluggable delivery beneath the conductor:
//! - `Connection` abstraction over one logical exchange
//! - Single-shot request/response exchanges over memory or HTTP
//! - Standard input/output line transports
//! - Factory mapping configured names to implementations

pub mod connection;
pub mod exchange;
pub mod factory;
pub mod http;
pub mod memory;
pub mod stdio;

pub use connection::{Connection, ConnectionState, ConnectionType};
pub use exchange::Exchange;
pub use factory::{TransportFactory, TransportKind};
pub use http::{HttpInbound, HttpOutbound};
pub use memory::{MemoryInbound, MemoryNetwork, MemoryOutbound};
pub use stdio::{StdinTransport, StdoutTransport};

use crate::core::{PeerMetadata, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Queue into which inbound transports push accepted connections.
pub type ConnectionSender = mpsc::UnboundedSender<Arc<dyn Connection>>;

/// Receiving end of [`ConnectionSender`].
pub type ConnectionReceiver = mpsc::UnboundedReceiver<Arc<dyn Connection>>;

/// Source of inbound connections.
#[async_trait]
pub trait InboundTransport: Send + Sync {
    /// Push arriving connections into `queue`.
    ///
    /// May return immediately after registering a listener or run until the
    /// underlying source is exhausted.
    async fn accept(&self, queue: ConnectionSender) -> Result<()>;
}

/// Opener of outbound connections.
#[async_trait]
pub trait OutboundTransport: Send + Sync {
    /// Open a connection toward the peer described by `metadata`.
    ///
    /// Fails with `ConnectionImpossible` when the peer has no reachable
    /// endpoint.
    async fn open(&self, metadata: &PeerMetadata) -> Result<Arc<dyn Connection>>;
}
