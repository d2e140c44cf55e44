//! In-process transport.
//!
//! A [`MemoryNetwork`] maps endpoint names to listening agents. Every send
//! over a [`MemoryClientConnection`] is one request/response exchange, like
//! an HTTP POST: the listener receives an [`Exchange`] holding the
//! request and may answer it once.

use crate::core::{their_endpoint, Error, PeerMetadata, Result};
use crate::transport::connection::{Connection, ConnectionState, ConnectionType};
use crate::transport::exchange::{Exchange, Response};
use crate::transport::{ConnectionSender, InboundTransport, OutboundTransport};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::oneshot;
use tracing::{debug, info};

/// Registry of listening endpoints.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    listeners: Arc<RwLock<HashMap<String, ConnectionSender>>>,
}

impl MemoryNetwork {
    /// Create an empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start accepting exchanges on `endpoint`, replacing any previous listener.
    pub fn listen(&self, endpoint: &str, queue: ConnectionSender) {
        self.listeners
            .write()
            .unwrap()
            .insert(endpoint.to_string(), queue);
    }

    /// Stop accepting exchanges on `endpoint`.
    pub fn unlisten(&self, endpoint: &str) {
        self.listeners.write().unwrap().remove(endpoint);
    }

    /// Whether a live listener is registered for `endpoint`.
    pub fn is_listening(&self, endpoint: &str) -> bool {
        self.listeners
            .read()
            .unwrap()
            .get(endpoint)
            .map(|queue| !queue.is_closed())
            .unwrap_or(false)
    }

    fn deliver(&self, endpoint: &str, connection: Arc<dyn Connection>) -> Result<()> {
        let listeners = self.listeners.read().unwrap();
        let queue = listeners
            .get(endpoint)
            .ok_or_else(|| Error::Transport(format!("no listener at {}", endpoint)))?;
        queue
            .send(connection)
            .map_err(|_| Error::Transport(format!("{} is not accepting connections", endpoint)))
    }
}

/// Listener side of the memory transport.
pub struct MemoryInbound {
    network: MemoryNetwork,
    endpoint: String,
}

impl MemoryInbound {
    pub fn new(network: MemoryNetwork, endpoint: &str) -> Self {
        Self {
            network,
            endpoint: endpoint.to_string(),
        }
    }
}

#[async_trait]
impl InboundTransport for MemoryInbound {
    async fn accept(&self, queue: ConnectionSender) -> Result<()> {
        info!(endpoint = %self.endpoint, "Listening on memory endpoint");
        self.network.listen(&self.endpoint, queue);
        Ok(())
    }
}

/// Client side of the memory transport.
pub struct MemoryOutbound {
    network: MemoryNetwork,
}

impl MemoryOutbound {
    pub fn new(network: MemoryNetwork) -> Self {
        Self { network }
    }
}

#[async_trait]
impl OutboundTransport for MemoryOutbound {
    async fn open(&self, metadata: &PeerMetadata) -> Result<Arc<dyn Connection>> {
        let endpoint = their_endpoint(metadata)
            .ok_or_else(|| Error::ConnectionImpossible("peer has no endpoint".to_string()))?;
        Ok(Arc::new(MemoryClientConnection::new(
            self.network.clone(),
            endpoint,
        )))
    }
}

/// A request toward a peer endpoint; readable for the response once sent.
pub struct MemoryClientConnection {
    state: ConnectionState,
    network: MemoryNetwork,
    endpoint: String,
    sent: AtomicBool,
    response: Mutex<Option<oneshot::Receiver<Response>>>,
}

impl MemoryClientConnection {
    fn new(network: MemoryNetwork, endpoint: &str) -> Self {
        Self {
            state: ConnectionState::new(ConnectionType::Send),
            network,
            endpoint: endpoint.to_string(),
            sent: AtomicBool::new(false),
            response: Mutex::new(None),
        }
    }

    /// Endpoint this connection posts to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Connection for MemoryClientConnection {
    fn state(&self) -> &ConnectionState {
        &self.state
    }

    async fn recv(&self) -> Option<Vec<u8>> {
        let pending = self.response.lock().unwrap().take()?;
        match pending.await {
            Ok(Some(bytes)) => Some(bytes),
            _ => {
                self.state.close();
                None
            }
        }
    }

    async fn send(&self, bytes: Vec<u8>) -> Result<()> {
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }
        if self.sent.swap(true, Ordering::SeqCst) {
            return Err(Error::Transport("request already sent".to_string()));
        }
        let (tx, rx) = oneshot::channel();
        *self.response.lock().unwrap() = Some(rx);
        let exchange = Arc::new(Exchange::new(bytes, tx));
        if let Err(e) = self.network.deliver(&self.endpoint, exchange) {
            self.response.lock().unwrap().take();
            self.state.close();
            return Err(e);
        }
        debug!(endpoint = %self.endpoint, connection = %self.state.id(), "Posted request");
        Ok(())
    }

    fn can_recv(&self) -> bool {
        !self.is_closed() && self.response.lock().unwrap().is_some()
    }

    fn can_send(&self) -> bool {
        !self.is_closed() && !self.sent.load(Ordering::SeqCst)
    }
}
