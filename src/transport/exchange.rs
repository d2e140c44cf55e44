//! Single-shot request/response exchange.
//!
//! Both the memory and HTTP listeners hand the conductor an [`Exchange`]: one
//! request chunk and at most one response, delivered through a oneshot to
//! whoever is waiting on the other side of the request.

use crate::core::{Error, Result};
use crate::transport::connection::{Connection, ConnectionState, ConnectionType};
use async_trait::async_trait;
use std::sync::Mutex;
use tokio::sync::oneshot;
use tracing::debug;

/// Response to a request; `None` when the exchange closed without one.
pub type Response = Option<Vec<u8>>;

/// One inbound request awaiting at most one response.
pub struct Exchange {
    state: ConnectionState,
    request: Mutex<Option<Vec<u8>>>,
    responder: Mutex<Option<oneshot::Sender<Response>>>,
}

impl Exchange {
    /// Wrap `request`; the response, if any, goes to `responder`.
    pub fn new(request: Vec<u8>, responder: oneshot::Sender<Response>) -> Self {
        Self {
            state: ConnectionState::new(ConnectionType::Bidi),
            request: Mutex::new(Some(request)),
            responder: Mutex::new(Some(responder)),
        }
    }
}

#[async_trait]
impl Connection for Exchange {
    fn state(&self) -> &ConnectionState {
        &self.state
    }

    async fn recv(&self) -> Option<Vec<u8>> {
        self.request.lock().unwrap().take()
    }

    async fn send(&self, bytes: Vec<u8>) -> Result<()> {
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }
        let responder = self
            .responder
            .lock()
            .unwrap()
            .take()
            .ok_or(Error::ConnectionClosed)?;
        let delivered = responder.send(Some(bytes));
        self.state.close();
        delivered.map_err(|_| Error::Transport("requester went away".to_string()))
    }

    fn can_recv(&self) -> bool {
        self.request.lock().unwrap().is_some()
    }

    fn can_send(&self) -> bool {
        !self.is_closed() && self.responder.lock().unwrap().is_some()
    }

    fn close(&self) {
        if self.state.close() {
            // Complete the exchange with an empty response
            if let Some(responder) = self.responder.lock().unwrap().take() {
                let _ = responder.send(None);
            }
            debug!(connection = %self.state.id(), "Exchange closed");
        }
    }
}
