//! HTTP transport.
//!
//! Inbound messages arrive as `POST /indy`. Each request becomes an
//! [`Exchange`]; the response body carries the reply if the agent answers
//! over the return route, and is empty otherwise. Outbound connections post
//! one message to the peer's `their_endpoint` and expose any response body
//! through `recv()`.

use crate::core::{their_endpoint, Error, PeerMetadata, Result};
use crate::transport::connection::{Connection, ConnectionState, ConnectionType};
use crate::transport::exchange::Exchange;
use crate::transport::{ConnectionSender, InboundTransport, OutboundTransport};
use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response as HttpResponse};
use axum::routing::post;
use axum::Router;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Path agents accept messages on.
pub const MESSAGE_PATH: &str = "/indy";

/// Content type of packed messages.
pub const WIRE_CONTENT_TYPE: &str = "application/ssi-agent-wire";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Socket address part of an endpoint: `http://host:port/indy` and
/// `host:port` both give `host:port`.
pub fn bind_address(endpoint: &str) -> &str {
    let rest = endpoint.strip_prefix("http://").unwrap_or(endpoint);
    rest.split('/').next().unwrap_or(rest)
}

/// HTTP listener.
pub struct HttpInbound {
    address: String,
    listener: Mutex<Option<TcpListener>>,
}

impl HttpInbound {
    /// Listener that binds `endpoint` when accepting starts.
    pub fn new(endpoint: &str) -> Self {
        Self {
            address: bind_address(endpoint).to_string(),
            listener: Mutex::new(None),
        }
    }

    /// Bind `endpoint` now, so the actual address is known before accepting.
    pub async fn bind(endpoint: &str) -> Result<Self> {
        let address = bind_address(endpoint).to_string();
        let listener = TcpListener::bind(&address).await?;
        Ok(Self {
            address,
            listener: Mutex::new(Some(listener)),
        })
    }

    /// Address of a listener bound with [`HttpInbound::bind`] that has not
    /// started accepting yet.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener
            .lock()
            .unwrap()
            .as_ref()
            .and_then(|listener| listener.local_addr().ok())
    }
}

#[async_trait]
impl InboundTransport for HttpInbound {
    async fn accept(&self, queue: ConnectionSender) -> Result<()> {
        let bound = self.listener.lock().unwrap().take();
        let listener = match bound {
            Some(listener) => listener,
            None => TcpListener::bind(&self.address).await?,
        };
        let address = listener.local_addr()?;
        info!(address = %address, path = MESSAGE_PATH, "HTTP transport listening");

        let app = Router::new()
            .route(MESSAGE_PATH, post(receive_message))
            .with_state(queue);
        axum::serve(listener, app).await?;
        Ok(())
    }
}

/// Hand the request to the conductor and stream back whatever it answers.
async fn receive_message(State(queue): State<ConnectionSender>, body: Bytes) -> HttpResponse {
    let (tx, rx) = oneshot::channel();
    let exchange = Arc::new(Exchange::new(body.to_vec(), tx));
    debug!(connection = %exchange.id(), bytes = body.len(), "HTTP message received");
    if queue.send(exchange).is_err() {
        warn!("HTTP message refused, agent is not accepting connections");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let reply = futures::stream::once(async move {
        let bytes = match rx.await {
            Ok(Some(bytes)) => Bytes::from(bytes),
            _ => Bytes::new(),
        };
        Ok::<_, Infallible>(bytes)
    });
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, WIRE_CONTENT_TYPE)],
        Body::from_stream(reply),
    )
        .into_response()
}

/// HTTP client side.
pub struct HttpOutbound {
    client: reqwest::Client,
}

impl HttpOutbound {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| Error::Transport(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl OutboundTransport for HttpOutbound {
    async fn open(&self, metadata: &PeerMetadata) -> Result<Arc<dyn Connection>> {
        let endpoint = their_endpoint(metadata)
            .ok_or_else(|| Error::ConnectionImpossible("peer has no endpoint".to_string()))?;
        Ok(Arc::new(HttpClientConnection::new(
            self.client.clone(),
            endpoint,
        )))
    }
}

/// One POST toward a peer; readable for the response body once sent.
pub struct HttpClientConnection {
    state: ConnectionState,
    client: reqwest::Client,
    endpoint: String,
    sent: AtomicBool,
    response: Mutex<Option<reqwest::Response>>,
}

impl HttpClientConnection {
    fn new(client: reqwest::Client, endpoint: &str) -> Self {
        Self {
            state: ConnectionState::new(ConnectionType::Send),
            client,
            endpoint: endpoint.to_string(),
            sent: AtomicBool::new(false),
            response: Mutex::new(None),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Connection for HttpClientConnection {
    fn state(&self) -> &ConnectionState {
        &self.state
    }

    async fn recv(&self) -> Option<Vec<u8>> {
        let response = self.response.lock().unwrap().take()?;
        match response.bytes().await {
            Ok(body) if !body.is_empty() => Some(body.to_vec()),
            Ok(_) => {
                self.state.close();
                None
            }
            Err(e) => {
                debug!(endpoint = %self.endpoint, error = %e, "Response body unreadable");
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

        let result = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, WIRE_CONTENT_TYPE)
            .body(bytes)
            .send()
            .await
            .and_then(|response| response.error_for_status());
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                self.state.close();
                return Err(Error::Transport(format!("POST {}: {}", self.endpoint, e)));
            }
        };
        debug!(endpoint = %self.endpoint, status = %response.status(), "Posted message");
        *self.response.lock().unwrap() = Some(response);
        Ok(())
    }

    fn can_recv(&self) -> bool {
        !self.is_closed() && self.response.lock().unwrap().is_some()
    }

    fn can_send(&self) -> bool {
        !self.is_closed() && !self.sent.load(Ordering::SeqCst)
    }
}
