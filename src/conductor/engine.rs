//! Connection engine.
//!
//! The [`Conductor`] accepts inbound connections, reads and unpacks messages
//! into the inbound queue, honours the return-route protocol, and delivers
//! outbound messages by reusing a held connection, opening a new one, or
//! queueing for the peer until it connects back.

use crate::conductor::pending::{PendingMessage, PendingQueues};
use crate::conductor::queue::MessageQueue;
use crate::config::AgentConfig;
use crate::core::{PeerMetadata, Result};
use crate::hooks::{hooks_for, HookRegistry, Hookable};
use crate::messages::{Message, Noop, ReturnRoute};
use crate::transport::{Connection, InboundTransport, OutboundTransport, TransportFactory};
use crate::wallet::Wallet;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Result of a send that did not fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// Handed to a connection
    Delivered,
    /// Held for the peer; `pending` is the peer's queue length afterwards
    Queued { pending: usize },
}

impl SendOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, SendOutcome::Delivered)
    }
}

struct BackgroundTask {
    handle: JoinHandle<()>,
    /// Aborted at shutdown; otherwise awaited to completion
    cancellable: bool,
}

/// Transport and routing engine beneath an agent.
pub struct Conductor {
    wallet: Arc<dyn Wallet>,
    inbound_transport: Arc<dyn InboundTransport>,
    outbound_transport: Arc<dyn OutboundTransport>,
    inbound: MessageQueue,
    open_connections: Mutex<HashMap<String, Arc<dyn Connection>>>,
    pending: PendingQueues,
    tasks: Mutex<Vec<BackgroundTask>>,
    stopping: watch::Sender<bool>,
    hooks: HookRegistry,
}

impl Conductor {
    pub fn new(
        wallet: Arc<dyn Wallet>,
        inbound_transport: Arc<dyn InboundTransport>,
        outbound_transport: Arc<dyn OutboundTransport>,
    ) -> Self {
        let (stopping, _) = watch::channel(false);
        Self {
            wallet,
            inbound_transport,
            outbound_transport,
            inbound: MessageQueue::new(),
            open_connections: Mutex::new(HashMap::new()),
            pending: PendingQueues::new(),
            tasks: Mutex::new(Vec::new()),
            stopping,
            hooks: HookRegistry::new(),
        }
    }

    /// Build with the transports named in `config`.
    pub fn from_config(
        wallet: Arc<dyn Wallet>,
        config: &AgentConfig,
        factory: &TransportFactory,
    ) -> Result<Self> {
        let inbound = factory.inbound(config)?;
        let outbound = factory.outbound(config)?;
        Ok(Self::new(wallet, inbound, outbound))
    }

    pub fn wallet(&self) -> &Arc<dyn Wallet> {
        &self.wallet
    }

    /// Start accepting connections.
    pub fn start(self: &Arc<Self>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Arc<dyn Connection>>();

        let inbound = self.inbound_transport.clone();
        self.spawn_task(true, async move {
            if let Err(e) = inbound.accept(tx).await {
                error!(error = %e, "Inbound transport failed");
            }
        });

        let this = self.clone();
        self.spawn_task(true, async move {
            while let Some(conn) = rx.recv().await {
                debug!(connection = %conn.id(), kind = %conn.state().conn_type(), "Accepted connection");
                this.spawn_task(true, this.clone().message_reader(conn));
            }
        });
        info!("Conductor started");
    }

    /// Next inbound message; `None` after shutdown.
    pub async fn recv(&self) -> Option<Message> {
        self.inbound.get().await
    }

    /// Take an inbound message without waiting.
    pub fn try_recv(&self) -> Option<Message> {
        self.inbound.try_get()
    }

    /// Report that a message from `recv` has been handled.
    pub fn message_processed(&self) {
        self.inbound.task_done();
    }

    /// Inject a message into the inbound queue.
    pub fn put_message(&self, msg: Message) {
        self.inbound.put(msg);
    }

    /// Messages queued for `peer` awaiting a connection.
    pub fn pending_count(&self, peer: &str) -> usize {
        self.pending.len(peer)
    }

    /// Connection currently held for replies to `peer`.
    pub fn open_connection(&self, peer: &str) -> Option<Arc<dyn Connection>> {
        self.open_connections.lock().unwrap().get(peer).cloned()
    }

    /// Unpack raw bytes into a message. Hook point `unpack`.
    pub async fn unpack(&self, bytes: Vec<u8>) -> Result<Message> {
        let wallet = &self.wallet;
        hooks_for(self, "unpack")?
            .run_async("unpack", &bytes, |bytes| wallet.unpack(bytes))
            .await
    }

    /// Pack a message for `to_key`. Hook point `pack`.
    pub async fn pack(&self, msg: &Message, to_key: &str, from_key: Option<&str>) -> Result<Vec<u8>> {
        let wallet = &self.wallet;
        hooks_for(self, "pack")?
            .run_async("pack", msg, |msg| async move {
                let plaintext = msg.serialize()?;
                let recipients = [to_key.to_string()];
                wallet.pack(&plaintext, &recipients, from_key).await
            })
            .await
    }

    /// Deliver `msg` to `to_key`.
    ///
    /// Reuses a connection the peer left open for replies; otherwise opens
    /// one from `meta`, or from the wallet's metadata for `to_did` (falling
    /// back to `to_key`). A peer without a reachable endpoint gets the
    /// message queued, as does a peer whose fresh connection fails on send.
    pub async fn send(
        self: &Arc<Self>,
        msg: Message,
        to_key: &str,
        to_did: Option<&str>,
        from_key: Option<&str>,
        meta: Option<PeerMetadata>,
    ) -> Result<SendOutcome> {
        if let Some(conn) = self.reusable_connection(to_key) {
            let packed = self.pack(&msg, to_key, from_key).await?;
            match conn.send(packed).await {
                Ok(()) => {
                    debug!(to = %to_key, connection = %conn.id(), "Sent over return route");
                    self.after_send(conn);
                    return Ok(SendOutcome::Delivered);
                }
                Err(e) => {
                    debug!(to = %to_key, error = %e, "Return route unusable, opening new connection");
                    self.forget_connection(to_key, &conn);
                }
            }
        }

        let meta = match meta {
            Some(meta) => meta,
            None => match to_did {
                Some(did) => self.wallet.metadata_for_did(did).await?,
                None => self.wallet.metadata_for_key(to_key).await?,
            },
        };

        let conn = match self.outbound_transport.open(&meta).await {
            Ok(conn) => conn,
            Err(e) if e.is_connection_impossible() => {
                return Ok(self.enqueue(msg, to_key, from_key));
            }
            Err(e) => return Err(e),
        };

        let packed = self.pack(&msg, to_key, from_key).await?;
        if let Err(e) = conn.send(packed).await {
            warn!(to = %to_key, error = %e, "Send failed, queueing for later delivery");
            conn.close();
            return Ok(self.enqueue(msg, to_key, from_key));
        }
        debug!(to = %to_key, connection = %conn.id(), "Sent over new connection");
        self.after_send(conn);
        Ok(SendOutcome::Delivered)
    }

    /// Drain the pending queue for `peer` over `conn` while it can send.
    ///
    /// Each message carries the number still queued behind it in
    /// `~transport.pending_message_count`.
    pub async fn pump_queue(self: Arc<Self>, conn: Arc<dyn Connection>, peer: String) {
        let mut sent = 0usize;
        while !conn.is_closed() && conn.can_send() {
            let Some((item, remaining)) = self.pending.pop(&peer) else {
                break;
            };
            let mut msg = item.message.clone();
            msg.set_pending_message_count(remaining as u64);

            let result = match self.pack(&msg, &item.to_key, item.from_key.as_deref()).await {
                Ok(packed) => conn.send(packed).await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                warn!(peer = %peer, error = %e, "Pump interrupted, message requeued");
                self.pending.push_front(&peer, item);
                break;
            }
            sent += 1;
            debug!(peer = %peer, remaining, "Pumped queued message");
        }
        if sent > 0 {
            info!(peer = %peer, sent, "Drained pending messages");
        }
    }

    /// Ask `to_key` for a return-routable connection so its queued messages
    /// for us can flow back.
    pub async fn pump_remote_queue(
        self: &Arc<Self>,
        to_key: &str,
        to_did: Option<&str>,
        from_key: Option<&str>,
    ) -> Result<SendOutcome> {
        debug!(to = %to_key, "Soliciting queued messages from peer");
        self.send(Noop::with_return_route(), to_key, to_did, from_key, None)
            .await
    }

    /// Drain the inbound queue, close connections, then stop background work.
    pub async fn shutdown(&self) {
        info!(unfinished = self.inbound.unfinished(), "Conductor draining inbound queue");
        self.inbound.join().await;

        self.stopping.send_replace(true);
        self.close_open_connections();

        loop {
            let tasks = std::mem::take(&mut *self.tasks.lock().unwrap());
            if tasks.is_empty() {
                break;
            }
            let (cancellable, lasting): (Vec<_>, Vec<_>) =
                tasks.into_iter().partition(|task| task.cancellable);

            for task in &cancellable {
                task.handle.abort();
            }
            for task in cancellable {
                if let Err(e) = task.handle.await {
                    if !e.is_cancelled() {
                        warn!(error = %e, "Background task failed");
                    }
                }
            }

            self.close_open_connections();
            for task in lasting {
                if let Err(e) = task.handle.await {
                    warn!(error = %e, "Background task failed");
                }
            }
        }

        self.inbound.close();
        info!("Conductor stopped");
    }

    /// Read `conn` until it is exhausted or closed, applying the return-route
    /// rules to each message.
    fn message_reader(self: Arc<Self>, conn: Arc<dyn Connection>) -> BoxFuture<'static, ()> {
        Box::pin(async move { self.read_connection(conn).await })
    }

    async fn read_connection(self: Arc<Self>, conn: Arc<dyn Connection>) {
        let _guard = conn.state().lock_recv().await;

        while let Some(chunk) = conn.recv().await {
            if chunk.is_empty() {
                continue;
            }

            let msg = match self.unpack(chunk).await {
                Ok(msg) => msg,
                Err(e) => {
                    warn!(connection = %conn.id(), error = %e, "Dropping unreadable message");
                    conn.close();
                    break;
                }
            };
            let context = msg.context().cloned();
            let transport = msg.transport();
            debug!(connection = %conn.id(), msg_type = %msg.type_uri(), "Received message");

            let Some(context) = context else {
                self.inbound.put(msg);
                debug!(connection = %conn.id(), "Plaintext message, closing connection");
                conn.close();
                break;
            };
            let Some(from_key) = context.from_key else {
                self.inbound.put(msg);
                debug!(connection = %conn.id(), "Anonymous sender, closing connection");
                conn.close();
                break;
            };

            // Register before enqueueing; a handler may reply at once
            let return_route = transport.as_ref().and_then(|t| t.return_route);
            match return_route {
                Some(ReturnRoute::All) => self.hold_connection(&from_key, &conn),
                Some(ReturnRoute::None) => {
                    if self.open_connections.lock().unwrap().remove(&from_key).is_some() {
                        debug!(peer = %from_key, "Return route revoked");
                    }
                }
                Some(ReturnRoute::Thread) | None => {}
            }
            self.inbound.put(msg);

            let pending_remote = transport
                .and_then(|t| t.pending_message_count)
                .unwrap_or(0);
            if pending_remote > 0 {
                let this = self.clone();
                let (to_key, to_did, my_key) = (from_key, context.from_did, context.to_key);
                self.spawn_task(false, async move {
                    if let Err(e) = this
                        .pump_remote_queue(&to_key, to_did.as_deref(), my_key.as_deref())
                        .await
                    {
                        warn!(peer = %to_key, error = %e, "Could not solicit queued messages");
                    }
                });
            }

            if return_route != Some(ReturnRoute::All) && !conn.can_recv() {
                conn.close();
                break;
            }
        }
    }

    /// Keep `conn` for replies to `peer` until it closes, and flush anything
    /// already queued for that peer over it.
    fn hold_connection(self: &Arc<Self>, peer: &str, conn: &Arc<dyn Connection>) {
        self.open_connections
            .lock()
            .unwrap()
            .insert(peer.to_string(), conn.clone());
        debug!(peer = %peer, connection = %conn.id(), "Holding connection for return route");

        let this = self.clone();
        let (watched, owner) = (conn.clone(), peer.to_string());
        let mut stopping = self.stopping.subscribe();
        self.spawn_task(false, async move {
            tokio::select! {
                _ = watched.wait() => {}
                _ = stopping.wait_for(|stop| *stop) => watched.close(),
            }
            this.forget_connection(&owner, &watched);
        });

        if self.pending.len(peer) > 0 {
            let this = self.clone();
            let (conn, peer) = (conn.clone(), peer.to_string());
            self.spawn_task(false, async move { this.pump_queue(conn, peer).await });
        }
    }

    fn reusable_connection(&self, peer: &str) -> Option<Arc<dyn Connection>> {
        let mut open = self.open_connections.lock().unwrap();
        let conn = open.get(peer)?.clone();
        if conn.is_closed() || !conn.can_send() {
            open.remove(peer);
            return None;
        }
        Some(conn)
    }

    /// Drop the table entry for `peer` if it still refers to `conn`.
    fn forget_connection(&self, peer: &str, conn: &Arc<dyn Connection>) {
        let mut open = self.open_connections.lock().unwrap();
        if open.get(peer).map(|held| held.id() == conn.id()).unwrap_or(false) {
            open.remove(peer);
            debug!(peer = %peer, connection = %conn.id(), "Released return route");
        }
    }

    fn enqueue(&self, msg: Message, to_key: &str, from_key: Option<&str>) -> SendOutcome {
        let pending = self
            .pending
            .push(to_key, PendingMessage::new(msg, to_key, from_key));
        info!(to = %to_key, pending, "Peer unreachable, message queued");
        SendOutcome::Queued { pending }
    }

    /// Listen for a reply on a connection we just sent over.
    fn after_send(self: &Arc<Self>, conn: Arc<dyn Connection>) {
        if !conn.is_closed() && conn.can_recv() && !conn.state().is_recv_locked() {
            self.spawn_task(true, self.clone().message_reader(conn));
        }
    }

    fn close_open_connections(&self) {
        let open: Vec<_> = self
            .open_connections
            .lock()
            .unwrap()
            .drain()
            .map(|(_, conn)| conn)
            .collect();
        for conn in open {
            conn.close();
        }
    }

    fn spawn_task<F>(&self, cancellable: bool, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(fut);
        let mut tasks = self.tasks.lock().unwrap();
        tasks.retain(|task| !task.handle.is_finished());
        tasks.push(BackgroundTask {
            handle,
            cancellable,
        });
    }
}

impl Hookable for Conductor {
    fn hooks(&self) -> Option<&HookRegistry> {
        Some(&self.hooks)
    }
}

impl std::fmt::Debug for Conductor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conductor")
            .field("unfinished", &self.inbound.unfinished())
            .field("open_connections", &self.open_connections.lock().unwrap().len())
            .field("pending", &self.pending.total())
            .finish()
    }
}
