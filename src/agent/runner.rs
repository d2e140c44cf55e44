//! Agent: route registration, dispatch and the run loop.

use crate::agent::module::{handler, Handler, Module, ModuleRegistry};
use crate::conductor::{Conductor, SendOutcome};
use crate::config::AgentConfig;
use crate::core::{Error, PeerMetadata, Result};
use crate::messages::{Message, NOOP_TYPE};
use crate::transport::TransportFactory;
use crate::wallet::Wallet;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, error, info, warn};

struct AgentInner {
    config: AgentConfig,
    conductor: Arc<Conductor>,
    routes: RwLock<HashMap<String, Handler>>,
    modules: RwLock<ModuleRegistry>,
    running: AtomicBool,
}

/// Raised while the run loop is active, including if its future is dropped
/// mid-loop.
struct RunningFlag<'a>(&'a AtomicBool);

impl<'a> RunningFlag<'a> {
    fn set(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for RunningFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Process-level façade over a [`Conductor`]. Cheap to clone; handlers
/// receive a clone.
#[derive(Clone)]
pub struct Agent {
    inner: Arc<AgentInner>,
}

impl Agent {
    /// Wrap an existing conductor.
    pub fn new(config: AgentConfig, conductor: Arc<Conductor>) -> Self {
        let agent = Self {
            inner: Arc::new(AgentInner {
                config,
                conductor,
                routes: RwLock::new(HashMap::new()),
                modules: RwLock::new(ModuleRegistry::new()),
                running: AtomicBool::new(false),
            }),
        };
        agent.route(NOOP_TYPE, handler(|_, _| async { Ok(()) }));
        agent
    }

    /// Validate `config` and build an agent with the transports it names.
    pub fn from_config(
        config: AgentConfig,
        wallet: Arc<dyn Wallet>,
        factory: &TransportFactory,
    ) -> Result<Self> {
        config.validate()?;
        let conductor = Conductor::from_config(wallet, &config, factory)?;
        Ok(Self::new(config, Arc::new(conductor)))
    }

    pub fn config(&self) -> &AgentConfig {
        &self.inner.config
    }

    pub fn conductor(&self) -> &Arc<Conductor> {
        &self.inner.conductor
    }

    /// Route messages of exactly `msg_type` to `handler`, replacing any
    /// earlier route for that type. Returns the handler so one handler can be
    /// registered under several types.
    pub fn route(&self, msg_type: &str, handler: Handler) -> Handler {
        self.inner
            .routes
            .write()
            .unwrap()
            .insert(msg_type.to_string(), handler.clone());
        handler
    }

    /// Register a protocol module. Registering the same protocol version
    /// twice keeps the first.
    pub fn route_module<M: Module>(&self, module: Arc<M>) -> Result<()> {
        let doc_uri = module.doc_uri().to_string();
        let protocol = module.protocol().to_string();
        let added = self.inner.modules.write().unwrap().register(module)?;
        if added {
            debug!(protocol = %format!("{}{}", doc_uri, protocol), "Registered module");
        }
        Ok(())
    }

    /// Dispatch one message to its handler.
    pub async fn handle(&self, msg: Message) -> Result<()> {
        let handler = self.handler_for(&msg)?;
        handler(self.clone(), msg).await
    }

    /// Literal routes take precedence over modules.
    fn handler_for(&self, msg: &Message) -> Result<Handler> {
        if let Some(handler) = self.inner.routes.read().unwrap().get(msg.type_uri()) {
            return Ok(handler.clone());
        }

        let modules = self.inner.modules.read().unwrap();
        let module = modules.resolve(
            &msg.qualified_protocol(),
            &msg.message_type().version_info,
        );
        module
            .and_then(|module| module.routes.handler_for(msg))
            .ok_or_else(|| Error::NoRegisteredRoute(msg.type_uri().to_string()))
    }

    /// Send through the conductor.
    pub async fn send(
        &self,
        msg: Message,
        to_key: &str,
        to_did: Option<&str>,
        from_key: Option<&str>,
        meta: Option<PeerMetadata>,
    ) -> Result<SendOutcome> {
        self.inner
            .conductor
            .send(msg, to_key, to_did, from_key, meta)
            .await
    }

    /// Answer the sender of `to`, from the key it was addressed to.
    pub async fn reply(&self, to: &Message, reply: Message) -> Result<SendOutcome> {
        let context = to
            .context()
            .ok_or_else(|| Error::MessageProcessingFailed("cannot reply to a plaintext message".into()))?;
        let their_key = context
            .from_key
            .as_deref()
            .ok_or_else(|| Error::MessageProcessingFailed("cannot reply to an anonymous sender".into()))?;
        self.send(
            reply,
            their_key,
            context.from_did.as_deref(),
            context.to_key.as_deref(),
            None,
        )
        .await
    }

    /// Start the conductor and process inbound messages until the configured
    /// limit is reached or the conductor shuts down.
    ///
    /// With `halt_on_error` the first handler failure ends the loop with
    /// `MessageProcessingFailed`; otherwise failures are logged.
    pub async fn start(&self) -> Result<()> {
        let conductor = self.inner.conductor.clone();
        conductor.start();
        let _running = RunningFlag::set(&self.inner.running);
        self.run_loop(&conductor).await
    }

    async fn run_loop(&self, conductor: &Conductor) -> Result<()> {
        let limit = self.inner.config.message_limit();
        let mut processed = 0u64;
        info!(limit = ?limit, "Agent processing messages");

        while limit.map_or(true, |limit| processed < limit) {
            let Some(msg) = conductor.recv().await else {
                break;
            };
            let msg_type = msg.type_uri().to_string();
            let result = self.handle(msg).await;
            conductor.message_processed();
            processed += 1;

            if let Err(e) = result {
                if self.inner.config.halt_on_error {
                    error!(msg_type = %msg_type, error = %e, "Handler failed, halting");
                    return Err(Error::MessageProcessingFailed(format!("{}: {}", msg_type, e)));
                }
                warn!(msg_type = %msg_type, error = %e, "Failed to process message");
            }
        }

        info!(processed, "Agent stopped processing");
        Ok(())
    }

    /// Shut down the conductor. When the run loop is no longer active the
    /// remaining inbound messages are handled here so the drain completes.
    pub async fn shutdown(&self) {
        let conductor = self.inner.conductor.clone();
        if self.inner.running.load(Ordering::SeqCst) {
            conductor.shutdown().await;
            return;
        }

        let drain = async {
            while let Some(msg) = conductor.recv().await {
                if let Err(e) = self.handle(msg).await {
                    warn!(error = %e, "Failed to process message during shutdown");
                }
                conductor.message_processed();
            }
        };
        tokio::join!(conductor.shutdown(), drain);
    }
}
