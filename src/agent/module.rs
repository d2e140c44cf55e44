//! Protocol modules and version negotiation.
//!
//! A module bundles the handlers for one protocol at one version. Its
//! handlers are listed explicitly at registration time, keyed either by the
//! full message type or by the short type.

use crate::agent::runner::Agent;
use crate::core::{Error, Result};
use crate::messages::message_type::is_name;
use crate::messages::{Message, SemVer};
use futures::future::BoxFuture;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;

/// Message handler.
pub type Handler = Arc<dyn Fn(Agent, Message) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Wrap an async function or closure as a [`Handler`].
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(Agent, Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |agent, msg| Box::pin(f(agent, msg)))
}

/// A versioned bundle of handlers for one protocol.
pub trait Module: Send + Sync + 'static {
    /// Document URI prefix, including its trailing separator.
    fn doc_uri(&self) -> &str;

    /// Protocol name.
    fn protocol(&self) -> &str;

    /// Protocol version, `MAJOR.MINOR[.PATCH]`.
    fn version(&self) -> &str;

    /// Handlers this module serves.
    fn routes(self: Arc<Self>) -> ModuleRoutes;
}

/// Handlers declared by a module.
#[derive(Clone, Default)]
pub struct ModuleRoutes {
    by_type: HashMap<String, Handler>,
    by_short_type: HashMap<String, Handler>,
}

impl ModuleRoutes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle the exact message type `msg_type`.
    pub fn on_type(mut self, msg_type: &str, handler: Handler) -> Self {
        self.by_type.insert(msg_type.to_string(), handler);
        self
    }

    /// Handle any message of this module's protocol whose short type is
    /// `short_type`.
    pub fn on_short_type(mut self, short_type: &str, handler: Handler) -> Self {
        self.by_short_type.insert(short_type.to_string(), handler);
        self
    }

    /// Handler for `msg`: full-type routes first, then short type.
    pub fn handler_for(&self, msg: &Message) -> Option<Handler> {
        self.by_type
            .get(msg.type_uri())
            .or_else(|| self.by_short_type.get(&msg.message_type().short_type))
            .cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty() && self.by_short_type.is_empty()
    }
}

/// Identity of a registered module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleInfo {
    pub doc_uri: String,
    pub protocol: String,
    pub version: SemVer,
}

impl ModuleInfo {
    /// Validate and capture a module's identity.
    pub fn of<M: Module + ?Sized>(module: &M) -> Result<Self> {
        let version = SemVer::parse(module.version()).map_err(|e| {
            Error::InvalidModule(format!("{}{}: {}", module.doc_uri(), module.protocol(), e))
        })?;
        if !is_name(module.protocol()) {
            return Err(Error::InvalidModule(format!(
                "{}: bad protocol name {:?}",
                module.doc_uri(),
                module.protocol()
            )));
        }
        Ok(Self {
            doc_uri: module.doc_uri().to_string(),
            protocol: module.protocol().to_string(),
            version,
        })
    }

    pub fn qualified_protocol(&self) -> String {
        format!("{}{}", self.doc_uri, self.protocol)
    }

    /// Version with all three components, e.g. `1.0.0`.
    pub fn normalized_version(&self) -> String {
        self.version.to_string()
    }

    /// `<doc_uri><protocol>/<normalized version>`
    pub fn protocol_identifier_uri(&self) -> String {
        format!("{}/{}", self.qualified_protocol(), self.normalized_version())
    }
}

/// A module's identity with the handlers it declared.
#[derive(Clone)]
pub struct RegisteredModule {
    pub info: ModuleInfo,
    pub routes: ModuleRoutes,
}

/// Qualified protocol to the registered versions of it.
#[derive(Default)]
pub struct ModuleRegistry {
    protocols: HashMap<String, BTreeMap<SemVer, RegisteredModule>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module. Returns `false` when that protocol version is
    /// already registered, leaving the first registration in place.
    pub fn register<M: Module>(&mut self, module: Arc<M>) -> Result<bool> {
        let info = ModuleInfo::of(module.as_ref())?;
        let versions = self.protocols.entry(info.qualified_protocol()).or_default();
        if versions.contains_key(&info.version) {
            return Ok(false);
        }
        let routes = module.routes();
        versions.insert(info.version.clone(), RegisteredModule { info, routes });
        Ok(true)
    }

    /// Highest registered version sharing the requested major version.
    ///
    /// Versions with a greater major are skipped; reaching a lower major ends
    /// the search.
    pub fn resolve(&self, qualified_protocol: &str, requested: &SemVer) -> Option<&RegisteredModule> {
        let versions = self.protocols.get(qualified_protocol)?;
        for (version, module) in versions.iter().rev() {
            if version.major > requested.major {
                continue;
            }
            if version.major == requested.major {
                return Some(module);
            }
            break;
        }
        None
    }

    /// Registered versions of a protocol, ascending.
    pub fn versions(&self, qualified_protocol: &str) -> Vec<SemVer> {
        self.protocols
            .get(qualified_protocol)
            .map(|versions| versions.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.protocols.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "did:test:1234;spec/";

    struct Versioned(&'static str);

    impl Module for Versioned {
        fn doc_uri(&self) -> &str {
            DOC
        }

        fn protocol(&self) -> &str {
            "testing"
        }

        fn version(&self) -> &str {
            self.0
        }

        fn routes(self: Arc<Self>) -> ModuleRoutes {
            ModuleRoutes::new().on_short_type("ping", handler(|_, _| async { Ok(()) }))
        }
    }

    fn registry(versions: &[&'static str]) -> ModuleRegistry {
        let mut registry = ModuleRegistry::new();
        for &v in versions {
            assert!(registry.register(Arc::new(Versioned(v))).unwrap());
        }
        registry
    }

    fn resolved(registry: &ModuleRegistry, requested: &str) -> Option<String> {
        registry
            .resolve(&format!("{}testing", DOC), &SemVer::parse(requested).unwrap())
            .map(|m| m.info.normalized_version())
    }

    #[test]
    fn test_highest_same_major_wins() {
        let registry = registry(&["1.0", "2.0", "1.5"]);
        assert_eq!(resolved(&registry, "1.0").as_deref(), Some("1.5.0"));
        assert_eq!(resolved(&registry, "1.9").as_deref(), Some("1.5.0"));
        assert_eq!(resolved(&registry, "2.0").as_deref(), Some("2.0.0"));
        assert_eq!(resolved(&registry, "3.0"), None);
        assert_eq!(resolved(&registry, "0.1"), None);
    }

    #[test]
    fn test_unknown_protocol_resolves_nothing() {
        let registry = registry(&["1.0"]);
        assert!(registry
            .resolve("did:other:1;spec/testing", &SemVer::new(1, 0, 0))
            .is_none());
    }

    #[test]
    fn test_duplicate_version_is_noop() {
        let mut registry = registry(&["1.0"]);
        assert!(!registry.register(Arc::new(Versioned("1.0.0"))).unwrap());
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.versions(&format!("{}testing", DOC)),
            vec![SemVer::new(1, 0, 0)]
        );
    }

    #[test]
    fn test_invalid_version_rejected() {
        let mut registry = ModuleRegistry::new();
        assert!(matches!(
            registry.register(Arc::new(Versioned("one"))),
            Err(Error::InvalidModule(_))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_module_info() {
        let info = ModuleInfo::of(&Versioned("1.0")).unwrap();
        assert_eq!(info.qualified_protocol(), "did:test:1234;spec/testing");
        assert_eq!(info.normalized_version(), "1.0.0");
        assert_eq!(
            info.protocol_identifier_uri(),
            "did:test:1234;spec/testing/1.0.0"
        );
    }

    #[test]
    fn test_routes_prefer_full_type() {
        let full = handler(|_, _| async { Ok(()) });
        let short = handler(|_, _| async { Ok(()) });
        let routes = ModuleRoutes::new()
            .on_type(&format!("{}testing/1.0/ping", DOC), full.clone())
            .on_short_type("ping", short.clone())
            .on_short_type("pong", short.clone());

        let ping = Message::with_type(&format!("{}testing/1.0/ping", DOC)).unwrap();
        assert!(Arc::ptr_eq(&routes.handler_for(&ping).unwrap(), &full));

        let pong = Message::with_type(&format!("{}testing/1.0/pong", DOC)).unwrap();
        assert!(Arc::ptr_eq(&routes.handler_for(&pong).unwrap(), &short));

        let other = Message::with_type(&format!("{}testing/1.0/other", DOC)).unwrap();
        assert!(routes.handler_for(&other).is_none());
        assert!(!routes.is_empty());
    }
}
