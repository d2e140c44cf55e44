//! Transport factory.
//!
//! Creates transports based on configuration.

use crate::config::AgentConfig;
use crate::core::{Error, Result};
use crate::transport::http::{HttpInbound, HttpOutbound};
use crate::transport::memory::{MemoryInbound, MemoryNetwork, MemoryOutbound};
use crate::transport::stdio::{StdinTransport, StdoutTransport};
use crate::transport::{InboundTransport, OutboundTransport};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Transport implementations known to this crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportKind {
    /// Blank-line-delimited messages on standard input (inbound only)
    Stdin,
    /// Packed messages written to standard output (outbound only)
    Stdout,
    /// In-process request/response network (both directions)
    Memory,
    /// `POST /indy` listener and client (both directions)
    Http,
}

impl TransportKind {
    pub fn supports_inbound(self) -> bool {
        matches!(self, TransportKind::Stdin | TransportKind::Memory | TransportKind::Http)
    }

    pub fn supports_outbound(self) -> bool {
        matches!(self, TransportKind::Stdout | TransportKind::Memory | TransportKind::Http)
    }
}

impl FromStr for TransportKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "stdin" => Ok(TransportKind::Stdin),
            "stdout" => Ok(TransportKind::Stdout),
            "memory" => Ok(TransportKind::Memory),
            "http" => Ok(TransportKind::Http),
            other => Err(Error::UnknownTransport(other.to_string())),
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Stdin => write!(f, "stdin"),
            TransportKind::Stdout => write!(f, "stdout"),
            TransportKind::Memory => write!(f, "memory"),
            TransportKind::Http => write!(f, "http"),
        }
    }
}

/// Parse an inbound transport name, rejecting outbound-only kinds.
pub fn inbound_kind(name: &str) -> Result<TransportKind> {
    let kind: TransportKind = name.parse()?;
    if !kind.supports_inbound() {
        return Err(Error::UnknownTransport(format!("{} (inbound)", name)));
    }
    Ok(kind)
}

/// Parse an outbound transport name, rejecting inbound-only kinds.
pub fn outbound_kind(name: &str) -> Result<TransportKind> {
    let kind: TransportKind = name.parse()?;
    if !kind.supports_outbound() {
        return Err(Error::UnknownTransport(format!("{} (outbound)", name)));
    }
    Ok(kind)
}

/// Builds transports for agents; agents built from one factory share its
/// memory network.
#[derive(Clone, Default)]
pub struct TransportFactory {
    network: MemoryNetwork,
}

impl TransportFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an existing network.
    pub fn with_network(network: MemoryNetwork) -> Self {
        Self { network }
    }

    pub fn network(&self) -> &MemoryNetwork {
        &self.network
    }

    /// Create the configured inbound transport.
    pub fn inbound(&self, config: &AgentConfig) -> Result<Arc<dyn InboundTransport>> {
        match inbound_kind(&config.inbound_transport)? {
            TransportKind::Stdin => Ok(Arc::new(StdinTransport::new()) as Arc<dyn InboundTransport>),
            TransportKind::Memory => {
                let endpoint = config.endpoint.as_deref().ok_or_else(|| {
                    Error::InvalidConfig("memory inbound transport requires an endpoint".to_string())
                })?;
                Ok(Arc::new(MemoryInbound::new(self.network.clone(), endpoint)))
            }
            TransportKind::Http => {
                let endpoint = config.endpoint.as_deref().ok_or_else(|| {
                    Error::InvalidConfig("http inbound transport requires an endpoint".to_string())
                })?;
                Ok(Arc::new(HttpInbound::new(endpoint)))
            }
            TransportKind::Stdout => Err(Error::UnknownTransport(config.inbound_transport.clone())),
        }
    }

    /// Create the configured outbound transport.
    pub fn outbound(&self, config: &AgentConfig) -> Result<Arc<dyn OutboundTransport>> {
        match outbound_kind(&config.outbound_transport)? {
            TransportKind::Stdout => Ok(Arc::new(StdoutTransport::new()) as Arc<dyn OutboundTransport>),
            TransportKind::Memory => Ok(Arc::new(MemoryOutbound::new(self.network.clone()))),
            TransportKind::Http => Ok(Arc::new(HttpOutbound::new()?)),
            TransportKind::Stdin => Err(Error::UnknownTransport(config.outbound_transport.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing() {
        assert_eq!("stdin".parse::<TransportKind>().unwrap(), TransportKind::Stdin);
        assert_eq!("memory".parse::<TransportKind>().unwrap(), TransportKind::Memory);
        assert_eq!("http".parse::<TransportKind>().unwrap(), TransportKind::Http);
        assert_eq!(TransportKind::Stdout.to_string(), "stdout");
        assert!(matches!(
            "smtp".parse::<TransportKind>(),
            Err(Error::UnknownTransport(_))
        ));
    }

    #[test]
    fn test_direction_checked() {
        assert!(inbound_kind("stdin").is_ok());
        assert!(matches!(inbound_kind("stdout"), Err(Error::UnknownTransport(_))));
        assert!(matches!(outbound_kind("stdin"), Err(Error::UnknownTransport(_))));
        assert!(outbound_kind("memory").is_ok());
    }

    #[tokio::test]
    async fn test_factory_builds_default_transports() {
        let factory = TransportFactory::new();
        let config = AgentConfig::default();
        assert!(factory.inbound(&config).is_ok());
        assert!(factory.outbound(&config).is_ok());
    }

    #[test]
    fn test_memory_inbound_needs_endpoint() {
        let factory = TransportFactory::new();
        let config = AgentConfig::default().with_inbound_transport("memory");
        assert!(matches!(factory.inbound(&config), Err(Error::InvalidConfig(_))));

        let config = config.with_endpoint("mem://a");
        assert!(factory.inbound(&config).is_ok());
    }

    #[test]
    fn test_unknown_transport_rejected() {
        let factory = TransportFactory::new();
        let config = AgentConfig::default().with_outbound_transport("smtp");
        assert!(matches!(factory.outbound(&config), Err(Error::UnknownTransport(_))));
    }

    #[tokio::test]
    async fn test_http_transports() {
        let factory = TransportFactory::new();
        let config = AgentConfig::default()
            .with_inbound_transport("http")
            .with_outbound_transport("http");
        assert!(matches!(factory.inbound(&config), Err(Error::InvalidConfig(_))));
        assert!(factory.outbound(&config).is_ok());

        let config = config.with_endpoint("http://127.0.0.1:0/indy");
        assert!(factory.inbound(&config).is_ok());
        assert!(inbound_kind("http").is_ok());
        assert!(outbound_kind("http").is_ok());
    }
}
