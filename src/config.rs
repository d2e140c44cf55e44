//! Agent configuration.
//!
//! Loaded from TOML with defaults for every field; the binary layers
//! command-line overrides on top.

use crate::core::{Error, Result};
use crate::transport::factory::{inbound_kind, outbound_kind, TransportKind};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Agent configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Wallet name
    pub wallet: String,
    /// Inbound transport name
    pub inbound_transport: String,
    /// Outbound transport name
    pub outbound_transport: String,
    /// Listen endpoint for transports that need one
    pub endpoint: Option<String>,
    /// Messages to process before stopping; -1 for unbounded
    pub num_messages: i64,
    /// Stop the run loop on the first handler failure
    pub halt_on_error: bool,
    /// Default log filter
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            wallet: "agent".to_string(),
            inbound_transport: "stdin".to_string(),
            outbound_transport: "stdout".to_string(),
            endpoint: None,
            num_messages: -1,
            halt_on_error: false,
            log_level: "info".to_string(),
        }
    }
}

impl AgentConfig {
    /// Parse configuration from TOML text.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&contents)
    }

    /// Bounded message count, or `None` for unbounded.
    pub fn message_limit(&self) -> Option<u64> {
        u64::try_from(self.num_messages).ok()
    }

    /// Check transport names and transport-specific options.
    pub fn validate(&self) -> Result<()> {
        let inbound = inbound_kind(&self.inbound_transport)?;
        outbound_kind(&self.outbound_transport)?;
        let needs_endpoint = matches!(inbound, TransportKind::Memory | TransportKind::Http);
        if needs_endpoint && self.endpoint.is_none() {
            return Err(Error::InvalidConfig(format!(
                "{} inbound transport requires an endpoint",
                inbound
            )));
        }
        Ok(())
    }

    pub fn with_wallet(mut self, wallet: &str) -> Self {
        self.wallet = wallet.to_string();
        self
    }

    pub fn with_inbound_transport(mut self, name: &str) -> Self {
        self.inbound_transport = name.to_string();
        self
    }

    pub fn with_outbound_transport(mut self, name: &str) -> Self {
        self.outbound_transport = name.to_string();
        self
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = Some(endpoint.to_string());
        self
    }

    pub fn with_num_messages(mut self, num_messages: i64) -> Self {
        self.num_messages = num_messages;
        self
    }

    pub fn with_halt_on_error(mut self, halt: bool) -> Self {
        self.halt_on_error = halt;
        self
    }

    pub fn with_log_level(mut self, level: &str) -> Self {
        self.log_level = level.to_string();
        self
    }

    /// Memory transports in both directions, listening on `endpoint`.
    pub fn memory(endpoint: &str) -> Self {
        Self::default()
            .with_inbound_transport("memory")
            .with_outbound_transport("memory")
            .with_endpoint(endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.wallet, "agent");
        assert_eq!(config.inbound_transport, "stdin");
        assert_eq!(config.outbound_transport, "stdout");
        assert_eq!(config.message_limit(), None);
        assert!(!config.halt_on_error);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AgentConfig::from_toml_str(
            r#"
            inbound_transport = "memory"
            endpoint = "mem://alice"
            num_messages = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.inbound_transport, "memory");
        assert_eq!(config.outbound_transport, "stdout");
        assert_eq!(config.endpoint.as_deref(), Some("mem://alice"));
        assert_eq!(config.message_limit(), Some(3));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_wrong_type_is_invalid_config() {
        let err = AgentConfig::from_toml_str("halt_on_error = \"yes\"").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_validate() {
        let config = AgentConfig::default().with_inbound_transport("smtp");
        assert!(matches!(config.validate(), Err(Error::UnknownTransport(_))));

        let config = AgentConfig::default().with_inbound_transport("memory");
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let config = AgentConfig::default().with_inbound_transport("http");
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
        assert!(config.with_endpoint("0.0.0.0:3000").validate().is_ok());

        assert!(AgentConfig::memory("mem://a").validate().is_ok());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "wallet = \"bob\"\nhalt_on_error = true").unwrap();

        let config = AgentConfig::from_file(file.path()).unwrap();
        assert_eq!(config.wallet, "bob");
        assert!(config.halt_on_error);
        assert!(AgentConfig::from_file("/nonexistent/courier.toml").is_err());
    }
}
