//! # Courier - secure asynchronous message routing
//!
//! An agent framework for DID-based peers exchanging typed messages:
//! - **Messages**: type URIs with semantic versions and a `~transport` decorator
//! - **Conductor**: connection lifecycle, return routes and store-and-forward queues
//! - **Agent**: literal routes and versioned protocol modules
//! - **Wallet / Transport**: pluggable collaborators behind async traits
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use courier::agent::{handler, Agent};
//! use courier::config::AgentConfig;
//! use courier::transport::TransportFactory;
//! use courier::wallet::LocalWallet;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> courier::Result<()> {
//!     let wallet = Arc::new(LocalWallet::new("agent"));
//!     wallet.create_and_store_my_did(None);
//!
//!     let config = AgentConfig::memory("mem://agent").with_num_messages(1);
//!     let agent = Agent::from_config(config, wallet, &TransportFactory::new())?;
//!     agent.route(
//!         "did:example:1;spec/testing/1.0/test",
//!         handler(|_agent, msg| async move {
//!             println!("received {}", msg.type_uri());
//!             Ok(())
//!         }),
//!     );
//!
//!     agent.start().await?;
//!     agent.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod conductor;
pub mod config;
pub mod core;
pub mod hooks;
pub mod logging;
pub mod messages;
pub mod transport;
pub mod wallet;

pub use crate::core::error::{Error, Result};
