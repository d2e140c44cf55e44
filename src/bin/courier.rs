//! courier - run an agent from the command line.

use clap::Parser;
use courier::agent::{handler, Agent};
use courier::config::AgentConfig;
use courier::transport::TransportFactory;
use courier::wallet::LocalWallet;
use courier::{logging, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// Message type answered by the built-in test route.
const TESTING_TYPE: &str = "did:sov:BzCbsNYhMrjHiqZDTUASHg;spec/testing/1.0/test";

#[derive(Parser, Debug)]
#[command(name = "courier", version, about = "Secure asynchronous message-routing agent")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Inbound transport (stdin, memory, http)
    #[arg(short = 'i', long)]
    inbound_transport: Option<String>,

    /// Outbound transport (stdout, memory, http)
    #[arg(short = 'o', long)]
    outbound_transport: Option<String>,

    /// Wallet name
    #[arg(short, long)]
    wallet: Option<String>,

    /// Listen endpoint for transports that need one
    #[arg(long)]
    endpoint: Option<String>,

    /// Stop after this many messages (-1 for no limit)
    #[arg(long, allow_hyphen_values = true)]
    num_messages: Option<i64>,

    /// Stop on the first message that fails to process
    #[arg(long)]
    halt_on_error: bool,

    /// Log filter when RUST_LOG is unset
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn into_config(self) -> Result<AgentConfig> {
        let mut config = match &self.config {
            Some(path) => AgentConfig::from_file(path)?,
            None => AgentConfig::default(),
        };
        if let Some(name) = self.inbound_transport {
            config.inbound_transport = name;
        }
        if let Some(name) = self.outbound_transport {
            config.outbound_transport = name;
        }
        if let Some(wallet) = self.wallet {
            config.wallet = wallet;
        }
        if self.endpoint.is_some() {
            config.endpoint = self.endpoint;
        }
        if let Some(n) = self.num_messages {
            config.num_messages = n;
        }
        if self.halt_on_error {
            config.halt_on_error = true;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Cli::parse().into_config()?;
    logging::init(&config.log_level);

    let wallet = Arc::new(LocalWallet::new(&config.wallet));
    let (did, verkey) = wallet.create_and_store_my_did(None);
    info!(wallet = %wallet.name(), did = %did, verkey = %verkey, "Agent identity ready");

    let agent = Agent::from_config(config, wallet, &TransportFactory::new())?;
    agent.route(
        TESTING_TYPE,
        handler(|_agent, msg| async move {
            info!(msg_type = %msg.type_uri(), message = ?msg.as_map(), "Test message received");
            Ok(())
        }),
    );

    let result = tokio::select! {
        result = agent.start() => result,
        signal = tokio::signal::ctrl_c() => {
            if let Err(err) = signal {
                error!(error = %err, "failed to listen for shutdown signal");
            }
            info!("Interrupted");
            Ok(())
        }
    };

    agent.shutdown().await;
    if let Err(e) = &result {
        error!(error = %e, "Agent stopped with an error");
    }
    result
}
