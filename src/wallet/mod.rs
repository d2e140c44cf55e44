//! Wallet
//!
//! Identity and envelope collaborator consumed by the conductor:
//! - Pack/unpack of messages for a set of recipient keys
//! - Verkey to DID resolution
//! - Per-peer metadata (endpoints)

pub mod crypto;
pub mod envelope;
pub mod local;

pub use crypto::KeyPair;
pub use envelope::PackedEnvelope;
pub use local::LocalWallet;

use crate::core::{PeerMetadata, Result};
use crate::messages::Message;
use async_trait::async_trait;

/// Key storage and envelope operations.
#[async_trait]
pub trait Wallet: Send + Sync {
    /// Open packed bytes into a message with its delivery context attached.
    ///
    /// Input that is not structurally an envelope is parsed as a plaintext
    /// message with no context.
    async fn unpack(&self, bytes: &[u8]) -> Result<Message>;

    /// Pack plaintext for the recipients, authenticated by `sender_key` when
    /// given and anonymous otherwise.
    async fn pack(
        &self,
        plaintext: &[u8],
        recipient_keys: &[String],
        sender_key: Option<&str>,
    ) -> Result<Vec<u8>>;

    /// Metadata stored for a DID; empty when none.
    async fn metadata_for_did(&self, did: &str) -> Result<PeerMetadata>;

    /// Metadata stored for a verkey; empty when none.
    async fn metadata_for_key(&self, key: &str) -> Result<PeerMetadata>;
}
