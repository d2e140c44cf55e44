//! In-memory wallet.
//!
//! Holds this agent's key pairs, the verkey-to-DID map for known peers, and
//! per-peer metadata. Nothing is persisted.

use crate::core::{Error, PeerMetadata, Result};
use crate::messages::{Message, MessageContext};
use crate::wallet::crypto::{self, did_for_verkey, KeyPair};
use crate::wallet::envelope::{EnvelopeHeader, PackedEnvelope, ENVELOPE_TYP};
use crate::wallet::Wallet;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
struct WalletState {
    /// Our own key pairs by verkey
    keys: HashMap<String, KeyPair>,
    /// Verkey to DID, ours and theirs
    key_to_did: HashMap<String, String>,
    did_metadata: HashMap<String, PeerMetadata>,
    key_metadata: HashMap<String, PeerMetadata>,
}

/// Wallet keeping keys and peer records in memory.
pub struct LocalWallet {
    name: String,
    state: RwLock<WalletState>,
}

impl LocalWallet {
    /// Create an empty wallet.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: RwLock::new(WalletState::default()),
        }
    }

    /// Wallet name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Create a key pair (deterministic when seeded) and record its DID.
    ///
    /// Returns `(did, verkey)`.
    pub fn create_and_store_my_did(&self, seed: Option<[u8; 32]>) -> (String, String) {
        let pair = match seed {
            Some(seed) => KeyPair::from_seed(&seed),
            None => KeyPair::generate(),
        };
        let verkey = pair.verkey();
        let did = did_for_verkey(&verkey);

        let mut state = self.state.write().unwrap();
        state.key_to_did.insert(verkey.clone(), did.clone());
        state.keys.insert(verkey.clone(), pair);
        (did, verkey)
    }

    /// Record a peer's DID and verkey.
    pub fn store_their_did(&self, did: &str, verkey: &str) -> Result<()> {
        crypto::decode_verkey(verkey)?;
        self.state
            .write()
            .unwrap()
            .key_to_did
            .insert(verkey.to_string(), did.to_string());
        Ok(())
    }

    /// Replace the metadata stored for a DID.
    pub fn set_did_metadata(&self, did: &str, metadata: PeerMetadata) {
        self.state
            .write()
            .unwrap()
            .did_metadata
            .insert(did.to_string(), metadata);
    }

    /// Replace the metadata stored for a verkey.
    pub fn set_key_metadata(&self, verkey: &str, metadata: PeerMetadata) {
        self.state
            .write()
            .unwrap()
            .key_metadata
            .insert(verkey.to_string(), metadata);
    }

    /// Look up the DID recorded for a verkey.
    pub fn did_for_key(&self, verkey: &str) -> Option<String> {
        self.state.read().unwrap().key_to_did.get(verkey).cloned()
    }

    /// Whether this wallet holds the private half of `verkey`.
    pub fn holds_key(&self, verkey: &str) -> bool {
        self.state.read().unwrap().keys.contains_key(verkey)
    }

    fn key_pair(&self, verkey: &str) -> Result<KeyPair> {
        self.state
            .read()
            .unwrap()
            .keys
            .get(verkey)
            .cloned()
            .ok_or_else(|| Error::KeyNotFound(verkey.to_string()))
    }

    fn open_envelope(&self, envelope: &PackedEnvelope) -> Result<Message> {
        let header = envelope.header()?;
        let to_key = header
            .recipients
            .iter()
            .find(|key| self.holds_key(key))
            .cloned()
            .ok_or_else(|| Error::Unpack("no recipient key held by this wallet".to_string()))?;

        if let Some(sender) = &header.sender {
            let signature = envelope
                .signature_bytes()?
                .ok_or(Error::SignatureVerificationFailed)?;
            crypto::verify(sender, envelope.signing_input().as_bytes(), &signature)?;
        }

        let mut msg = Message::deserialize(&envelope.plaintext()?)?;
        msg.set_context(Some(MessageContext {
            from_did: header.sender.as_deref().and_then(|k| self.did_for_key(k)),
            from_key: header.sender,
            to_did: self.did_for_key(&to_key),
            to_key: Some(to_key),
        }));
        Ok(msg)
    }
}

#[async_trait]
impl Wallet for LocalWallet {
    async fn unpack(&self, bytes: &[u8]) -> Result<Message> {
        match PackedEnvelope::parse(bytes) {
            Some(envelope) => self.open_envelope(&envelope),
            None => {
                // Not an envelope: plaintext with no sender context
                let mut msg = Message::deserialize(bytes)?;
                msg.set_context(None);
                Ok(msg)
            }
        }
    }

    async fn pack(
        &self,
        plaintext: &[u8],
        recipient_keys: &[String],
        sender_key: Option<&str>,
    ) -> Result<Vec<u8>> {
        if recipient_keys.is_empty() {
            return Err(Error::Pack("at least one recipient key is required".to_string()));
        }
        for key in recipient_keys {
            crypto::decode_verkey(key)?;
        }

        let header = EnvelopeHeader {
            typ: ENVELOPE_TYP.to_string(),
            recipients: recipient_keys.to_vec(),
            sender: sender_key.map(str::to_string),
        };

        let envelope = match sender_key {
            Some(sender) => {
                let pair = self.key_pair(sender)?;
                let sign: &dyn Fn(&[u8]) -> Vec<u8> = &|input| pair.sign(input);
                PackedEnvelope::seal(&header, plaintext, Some(sign))?
            }
            None => PackedEnvelope::seal(&header, plaintext, None)?,
        };
        envelope.to_bytes()
    }

    async fn metadata_for_did(&self, did: &str) -> Result<PeerMetadata> {
        Ok(self
            .state
            .read()
            .unwrap()
            .did_metadata
            .get(did)
            .cloned()
            .unwrap_or_default())
    }

    async fn metadata_for_key(&self, key: &str) -> Result<PeerMetadata> {
        let state = self.state.read().unwrap();
        if let Some(meta) = state.key_metadata.get(key) {
            return Ok(meta.clone());
        }
        Ok(state
            .key_to_did
            .get(key)
            .and_then(|did| state.did_metadata.get(did))
            .cloned()
            .unwrap_or_default())
    }
}
