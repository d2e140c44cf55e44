//! Cryptographic utilities for the local wallet.
//!
//! Provides Ed25519 key pairs, signing/verification over base64-encoded
//! verification keys, and SHA3-256 based DID derivation.

use crate::core::{Error, Hash256, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use sha3::{Digest, Sha3_256};

/// DID method used for locally generated identifiers.
pub const DID_METHOD: &str = "did:courier:";

/// An Ed25519 key pair held by the wallet.
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Create a new key pair from OS randomness.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut csprng = rand::rngs::OsRng;
        let mut secret_key_bytes = [0u8; 32];
        csprng.fill_bytes(&mut secret_key_bytes);
        Self::from_seed(&secret_key_bytes)
    }

    /// Create a deterministic key pair from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Get the verifying (public) key.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Base64 form of the verifying key, used as the peer key on the wire.
    pub fn verkey(&self) -> String {
        STANDARD.encode(self.verifying_key().to_bytes())
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.signing_key.sign(message).to_bytes().to_vec()
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("verkey", &self.verkey())
            .finish_non_exhaustive()
    }
}

/// Decode a base64 verification key.
pub fn decode_verkey(verkey: &str) -> Result<VerifyingKey> {
    let bytes = STANDARD
        .decode(verkey)
        .map_err(|e| Error::InvalidKeyFormat(e.to_string()))?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| Error::InvalidKeyFormat("Invalid verification key length".into()))?;
    VerifyingKey::from_bytes(&bytes).map_err(|e| Error::InvalidKeyFormat(e.to_string()))
}

/// Verify a signature made by the holder of `verkey`.
pub fn verify(verkey: &str, message: &[u8], signature: &[u8]) -> Result<()> {
    let public_key = decode_verkey(verkey)?;
    let sig_bytes: [u8; 64] = signature
        .try_into()
        .map_err(|_| Error::InvalidKeyFormat("Invalid signature length".into()))?;
    let sig = Signature::from_bytes(&sig_bytes);
    public_key.verify(message, &sig)?;
    Ok(())
}

/// Compute SHA3-256 hash of data.
pub fn sha3_256(data: &[u8]) -> Hash256 {
    let mut hasher = Sha3_256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&result);
    Hash256::new(bytes)
}

/// Derive a DID from a verification key.
pub fn did_for_verkey(verkey: &str) -> String {
    let hash = sha3_256(verkey.as_bytes());
    format!("{}{}", DID_METHOD, &hash.to_hex()[..22])
}
