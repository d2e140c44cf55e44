//! Packed envelope wire format.
//!
//! An envelope is a JSON object `{protected, payload, signature?}`. The
//! protected header names the recipients and, for authenticated messages,
//! the sender whose key produced `signature` over `protected.payload`.

use crate::core::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Envelope type tag.
pub const ENVELOPE_TYP: &str = "courier-signed/1.0";

/// Protected header of an envelope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeHeader {
    pub typ: String,
    pub recipients: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
}

/// A packed message as it travels over a transport. Any field beyond the
/// three below marks the input as a plain message.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackedEnvelope {
    pub protected: String,
    pub payload: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl PackedEnvelope {
    /// Assemble an envelope; `sign` is called with the signing input when a
    /// sender is named.
    pub fn seal(
        header: &EnvelopeHeader,
        plaintext: &[u8],
        sign: Option<&dyn Fn(&[u8]) -> Vec<u8>>,
    ) -> Result<Self> {
        let protected = STANDARD.encode(serde_json::to_vec(header)?);
        let payload = STANDARD.encode(plaintext);
        let signature = sign.map(|sign| {
            let input = signing_input(&protected, &payload);
            STANDARD.encode(sign(input.as_bytes()))
        });
        Ok(Self {
            protected,
            payload,
            signature,
        })
    }

    /// Try to read bytes as an envelope. `None` means the input is not
    /// structurally an envelope.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        serde_json::from_slice(bytes).ok()
    }

    /// Decode the protected header.
    pub fn header(&self) -> Result<EnvelopeHeader> {
        let raw = STANDARD.decode(&self.protected)?;
        let header: EnvelopeHeader = serde_json::from_slice(&raw)?;
        if header.typ != ENVELOPE_TYP {
            return Err(Error::Unpack(format!("unsupported envelope type {}", header.typ)));
        }
        Ok(header)
    }

    /// Decode the plaintext payload.
    pub fn plaintext(&self) -> Result<Vec<u8>> {
        Ok(STANDARD.decode(&self.payload)?)
    }

    /// Decode the signature, if any.
    pub fn signature_bytes(&self) -> Result<Option<Vec<u8>>> {
        self.signature
            .as_ref()
            .map(|sig| STANDARD.decode(sig).map_err(Error::from))
            .transpose()
    }

    /// Bytes covered by the signature.
    pub fn signing_input(&self) -> String {
        signing_input(&self.protected, &self.payload)
    }

    /// Serialize for the wire.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

fn signing_input(protected: &str, payload: &str) -> String {
    format!("{}.{}", protected, payload)
}
