//! Error types for Courier.

use thiserror::Error;

/// Result type alias for Courier operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Courier operations.
#[derive(Error, Debug)]
pub enum Error {
    // Message errors
    #[error("Invalid message type: {0}")]
    InvalidMessageType(String),

    #[error("Invalid message type version: {0}")]
    InvalidMessageTypeVersion(String),

    // Routing errors
    #[error("No registered route for message type {0}")]
    NoRegisteredRoute(String),

    #[error("Message processing failed: {0}")]
    MessageProcessingFailed(String),

    #[error("Invalid module: {0}")]
    InvalidModule(String),

    // Hook errors
    #[error("No hooks found on receiver for {0}")]
    NoHooksFound(String),

    #[error("Hook signature mismatch for {0}")]
    HookSignatureMismatch(String),

    // Transport errors
    #[error("Unknown transport: {0}")]
    UnknownTransport(String),

    #[error("Connection impossible: {0}")]
    ConnectionImpossible(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Transport error: {0}")]
    Transport(String),

    // Wallet and cryptography errors
    #[error("Unpack failed: {0}")]
    Unpack(String),

    #[error("Pack failed: {0}")]
    Pack(String),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("DID not found: {0}")]
    DIDNotFound(String),

    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    #[error("Signature verification failed")]
    SignatureVerificationFailed,

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error is the store-and-forward signal rather than a failure.
    pub fn is_connection_impossible(&self) -> bool {
        matches!(self, Error::ConnectionImpossible(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            Error::DeserializationError(err.to_string())
        } else {
            Error::SerializationError(err.to_string())
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::InvalidConfig(err.to_string())
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error::DeserializationError(err.to_string())
    }
}

impl From<ed25519_dalek::SignatureError> for Error {
    fn from(_: ed25519_dalek::SignatureError) -> Self {
        Error::SignatureVerificationFailed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_impossible_predicate() {
        assert!(Error::ConnectionImpossible("no endpoint".into()).is_connection_impossible());
        assert!(!Error::ConnectionClosed.is_connection_impossible());
    }

    #[test]
    fn test_json_syntax_error_is_deserialization() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, Error::DeserializationError(_)));
    }

    #[test]
    fn test_error_display() {
        let err = Error::NoRegisteredRoute("did:x/ping/1.0/ping".into());
        assert!(err.to_string().contains("ping/1.0/ping"));
    }
}
