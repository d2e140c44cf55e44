//! Message type URI parsing.
//!
//! A type URI has the shape `<doc_uri><protocol>/<version>/<short_type>`,
//! e.g. `did:sov:BzCbsNYhMrjHiqZDTUASHg;spec/connection/1.0/invite`.

use crate::core::{Error, Result};
use crate::messages::semver::SemVer;
use std::str::FromStr;

/// The parsed parts of a message `@type`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageType {
    /// Document scope prefix, including its trailing `/` when present
    pub doc_uri: String,
    /// Protocol family name
    pub protocol: String,
    /// Version segment as written
    pub version: String,
    /// Parsed version
    pub version_info: SemVer,
    /// Message name within the protocol
    pub short_type: String,
}

impl MessageType {
    /// Parse a type URI.
    pub fn parse(uri: &str) -> Result<Self> {
        let invalid = || Error::InvalidMessageType(uri.to_string());

        let (rest, short_type) = uri.rsplit_once('/').ok_or_else(invalid)?;
        let (rest, version) = rest.rsplit_once('/').ok_or_else(invalid)?;
        let (doc_uri, protocol) = match rest.rsplit_once('/') {
            Some((doc, protocol)) => (format!("{}/", doc), protocol),
            None => (String::new(), rest),
        };

        if !is_name(protocol) || !is_name(short_type) {
            return Err(invalid());
        }
        if !version.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let version_info = SemVer::parse(version)?;

        Ok(Self {
            doc_uri,
            protocol: protocol.to_string(),
            version: version.to_string(),
            version_info,
            short_type: short_type.to_string(),
        })
    }

    /// Document URI and protocol name; the module lookup key.
    pub fn qualified_protocol(&self) -> String {
        format!("{}{}", self.doc_uri, self.protocol)
    }
}

/// Protocol and short-type names are restricted to `[a-z0-9._-]+`.
pub(crate) fn is_name(s: &str) -> bool {
    !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || matches!(b, b'.' | b'_' | b'-'))
}

impl FromStr for MessageType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}/{}/{}",
            self.doc_uri, self.protocol, self.version, self.short_type
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_example_uri() {
        let mt = MessageType::parse("did:example:1/protocol-x/1.2/short").unwrap();
        assert_eq!(mt.doc_uri, "did:example:1/");
        assert_eq!(mt.protocol, "protocol-x");
        assert_eq!(mt.version, "1.2");
        assert_eq!(mt.version_info, SemVer::new(1, 2, 0));
        assert_eq!(mt.short_type, "short");
        assert_eq!(mt.qualified_protocol(), "did:example:1/protocol-x");
    }

    #[test]
    fn test_parse_spec_style_uri() {
        let mt: MessageType = "did:sov:BzCbsNYhMrjHiqZDTUASHg;spec/connection/1.0/invite"
            .parse()
            .unwrap();
        assert_eq!(mt.doc_uri, "did:sov:BzCbsNYhMrjHiqZDTUASHg;spec/");
        assert_eq!(mt.protocol, "connection");
        assert_eq!(mt.short_type, "invite");
    }

    #[test]
    fn test_missing_version_is_invalid_type() {
        let err = MessageType::parse("did:example:1/protocol-x/short").unwrap_err();
        assert!(matches!(err, Error::InvalidMessageType(_)));
    }

    #[test]
    fn test_bad_version_is_invalid_version() {
        let err = MessageType::parse("did:example:1/protocol-x/1.02/short").unwrap_err();
        assert!(matches!(err, Error::InvalidMessageTypeVersion(_)));
    }

    #[test]
    fn test_rejects_uppercase_names() {
        assert!(MessageType::parse("did:example:1/Proto/1.0/short").is_err());
        assert!(MessageType::parse("did:example:1/proto/1.0/Short").is_err());
        assert!(MessageType::parse("testing_type").is_err());
    }

    #[test]
    fn test_display_roundtrip() {
        let uri = "https://example.org/ping/1.0/ping";
        assert_eq!(MessageType::parse(uri).unwrap().to_string(), uri);
    }
}
