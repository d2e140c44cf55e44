//! Message Model
//!
//! Provides the typed envelope exchanged between agents:
//! - Type URI and semantic version parsing
//! - Mutable key/value message with delivery context
//! - `~transport` decorator handling

pub mod message;
pub mod message_type;
pub mod noop;
pub mod semver;

pub use message::{Message, MessageContext, ReturnRoute, TransportDecorator};
pub use message_type::MessageType;
pub use noop::{Noop, NOOP_TYPE};
pub use semver::SemVer;
