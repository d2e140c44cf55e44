//! No-op message used to solicit a return-routable connection.

use crate::messages::message::{Message, ReturnRoute};

/// Type URI of the no-op message.
pub const NOOP_TYPE: &str = "did:none:0000000000000000/noop/1.0/noop";

/// Builder for no-op messages.
pub struct Noop;

impl Noop {
    /// A bare no-op.
    pub fn message() -> Message {
        Self::build(false)
    }

    /// A no-op asking the peer to keep the connection for replies.
    pub fn with_return_route() -> Message {
        Self::build(true)
    }

    fn build(return_route: bool) -> Message {
        let mut data = serde_json::Map::new();
        data.insert("@type".to_string(), serde_json::Value::from(NOOP_TYPE));
        let mut msg = match Message::new(data) {
            Ok(msg) => msg,
            Err(_) => unreachable!("NOOP_TYPE is a valid type URI"),
        };
        if return_route {
            msg.set_return_route(ReturnRoute::All);
        }
        msg
    }
}
