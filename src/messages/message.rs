//! Message envelope.
//!
//! A [`Message`] wraps the wire JSON object and keeps the parsed `@type`
//! alongside it. The delivery [`MessageContext`] is attached after unpacking
//! and is never serialized.

use crate::core::{Error, Result};
use crate::messages::message_type::MessageType;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key holding the message type URI.
pub const TYPE_KEY: &str = "@type";

/// Key holding the transport decorator block.
pub const TRANSPORT_KEY: &str = "~transport";

/// Who sent a message and to whom, as resolved by the wallet.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContext {
    pub from_key: Option<String>,
    pub from_did: Option<String>,
    pub to_key: Option<String>,
    pub to_did: Option<String>,
}

/// Return-route setting requested by a sender.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnRoute {
    /// Do not keep the connection for replies
    None,
    /// Keep the connection for all replies
    All,
    /// Keep the connection for replies in the same thread
    Thread,
}

/// The `~transport` decorator.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportDecorator {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_route: Option<ReturnRoute>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_message_count: Option<u64>,
}

/// A typed, mutable key/value message.
#[derive(Clone, Debug)]
pub struct Message {
    data: Map<String, Value>,
    msg_type: MessageType,
    context: Option<MessageContext>,
}

impl Message {
    /// Build a message from a JSON object.
    pub fn new(data: Map<String, Value>) -> Result<Self> {
        let type_uri = data
            .get(TYPE_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidMessageType(format!("missing {}", TYPE_KEY)))?;
        let msg_type = MessageType::parse(type_uri)?;
        Ok(Self {
            data,
            msg_type,
            context: None,
        })
    }

    /// Build a message from a JSON value, which must be an object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(data) => Self::new(data),
            other => Err(Error::DeserializationError(format!(
                "message must be a JSON object, got {}",
                other
            ))),
        }
    }

    /// Build an empty message of the given type.
    pub fn with_type(type_uri: &str) -> Result<Self> {
        let mut data = Map::new();
        data.insert(TYPE_KEY.to_string(), Value::String(type_uri.to_string()));
        Self::new(data)
    }

    /// Parse wire bytes.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_value(value)
    }

    /// Serialize the payload map; derived fields are not included.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.data)?)
    }

    /// The full `@type` string.
    pub fn type_uri(&self) -> &str {
        self.data
            .get(TYPE_KEY)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// The parsed type.
    pub fn message_type(&self) -> &MessageType {
        &self.msg_type
    }

    /// Module lookup key for this message.
    pub fn qualified_protocol(&self) -> String {
        self.msg_type.qualified_protocol()
    }

    /// Delivery context, `None` for anonymous or plaintext input.
    pub fn context(&self) -> Option<&MessageContext> {
        self.context.as_ref()
    }

    /// Attach or clear the delivery context.
    pub fn set_context(&mut self, context: Option<MessageContext>) {
        self.context = context;
    }

    /// Builder variant of [`Message::set_context`].
    pub fn with_context(mut self, context: MessageContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Get a payload value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Set a payload value. The type is fixed at construction.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Result<Option<Value>> {
        let key = key.into();
        if key == TYPE_KEY {
            return Err(Error::InvalidMessageType(format!(
                "{} cannot change after construction",
                TYPE_KEY
            )));
        }
        Ok(self.data.insert(key, value))
    }

    /// Remove a payload value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        if key == TYPE_KEY {
            return None;
        }
        self.data.remove(key)
    }

    /// The raw payload map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Parsed `~transport` block. Each field is read on its own; one that
    /// does not parse reads as absent without affecting the others.
    pub fn transport(&self) -> Option<TransportDecorator> {
        let block = self.data.get(TRANSPORT_KEY)?.as_object()?;
        Some(TransportDecorator {
            return_route: decorator_field(block, "return_route"),
            pending_message_count: decorator_field(block, "pending_message_count"),
        })
    }

    /// Requested return route, if any.
    pub fn return_route(&self) -> Option<ReturnRoute> {
        self.transport().and_then(|t| t.return_route)
    }

    /// Set `~transport.return_route`, keeping other decorator fields.
    pub fn set_return_route(&mut self, route: ReturnRoute) {
        self.transport_block()
            .insert("return_route".to_string(), serde_json::json!(route));
    }

    /// Set `~transport.pending_message_count`, keeping other decorator fields.
    pub fn set_pending_message_count(&mut self, count: u64) {
        self.transport_block()
            .insert("pending_message_count".to_string(), Value::from(count));
    }

    fn transport_block(&mut self) -> &mut Map<String, Value> {
        let entry = self
            .data
            .entry(TRANSPORT_KEY.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        match entry {
            Value::Object(map) => map,
            _ => unreachable!("transport block was just made an object"),
        }
    }
}

fn decorator_field<T: DeserializeOwned>(block: &Map<String, Value>, name: &str) -> Option<T> {
    block
        .get(name)
        .and_then(|value| serde_json::from_value(value.clone()).ok())
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl TryFrom<Value> for Message {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_value(value)
    }
}
