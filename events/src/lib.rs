//! Application message infrastructure for the relay.
//!
//! This crate models the `{type, data}` messages that connected clients send
//! over the relay channel and provides the extension point that gives each
//! message type its meaning.
//!
//! # Architecture
//!
//! - **MessageKind**: Closed set of message types the relay accepts
//! - **Envelope**: A validated inbound `{type, data}` message
//! - **MessageHandler**: Trait for implementing per-type business logic
//! - **HandlerRegistry**: Routes an envelope to the handler installed for its kind
//!
//! This crate has no dependencies on internal crates, so the relay core and any
//! application crate providing handlers can both depend on it.

use async_trait::async_trait;
use log::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Message types accepted on the relay channel.
/// Anything not listed here is rejected when the envelope is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    #[serde(rename = "TYPE_A")]
    TypeA,
    #[serde(rename = "TYPE_B")]
    TypeB,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::TypeA => "TYPE_A",
            MessageKind::TypeB => "TYPE_B",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An inbound application message sent by a connected client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Free-form payload handed to the handler. `data.clientId`, when present,
    /// scopes the resulting broadcast to that logical client.
    pub data: Map<String, Value>,
}

impl Envelope {
    /// Parse the JSON text of a `{type, data}` message.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// The logical client this message is scoped to, if any.
    pub fn client_id(&self) -> Option<&str> {
        self.data
            .get("clientId")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
    }
}

/// Trait for handling inbound application messages.
/// The returned value becomes the `data` of the message broadcast back to
/// clients; `None` broadcasts the type alone.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, kind: MessageKind, data: &Map<String, Value>) -> Option<Value>;
}

/// Handler used for every kind without a dedicated handler. Only logs.
pub struct LoggingHandler;

#[async_trait]
impl MessageHandler for LoggingHandler {
    async fn handle(&self, kind: MessageKind, data: &Map<String, Value>) -> Option<Value> {
        info!("Handling type: {kind} with request body: {}", Value::Object(data.clone()));
        None
    }
}

/// Routes envelopes to the handler registered for their kind.
#[derive(Clone)]
pub struct HandlerRegistry {
    handlers: Arc<HashMap<MessageKind, Arc<dyn MessageHandler>>>,
    fallback: Arc<dyn MessageHandler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(HashMap::new()),
            fallback: Arc::new(LoggingHandler),
        }
    }

    /// Install a handler for one message kind, replacing any previous one.
    /// Note: This creates a new registry instance with the additional handler.
    pub fn with_handler(mut self, kind: MessageKind, handler: Arc<dyn MessageHandler>) -> Self {
        let mut handlers = (*self.handlers).clone();
        handlers.insert(kind, handler);
        self.handlers = Arc::new(handlers);
        self
    }

    /// Replace the handler used for kinds that have none installed.
    pub fn with_fallback(mut self, handler: Arc<dyn MessageHandler>) -> Self {
        self.fallback = handler;
        self
    }

    pub async fn dispatch(&self, envelope: &Envelope) -> Option<Value> {
        let handler = self
            .handlers
            .get(&envelope.kind)
            .unwrap_or(&self.fallback);
        debug!("Dispatching {} message", envelope.kind);
        handler.handle(envelope.kind, &envelope.data).await
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl MessageHandler for Echo {
        async fn handle(&self, kind: MessageKind, data: &Map<String, Value>) -> Option<Value> {
            Some(json!({ "echo": kind.as_str(), "fields": data.len() }))
        }
    }

    #[test]
    fn parses_known_kind_with_client_scope() {
        let envelope =
            Envelope::parse(r#"{"type":"TYPE_A","data":{"clientId":"c1","n":1}}"#).unwrap();
        assert_eq!(envelope.kind, MessageKind::TypeA);
        assert_eq!(envelope.client_id(), Some("c1"));
    }

    #[test]
    fn empty_client_id_is_unscoped() {
        let envelope = Envelope::parse(r#"{"type":"TYPE_B","data":{"clientId":""}}"#).unwrap();
        assert_eq!(envelope.client_id(), None);
    }

    #[test]
    fn rejects_unknown_kind() {
        assert!(Envelope::parse(r#"{"type":"test","data":{}}"#).is_err());
    }

    #[test]
    fn rejects_missing_data_and_extra_fields() {
        assert!(Envelope::parse(r#"{"type":"TYPE_A"}"#).is_err());
        assert!(Envelope::parse(r#"{"type":"TYPE_A","data":{},"extra":1}"#).is_err());
        assert!(Envelope::parse("not json").is_err());
    }

    #[tokio::test]
    async fn dispatch_uses_installed_handler() {
        let registry = HandlerRegistry::new().with_handler(MessageKind::TypeA, Arc::new(Echo));
        let envelope = Envelope::parse(r#"{"type":"TYPE_A","data":{"x":1}}"#).unwrap();

        let result = registry.dispatch(&envelope).await;
        assert_eq!(result, Some(json!({ "echo": "TYPE_A", "fields": 1 })));
    }

    #[tokio::test]
    async fn dispatch_falls_back_to_logging_handler() {
        let registry = HandlerRegistry::new().with_handler(MessageKind::TypeA, Arc::new(Echo));
        let envelope = Envelope::parse(r#"{"type":"TYPE_B","data":{}}"#).unwrap();

        assert_eq!(registry.dispatch(&envelope).await, None);
    }

    #[tokio::test]
    async fn custom_fallback_handles_kinds_without_a_handler() {
        let registry = HandlerRegistry::new()
            .with_handler(MessageKind::TypeA, Arc::new(LoggingHandler))
            .with_fallback(Arc::new(Echo));

        let unhandled = Envelope::parse(r#"{"type":"TYPE_B","data":{"a":1,"b":2}}"#).unwrap();
        assert_eq!(
            registry.dispatch(&unhandled).await,
            Some(json!({ "echo": "TYPE_B", "fields": 2 }))
        );

        let handled = Envelope::parse(r#"{"type":"TYPE_A","data":{}}"#).unwrap();
        assert_eq!(registry.dispatch(&handled).await, None);
    }
}
