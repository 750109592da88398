use crate::connection::{EntityId, EntityType};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use log::*;
use serde::{Deserialize, Serialize};

/// Where a cached message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageSource {
    /// Delivered through the relay's live connections.
    Live,
    /// Delivered through a server-sent-events channel.
    Sse,
}

impl MessageSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageSource::Live => "live",
            MessageSource::Sse => "sse",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CachedMessage {
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub source: MessageSource,
}

/// Most recent message per entity, for clients that missed the live push.
///
/// Entries are overwritten, never appended, and are kept until the process exits.
#[derive(Debug, Default)]
pub struct LastValueCache {
    entries: DashMap<(EntityType, EntityId), CachedMessage>,
}

impl LastValueCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, entity_type: &str, entity_id: &str, message: &str, source: MessageSource) {
        self.entries.insert(
            (entity_type.to_string(), entity_id.to_string()),
            CachedMessage {
                message: message.to_string(),
                timestamp: Utc::now(),
                source,
            },
        );
        debug!(
            "Stored {} message for {entity_type} {entity_id}: {message}",
            source.as_str()
        );
    }

    /// The stored message, if any. With `source` given, only a message stored
    /// from that source is returned.
    pub fn get(
        &self,
        entity_type: &str,
        entity_id: &str,
        source: Option<MessageSource>,
    ) -> Option<String> {
        self.entry(entity_type, entity_id)
            .filter(|entry| source.map_or(true, |source| entry.source == source))
            .map(|entry| entry.message)
    }

    pub fn entry(&self, entity_type: &str, entity_id: &str) -> Option<CachedMessage> {
        self.entries
            .get(&(entity_type.to_string(), entity_id.to_string()))
            .map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
