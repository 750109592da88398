//! Producer-facing bridge between request/response ingress and the Router.

use crate::cache::{LastValueCache, MessageSource};
use crate::connection::{ClientId, EntityRef};
use crate::error::{Error, Result};
use crate::message::Update;
use crate::router::RouterHandle;
use log::*;
use serde::{Deserialize, Serialize};

/// A producer-submitted message.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub message: Option<String>,
    pub client_id: Option<ClientId>,
    /// Message kind used for targeted delivery.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
}

impl Submission {
    /// `(kind, entity)` when all three targeting fields are present and non-empty.
    fn target(&self) -> Option<(&str, EntityRef)> {
        fn present(field: &Option<String>) -> Option<&str> {
            field.as_deref().filter(|value| !value.is_empty())
        }
        Some((
            present(&self.kind)?,
            EntityRef::new(present(&self.entity_type)?, present(&self.entity_id)?),
        ))
    }
}

/// Query for the latest message stored for an entity.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestQuery {
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub source: Option<MessageSource>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Receipt {
    pub success: bool,
    pub message: String,
}

impl Receipt {
    fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestMessage {
    pub message: String,
    /// The requested source tag, or `any` when none was requested.
    pub source: String,
}

pub struct IngressBridge<'a> {
    cache: &'a LastValueCache,
    router: Option<&'a RouterHandle>,
}

impl<'a> IngressBridge<'a> {
    pub fn new(cache: &'a LastValueCache, router: Option<&'a RouterHandle>) -> Self {
        Self { cache, router }
    }

    /// Accept a producer message: targeted delivery when kind, entity type and
    /// entity id are all given, otherwise a broadcast optionally scoped to
    /// `clientId`. Nothing is touched when the message is missing or the Router
    /// is unavailable.
    pub fn submit(&self, submission: Submission) -> Result<Receipt> {
        let Some(message) = submission.message.as_deref().filter(|m| !m.is_empty()) else {
            return Err(Error::missing_field("message"));
        };
        let router = self
            .router
            .filter(|router| !router.is_closed())
            .ok_or_else(Error::unavailable)?;

        match submission.target() {
            Some((kind, entity)) => {
                self.cache
                    .put(&entity.entity_type, &entity.entity_id, message, MessageSource::Live);
                let receipt = Receipt::new(format!(
                    "Message sent to {} {}",
                    entity.entity_type, entity.entity_id
                ));
                router.send_to_entity(entity, message.to_string(), kind.to_string())?;
                Ok(receipt)
            }
            None => {
                let client_id = submission.client_id.clone().filter(|id| !id.is_empty());
                debug!("Accepted broadcast for {}", client_id.as_deref().unwrap_or("all clients"));
                router.broadcast(Update::broadcast(message).encode()?, client_id)?;
                Ok(Receipt::new("Message broadcast"))
            }
        }
    }

    pub fn latest(&self, query: LatestQuery) -> Result<LatestMessage> {
        let entity_type = query
            .entity_type
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::missing_field("entityType"))?;
        let entity_id = query
            .entity_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::missing_field("entityId"))?;

        let message = self
            .cache
            .get(&entity_type, &entity_id, query.source)
            .ok_or_else(Error::not_found)?;

        Ok(LatestMessage {
            message,
            source: query
                .source
                .map_or("any", |source| source.as_str())
                .to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionId;
    use crate::error::ErrorKind;
    use crate::message::{Registration, ServerFrame};
    use crate::router::Router;
    use events::HandlerRegistry;
    use serde_json::Value;
    use std::time::Duration;
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    fn targeted(message: Option<&str>) -> Submission {
        Submission {
            message: message.map(str::to_string),
            kind: Some("STATUS".into()),
            entity_type: Some("hop".into()),
            entity_id: Some("h1".into()),
            ..Default::default()
        }
    }

    async fn next_update(rx: &mut UnboundedReceiver<ServerFrame>) -> Value {
        let frame = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        serde_json::from_str(&frame.data).unwrap()
    }

    #[test]
    fn missing_message_is_rejected_without_side_effects() {
        let cache = LastValueCache::new();
        let bridge = IngressBridge::new(&cache, None);

        let err = bridge.submit(targeted(None)).unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::MissingField("message"));

        let err = bridge.submit(targeted(Some(""))).unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::MissingField("message"));
        assert!(cache.is_empty());
    }

    #[test]
    fn unattached_router_is_unavailable() {
        let cache = LastValueCache::new();
        let bridge = IngressBridge::new(&cache, None);

        let err = bridge.submit(targeted(Some("go"))).unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::Unavailable);
        assert!(cache.is_empty());
    }

    #[test]
    fn partial_target_is_not_targeted() {
        let submission = Submission {
            message: Some("go".into()),
            kind: Some("STATUS".into()),
            entity_type: Some("hop".into()),
            entity_id: Some(String::new()),
            ..Default::default()
        };
        assert!(submission.target().is_none());
    }

    #[test]
    fn latest_requires_entity_type_and_id() {
        let cache = LastValueCache::new();
        let bridge = IngressBridge::new(&cache, None);

        let err = bridge.latest(LatestQuery::default()).unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::MissingField("entityType"));

        let err = bridge
            .latest(LatestQuery {
                entity_type: Some("hop".into()),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::MissingField("entityId"));
    }

    #[test]
    fn latest_reports_source_or_any() {
        let cache = LastValueCache::new();
        cache.put("hop", "h1", "go", MessageSource::Live);
        let bridge = IngressBridge::new(&cache, None);
        let query = |source| LatestQuery {
            entity_type: Some("hop".into()),
            entity_id: Some("h1".into()),
            source,
        };

        let latest = bridge.latest(query(None)).unwrap();
        assert_eq!(latest.message, "go");
        assert_eq!(latest.source, "any");

        let latest = bridge.latest(query(Some(MessageSource::Live))).unwrap();
        assert_eq!(latest.source, "live");

        let err = bridge.latest(query(Some(MessageSource::Sse))).unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn targeted_submit_caches_and_delivers() {
        let (router, task) = Router::new(HandlerRegistry::new()).spawn();
        let cache = LastValueCache::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let a = ConnectionId::from("a");
        router.connect(a.clone(), tx).unwrap();
        router
            .register(a.clone(), Registration::new("c1").with_entity("hop", "h1"))
            .unwrap();
        next_update(&mut rx).await;
        next_update(&mut rx).await;

        let bridge = IngressBridge::new(&cache, Some(&router));
        let receipt = bridge.submit(targeted(Some("go"))).unwrap();

        assert!(receipt.success);
        assert_eq!(receipt.message, "Message sent to hop h1");
        let update = next_update(&mut rx).await;
        assert_eq!(update["type"], "STATUS");
        assert_eq!(update["data"]["message"], "go");
        assert_eq!(cache.get("hop", "h1", None).as_deref(), Some("go"));

        // Once the only subscriber is gone the send is a logged miss, still accepted.
        router.disconnect(a).unwrap();
        assert_eq!(router.stats().await.unwrap().connections, 0);
        let receipt = bridge.submit(targeted(Some("go again"))).unwrap();
        assert!(receipt.success);
        assert_eq!(cache.get("hop", "h1", None).as_deref(), Some("go again"));

        task.abort();
    }

    #[tokio::test]
    async fn untargeted_submit_broadcasts_to_client() {
        let (router, task) = Router::new(HandlerRegistry::new()).spawn();
        let cache = LastValueCache::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let a = ConnectionId::from("a");
        router.connect(a.clone(), tx).unwrap();
        router.register(a, Registration::new("c1")).unwrap();
        next_update(&mut rx).await;
        next_update(&mut rx).await;

        let bridge = IngressBridge::new(&cache, Some(&router));
        let receipt = bridge
            .submit(Submission {
                message: Some("hello".into()),
                client_id: Some("c1".into()),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(receipt.message, "Message broadcast");
        let update = next_update(&mut rx).await;
        assert_eq!(update["type"], "BROADCAST");
        assert_eq!(update["data"]["message"], "hello");
        assert!(cache.is_empty());

        task.abort();
    }
}
