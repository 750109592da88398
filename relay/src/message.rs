use crate::connection::{ClientId, EntityBindings};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const HOP_ENTITY_TYPE: &str = "hop";

/// Events the relay emits to connected clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ServerEvent {
    #[serde(rename = "update")]
    Update,
}

/// One outbound frame, encoded on the wire as `{"event": ..., "data": ...}`.
/// `data` holds the JSON text of an [`Update`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerFrame {
    pub event: ServerEvent,
    pub data: String,
}

impl ServerFrame {
    pub fn update(data: String) -> Self {
        Self {
            event: ServerEvent::Update,
            data,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// The `{type, data}` payload carried by every `update` frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Update {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Update {
    pub fn welcome() -> Self {
        Self {
            kind: "WELCOME".to_string(),
            data: Some(json!({ "message": "Connected to relay" })),
        }
    }

    pub fn register_confirmation(client_id: &str) -> Self {
        Self {
            kind: "REGISTER_CONFIRMATION".to_string(),
            data: Some(json!({
                "clientId": client_id,
                "message": "Registration successful",
            })),
        }
    }

    /// A producer message fanned out without an entity target.
    pub fn broadcast(message: &str) -> Self {
        Self {
            kind: "BROADCAST".to_string(),
            data: Some(json!({ "message": message })),
        }
    }

    /// A producer message addressed to one entity. Messages for a `hop` also
    /// carry the id as `hopId`, which hop clients read directly.
    pub fn targeted(message_kind: &str, entity_type: &str, entity_id: &str, message: &str) -> Self {
        let mut data = json!({
            "entityType": entity_type,
            "entityId": entity_id,
            "message": message,
        });
        if entity_type == HOP_ENTITY_TYPE {
            data["hopId"] = json!(entity_id);
        }

        Self {
            kind: message_kind.to_string(),
            data: Some(data),
        }
    }

    /// The result of a message handler, re-broadcast under the inbound type.
    pub fn handled(kind: &str, result: Option<Value>) -> Self {
        Self {
            kind: kind.to_string(),
            data: result,
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Frames a client may send over the relay channel.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientFrame {
    #[serde(rename = "REGISTER")]
    Register(RegisterPayload),
    /// JSON text of an `events::Envelope`; parsed by the Router.
    #[serde(rename = "message")]
    Message(String),
}

impl ClientFrame {
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// Clients send registrations either as an object or as its JSON encoding.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RegisterPayload {
    Structured(Registration),
    Encoded(String),
}

impl RegisterPayload {
    pub fn into_registration(self) -> Result<Registration, serde_json::Error> {
        match self {
            RegisterPayload::Structured(registration) => Ok(registration),
            RegisterPayload::Encoded(raw) => serde_json::from_str(&raw),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    #[serde(default)]
    pub client_id: Option<ClientId>,
    #[serde(default)]
    pub entities: Option<EntityBindings>,
}

impl Registration {
    pub fn new(client_id: impl Into<ClientId>) -> Self {
        Self {
            client_id: Some(client_id.into()),
            entities: None,
        }
    }

    pub fn with_entity(mut self, entity_type: &str, entity_id: &str) -> Self {
        self.entities
            .get_or_insert_with(EntityBindings::new)
            .insert(entity_type.to_string(), Some(entity_id.to_string()));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_frame_wire_shape() {
        let frame = ServerFrame::update(Update::welcome().encode().unwrap());
        let value: Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();

        assert_eq!(value["event"], "update");
        let payload: Value = serde_json::from_str(value["data"].as_str().unwrap()).unwrap();
        assert_eq!(payload["type"], "WELCOME");
    }

    #[test]
    fn handled_update_without_result_omits_data() {
        let encoded = Update::handled("TYPE_A", None).encode().unwrap();
        assert_eq!(encoded, r#"{"type":"TYPE_A"}"#);
    }

    #[test]
    fn targeted_update_carries_entity_and_message() {
        let payload: Value = serde_json::from_str(
            &Update::targeted("STATUS", "order", "o1", "go").encode().unwrap(),
        )
        .unwrap();
        assert_eq!(
            payload,
            json!({
                "type": "STATUS",
                "data": { "entityType": "order", "entityId": "o1", "message": "go" }
            })
        );
    }

    #[test]
    fn targeted_update_for_hop_carries_hop_id() {
        let payload: Value =
            serde_json::from_str(&Update::targeted("STATUS", "hop", "h1", "go").encode().unwrap())
                .unwrap();
        assert_eq!(
            payload,
            json!({
                "type": "STATUS",
                "data": {
                    "entityType": "hop",
                    "entityId": "h1",
                    "hopId": "h1",
                    "message": "go",
                }
            })
        );
    }

    #[test]
    fn register_frame_accepts_object_payload() {
        let frame = ClientFrame::parse(
            r#"{"event":"REGISTER","data":{"clientId":"c1","entities":{"hop":"h1"}}}"#,
        )
        .unwrap();
        let ClientFrame::Register(payload) = frame else {
            panic!("expected a REGISTER frame");
        };
        assert_eq!(
            payload.into_registration().unwrap(),
            Registration::new("c1").with_entity("hop", "h1")
        );
    }

    #[test]
    fn register_frame_accepts_encoded_payload() {
        let frame =
            ClientFrame::parse(r#"{"event":"REGISTER","data":"{\"clientId\":\"c2\"}"}"#).unwrap();
        let ClientFrame::Register(payload) = frame else {
            panic!("expected a REGISTER frame");
        };
        assert_eq!(payload.into_registration().unwrap(), Registration::new("c2"));
    }

    #[test]
    fn register_with_null_entity_id_keeps_the_gap() {
        let frame = ClientFrame::parse(
            r#"{"event":"REGISTER","data":{"clientId":"c1","entities":{"hop":null}}}"#,
        )
        .unwrap();
        let ClientFrame::Register(payload) = frame else {
            panic!("expected a REGISTER frame");
        };
        let registration = payload.into_registration().unwrap();
        assert_eq!(registration.entities.unwrap().get("hop"), Some(&None));
    }

    #[test]
    fn message_frame_keeps_raw_text() {
        let frame =
            ClientFrame::parse(r#"{"event":"message","data":"{\"type\":\"TYPE_A\"}"}"#).unwrap();
        assert_eq!(frame, ClientFrame::Message(r#"{"type":"TYPE_A"}"#.to_string()));
    }

    #[test]
    fn unknown_frames_are_rejected() {
        assert!(ClientFrame::parse(r#"{"event":"SUBSCRIBE","data":{}}"#).is_err());
        assert!(ClientFrame::parse("garbage").is_err());
    }
}
