use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use log::*;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

/// One decoded `update` frame: its `type` plus the optional `data` payload.
#[derive(Debug, Clone)]
pub struct Update {
    pub update_type: String,
    pub data: Value,
}

pub struct Connection {
    pub label: String,
    outbound: mpsc::UnboundedSender<Message>,
    update_rx: mpsc::UnboundedReceiver<Update>,
    _handle: tokio::task::JoinHandle<()>,
}

impl Connection {
    pub async fn establish(socket_url: &str, label: String) -> Result<Self> {
        let (stream, _) = connect_async(socket_url)
            .await
            .with_context(|| format!("Failed to connect to {socket_url}"))?;
        let (mut ws_tx, mut ws_rx) = stream.split();

        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

        let task_label = label.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    message = outbound_rx.recv() => {
                        let Some(message) = message else { break };
                        if let Err(e) = ws_tx.send(message).await {
                            warn!("Send failed for {}: {}", task_label, e);
                            break;
                        }
                    }
                    inbound = ws_rx.next() => match inbound {
                        Some(Ok(Message::Text(text))) => {
                            let Some(update) = decode_update(text.as_str()) else {
                                debug!("Ignoring non-update frame for {}", task_label);
                                continue;
                            };
                            if update_tx.send(update).is_err() {
                                debug!("Update receiver dropped for {}", task_label);
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            debug!("Socket closed for {}", task_label);
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!("Socket error for {}: {}", task_label, e);
                            break;
                        }
                    }
                }
            }
        });

        Ok(Self {
            label,
            outbound,
            update_rx,
            _handle: handle,
        })
    }

    /// Send `REGISTER` with a client id and `(entityType, entityId)` bindings.
    pub fn register(&self, client_id: &str, entities: &[(&str, &str)]) -> Result<()> {
        let entities: serde_json::Map<String, Value> = entities
            .iter()
            .map(|(entity_type, entity_id)| (entity_type.to_string(), json!(entity_id)))
            .collect();
        let frame = json!({
            "event": "REGISTER",
            "data": { "clientId": client_id, "entities": entities },
        });
        self.send_text(frame.to_string())
    }

    pub fn close(&self) -> Result<()> {
        self.outbound
            .send(Message::Close(None))
            .map_err(|_| anyhow::anyhow!("Socket task for {} has stopped", self.label))
    }

    fn send_text(&self, text: String) -> Result<()> {
        self.outbound
            .send(Message::Text(text.into()))
            .map_err(|_| anyhow::anyhow!("Socket task for {} has stopped", self.label))
    }

    pub async fn wait_for_update(&mut self, update_type: &str, timeout: Duration) -> Result<Update> {
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                anyhow::bail!("Timeout waiting for update: {}", update_type);
            }

            match tokio::time::timeout(remaining, self.update_rx.recv()).await {
                Ok(Some(update)) if update.update_type == update_type => {
                    return Ok(update);
                }
                Ok(Some(_)) => {
                    // Wrong update type, keep waiting
                    continue;
                }
                Ok(None) => {
                    anyhow::bail!("Socket connection closed");
                }
                Err(_) => {
                    anyhow::bail!("Timeout waiting for update: {}", update_type);
                }
            }
        }
    }

    /// Succeeds if no update of this type arrives within `window`.
    pub async fn expect_no_update(&mut self, update_type: &str, window: Duration) -> Result<()> {
        match self.wait_for_update(update_type, window).await {
            Ok(update) => anyhow::bail!(
                "{} unexpectedly received {}: {}",
                self.label,
                update_type,
                update.data
            ),
            Err(_) => Ok(()),
        }
    }
}

fn decode_update(text: &str) -> Option<Update> {
    let frame: Value = serde_json::from_str(text).ok()?;
    if frame["event"] != "update" {
        return None;
    }
    let payload: Value = serde_json::from_str(frame["data"].as_str()?).ok()?;

    Some(Update {
        update_type: payload["type"].as_str()?.to_string(),
        data: payload.get("data").cloned().unwrap_or(Value::Null),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_update_frames() {
        let text = r#"{"event":"update","data":"{\"type\":\"STATUS\",\"data\":{\"message\":\"go\"}}"}"#;
        let update = decode_update(text).unwrap();
        assert_eq!(update.update_type, "STATUS");
        assert_eq!(update.data["message"], "go");
    }

    #[test]
    fn skips_other_frames() {
        assert!(decode_update(r#"{"event":"other","data":"{}"}"#).is_none());
        assert!(decode_update("not json").is_none());
    }
}
