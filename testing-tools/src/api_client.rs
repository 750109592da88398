use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(client: Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    pub async fn health(&self) -> Result<Value> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .context("Failed to reach /health")?;

        response.json().await.context("Invalid /health response")
    }

    /// POST a targeted message for one entity.
    pub async fn send_to_entity(
        &self,
        message_type: &str,
        entity_type: &str,
        entity_id: &str,
        message: &str,
    ) -> Result<Value> {
        self.post_update(json!({
            "message": message,
            "type": message_type,
            "entityType": entity_type,
            "entityId": entity_id,
        }))
        .await
    }

    /// POST a broadcast, optionally limited to one client id.
    pub async fn broadcast(&self, message: &str, client_id: Option<&str>) -> Result<Value> {
        let mut body = json!({ "message": message });
        if let Some(client_id) = client_id {
            body["clientId"] = json!(client_id);
        }
        self.post_update(body).await
    }

    /// GET the latest message cached for an entity, `None` on 404.
    pub async fn latest_message(&self, entity_type: &str, entity_id: &str) -> Result<Option<Value>> {
        let response = self
            .client
            .get(format!("{}/message", self.base_url))
            .query(&[("entityType", entity_type), ("entityId", entity_id)])
            .send()
            .await
            .context("Failed to reach /message")?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = response
            .error_for_status()
            .context("GET /message failed")?;
        Ok(Some(response.json().await?))
    }

    async fn post_update(&self, body: Value) -> Result<Value> {
        let response = self
            .client
            .post(format!("{}/update", self.base_url))
            .json(&body)
            .send()
            .await
            .context("Failed to reach /update")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            anyhow::bail!("POST /update failed: {} - {}", status, error_text);
        }

        response.json().await.context("Invalid /update response")
    }
}
