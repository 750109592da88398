use relay::ingress::Submission;
use serde::Deserialize;
use utoipa::ToSchema;

/// Body of `POST /update`.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmitParams {
    /// Message text to deliver. Required.
    #[schema(example = "go")]
    pub(crate) message: Option<String>,
    /// Limits an untargeted broadcast to one logical client.
    pub(crate) client_id: Option<String>,
    /// Message kind; together with `entityType` and `entityId` selects targeted delivery.
    #[serde(rename = "type")]
    #[schema(example = "STATUS")]
    pub(crate) kind: Option<String>,
    #[schema(example = "hop")]
    pub(crate) entity_type: Option<String>,
    #[schema(example = "h1")]
    pub(crate) entity_id: Option<String>,
}

impl From<SubmitParams> for Submission {
    fn from(params: SubmitParams) -> Self {
        Submission {
            message: params.message,
            client_id: params.client_id,
            kind: params.kind,
            entity_type: params.entity_type,
            entity_id: params.entity_id,
        }
    }
}
