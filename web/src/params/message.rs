use relay::cache::MessageSource;
use relay::ingress::LatestQuery;
use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LatestParams {
    /// Entity type to look up. Required.
    pub(crate) entity_type: Option<String>,
    /// Entity id to look up. Required.
    pub(crate) entity_id: Option<String>,
    /// Only return a message stored from this source (`live` or `sse`).
    #[param(value_type = Option<String>)]
    pub(crate) source: Option<MessageSource>,
}

impl From<LatestParams> for LatestQuery {
    fn from(params: LatestParams) -> Self {
        LatestQuery {
            entity_type: params.entity_type,
            entity_id: params.entity_id,
            source: params.source,
        }
    }
}
