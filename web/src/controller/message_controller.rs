use crate::params::message::LatestParams;
use crate::Error;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use relay::error::Error as RelayError;
use service::AppState;

use log::*;

/// GET the latest message delivered to an entity
#[utoipa::path(
    get,
    path = "/message",
    params(LatestParams),
    responses(
        (status = 200, description = "Latest message for the entity"),
        (status = 400, description = "Entity type or id missing"),
        (status = 404, description = "No message found for this entity")
    )
)]
pub async fn latest(
    State(app_state): State<AppState>,
    query: Result<Query<LatestParams>, QueryRejection>,
) -> Result<impl IntoResponse, Error> {
    let Query(params) = query.map_err(|rejection| {
        warn!("Rejected malformed /message query: {rejection}");
        RelayError::malformed(rejection)
    })?;

    debug!("GET /message: {params:?}");

    let latest = app_state.ingress().latest(params.into())?;

    Ok(Json(latest))
}
