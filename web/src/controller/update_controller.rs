use crate::params::update::SubmitParams;
use crate::Error;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use relay::error::Error as RelayError;
use service::AppState;

use log::*;

/// POST a producer message for targeted delivery or broadcast
#[utoipa::path(
    post,
    path = "/update",
    request_body = SubmitParams,
    responses(
        (status = 200, description = "Message accepted for delivery"),
        (status = 400, description = "Message is missing or the body is malformed"),
        (status = 503, description = "Router not attached yet"),
        (status = 500, description = "Internal Server Error")
    )
)]
pub async fn submit(
    State(app_state): State<AppState>,
    payload: Result<Json<SubmitParams>, JsonRejection>,
) -> Result<impl IntoResponse, Error> {
    let Json(params) = payload.map_err(|rejection| {
        warn!("Rejected malformed /update body: {rejection}");
        RelayError::malformed(rejection)
    })?;

    debug!("POST /update: {params:?}");

    let receipt = app_state.ingress().submit(params.into())?;

    Ok((StatusCode::OK, Json(receipt)))
}
