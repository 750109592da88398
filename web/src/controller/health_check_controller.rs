use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use service::AppState;

/// GET process liveness and whether the Router is attached
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Relay is up; reports Router attachment and live connection count"),
        (status = 500, description = "Internal Server Error")
    )
)]
pub async fn health_check(State(app_state): State<AppState>) -> impl IntoResponse {
    let connections = match app_state.router() {
        Some(router) => router.stats().await.ok().map(|stats| stats.connections),
        None => None,
    };

    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "router": connections.is_some(),
            "connections": connections,
        })),
    )
}
