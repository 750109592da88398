use crate::controller::{health_check_controller, message_controller, update_controller};
use crate::params;
use crate::ws::handler::{socket_handler, CLIENT_ID_HEADER};
use axum::{
    body::Body,
    http::{header, HeaderName, HeaderValue, Method, Response, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use log::*;
use serde_json::json;
use service::{config::Config, AppState};
use std::any::Any;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};

use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;

// This is the global definition of our OpenAPI spec. To be a part
// of the rendered spec, a path and schema must be listed here.
#[derive(OpenApi)]
#[openapi(
        info(
            title = "Relay API"
        ),
        paths(
            health_check_controller::health_check,
            message_controller::latest,
            update_controller::submit,
        ),
        components(
            schemas(
                params::update::SubmitParams,
            )
        ),
        tags(
            (name = "relay_rs", description = "Real-time message relay ingress API")
        )
    )]
struct ApiDoc;

/// Everything served on the relay port: ingress, the relay socket and the API docs.
pub fn define_routes(app_state: AppState) -> Router {
    let socket_route = app_state.config.socket_route();
    let cors = cors_layer(&app_state.config);

    Router::new()
        .merge(ingress_routes(app_state.clone()))
        .merge(socket_routes(app_state, &socket_route))
        .merge(RapiDoc::with_openapi("/api-docs/openapi2.json", ApiDoc::openapi()).path("/rapidoc"))
        .layer(cors)
        .layer(CatchPanicLayer::custom(handle_panic))
}

/// Producer-facing routes only, for the dedicated API listener.
pub fn define_ingress_routes(app_state: AppState) -> Router {
    let cors = cors_layer(&app_state.config);

    ingress_routes(app_state)
        .layer(cors)
        .layer(CatchPanicLayer::custom(handle_panic))
}

fn ingress_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/update", post(update_controller::submit))
        .route("/message", get(message_controller::latest))
        .route("/health", get(health_check_controller::health_check))
        .with_state(app_state)
}

fn socket_routes(app_state: AppState, socket_route: &str) -> Router {
    Router::new()
        .route(socket_route, get(socket_handler))
        .with_state(app_state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let allow_origin = if config.allows_any_origin() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(config.allowed_origins.iter().filter_map(|origin| {
            origin
                .parse::<HeaderValue>()
                .inspect_err(|e| warn!("Ignoring invalid allowed origin {origin}: {e}"))
                .ok()
        }))
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(CLIENT_ID_HEADER)])
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!("Request handler panicked: {detail}");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "success": false, "error": "Internal server error" })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::Request;
    use clap::Parser;
    use events::HandlerRegistry;
    use serde_json::Value;
    use tower::ServiceExt; // for `oneshot`

    fn app_state() -> AppState {
        AppState::new(Config::try_parse_from(["relay_rs"]).unwrap())
    }

    fn attached_state() -> AppState {
        let app_state = app_state();
        let (router, _task) = relay::Router::new(HandlerRegistry::new()).spawn();
        app_state.attach_router(router);
        app_state
    }

    fn post_update(body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/update")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn update_without_message_is_rejected() {
        let app = define_routes(attached_state());

        let (status, body) = send(app, post_update(r#"{"clientId":"c1"}"#)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "success": false, "error": "message is required" }));
    }

    #[tokio::test]
    async fn update_with_malformed_body_is_rejected() {
        let app = define_routes(attached_state());

        let (status, body) = send(app, post_update("{not json")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn update_before_router_attached_is_unavailable() {
        let app = define_routes(app_state());

        let (status, body) = send(app, post_update(r#"{"message":"hi"}"#)).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn targeted_update_is_cached_and_readable() {
        let app_state = attached_state();

        let (status, body) = send(
            define_routes(app_state.clone()),
            post_update(r#"{"message":"go","type":"STATUS","entityType":"hop","entityId":"h1"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true, "message": "Message sent to hop h1" }));

        let (status, body) = send(
            define_ingress_routes(app_state),
            get_request("/message?entityType=hop&entityId=h1"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "message": "go", "source": "any" }));
    }

    #[tokio::test]
    async fn untargeted_update_is_broadcast() {
        let app = define_routes(attached_state());

        let (status, body) = send(app, post_update(r#"{"message":"hello","clientId":"c1"}"#)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true, "message": "Message broadcast" }));
    }

    #[tokio::test]
    async fn message_lookup_requires_entity() {
        let app = define_routes(attached_state());

        let (status, body) = send(app, get_request("/message?entityType=hop")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "entityId is required");
    }

    #[tokio::test]
    async fn message_lookup_misses_with_404() {
        let app = define_routes(attached_state());

        let (status, body) = send(app, get_request("/message?entityType=hop&entityId=nope")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "message": "No message found for this entity" }));
    }

    #[tokio::test]
    async fn message_lookup_filters_by_source() {
        let app_state = attached_state();
        app_state
            .cache
            .put("hop", "h2", "from sse", relay::cache::MessageSource::Sse);

        let (status, _) = send(
            define_routes(app_state.clone()),
            get_request("/message?entityType=hop&entityId=h2&source=live"),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(
            define_routes(app_state),
            get_request("/message?entityType=hop&entityId=h2&source=sse"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "message": "from sse", "source": "sse" }));
    }

    #[tokio::test]
    async fn health_reports_router_attachment() {
        let (status, body) = send(define_routes(app_state()), get_request("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok", "router": false, "connections": null }));

        let (status, body) = send(define_ingress_routes(attached_state()), get_request("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok", "router": true, "connections": 0 }));
    }

    #[tokio::test]
    async fn socket_route_is_not_on_ingress_listener() {
        let response = define_ingress_routes(attached_state())
            .oneshot(get_request("/socket"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
