//! REST API layer: route handlers, DTOs, OpenAPI, and router composition.
//!
//! Resource endpoints are mounted under `/api/v1`; health and the
//! WebSocket endpoints live at the root.

pub mod doc;
pub mod dto;
pub mod handlers;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;
use crate::ws;

/// Path the OpenAPI document is served at.
pub const OPENAPI_PATH: &str = "/api-docs/openapi.json";

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes())
}

/// Builds the full application: REST, WebSocket, docs, and middleware.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(build_router())
        .merge(ws::handler::routes())
        .merge(docs_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

#[cfg(feature = "swagger-ui")]
fn docs_routes() -> Router<AppState> {
    use utoipa::OpenApi;
    use utoipa_swagger_ui::SwaggerUi;

    Router::new().merge(SwaggerUi::new("/swagger-ui").url(OPENAPI_PATH, doc::ApiDoc::openapi()))
}

#[cfg(not(feature = "swagger-ui"))]
fn docs_routes() -> Router<AppState> {
    use axum::Json;
    use axum::routing::get;
    use utoipa::OpenApi;

    Router::new().route(OPENAPI_PATH, get(|| async { Json(doc::ApiDoc::openapi()) }))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{Value, json};
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    use crate::config::GatewayConfig;

    async fn call(
        app: Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        };
        let Ok(request) = request else {
            panic!("request must build");
        };
        let Ok(response) = app.oneshot(request).await else {
            panic!("router is infallible");
        };
        let status = response.status();
        let Ok(bytes) = to_bytes(response.into_body(), usize::MAX).await else {
            panic!("body must be readable");
        };
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn health_reports_connections_and_bridges() {
        let state = AppState::new(GatewayConfig::default());
        let (status, body) = call(build_app(state), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.get("status"), Some(&json!("healthy")));
        assert_eq!(body.get("connections"), Some(&json!(0)));
        assert_eq!(body.get("bridges"), Some(&json!([])));
    }

    #[tokio::test]
    async fn channels_listing_covers_registry() {
        let state = AppState::new(GatewayConfig::default());
        let (tx, _rx) = mpsc::channel(8);
        let _id = state.manager.accept(tx, &["news", "alerts"]).await;

        let (status, body) = call(build_app(state), Method::GET, "/api/v1/channels", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.get("total_connections"), Some(&json!(1)));
        let Some(channels) = body.get("channels").and_then(Value::as_array) else {
            panic!("channels array");
        };
        assert_eq!(channels.len(), 5);
        assert!(channels.contains(&json!({"channel": "news", "subscribers": 1})));
        assert!(channels.contains(&json!({"channel": "prices", "subscribers": 0})));
    }

    #[tokio::test]
    async fn publish_reaches_subscribers() {
        let state = AppState::new(GatewayConfig::default());
        let (tx, mut rx) = mpsc::channel(8);
        let _id = state.manager.accept(tx, &["news"]).await;
        let _ack = rx.recv().await;

        let (status, body) = call(
            build_app(state),
            Method::POST,
            "/api/v1/channels/news/events",
            Some(json!({"type": "new_article", "data": {"id": 42}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.get("delivered"), Some(&json!(1)));
        assert_eq!(body.get("type"), Some(&json!("new_article")));

        let Some(frame) = rx.recv().await else {
            panic!("event expected");
        };
        let Ok(event) = serde_json::from_str::<Value>(&frame) else {
            panic!("frame is JSON");
        };
        assert_eq!(event.get("type"), Some(&json!("new_article")));
        assert_eq!(event.get("channel"), Some(&json!("news")));
        assert_eq!(event.pointer("/data/id"), Some(&json!(42)));
    }

    #[tokio::test]
    async fn publish_to_unknown_channel_is_not_found() {
        let state = AppState::new(GatewayConfig::default());
        let (status, body) = call(
            build_app(state),
            Method::POST,
            "/api/v1/channels/orders/events",
            Some(json!({"type": "x"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.pointer("/error/code"), Some(&json!(2001)));
    }

    #[tokio::test]
    async fn publish_with_empty_type_is_rejected() {
        let state = AppState::new(GatewayConfig::default());
        let (status, _) = call(
            build_app(state),
            Method::POST,
            "/api/v1/channels/alerts/events",
            Some(json!({"type": "  ", "data": {}})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn ws_stats_is_served() {
        let state = AppState::new(GatewayConfig::default());
        let (status, body) = call(build_app(state), Method::GET, "/ws/stats", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.get("total_connections"), Some(&json!(0)));
    }

    #[tokio::test]
    async fn openapi_document_lists_paths() {
        let state = AppState::new(GatewayConfig::default());
        let (status, body) = call(build_app(state), Method::GET, OPENAPI_PATH, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.pointer("/paths/~1health").is_some());
        assert!(body.pointer("/paths/~1api~1v1~1channels~1{channel}~1events").is_some());
    }
}
