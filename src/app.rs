use axum::{http::HeaderValue, middleware, Router};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Instant;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::config::Settings;
use crate::middleware::{log_requests, request_id_layer, X_REQUEST_ID};
use crate::routes;
use crate::services::FileStorage;

/// Shared application state
pub struct AppState {
    pub db: SqlitePool,
    pub settings: Settings,
    pub storage: FileStorage,
    pub started_at: DateTime<Utc>,
    /// Monotonic twin of `started_at` for uptime
    pub started: Instant,
}

impl AppState {
    pub fn new(db: SqlitePool, settings: Settings) -> Arc<Self> {
        let storage = FileStorage::new(&settings.uploads);
        Arc::new(Self {
            db,
            settings,
            storage,
            started_at: Utc::now(),
            started: Instant::now(),
        })
    }
}

/// Build the complete application with all middleware
pub fn create_app(state: Arc<AppState>) -> Router {
    // Build CORS layer
    let cors = build_cors_layer(&state.settings);

    // Build trace layer (use DEBUG for spans to reduce overhead at INFO level)
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::DEBUG));

    // Request ID layers
    let (set_request_id, propagate_request_id) = request_id_layer();

    Router::new()
        .merge(routes::api_router(&state.settings))
        .fallback(routes::not_found)
        // Middleware stack (applied bottom-up)
        .layer(middleware::from_fn(log_requests))
        .layer(propagate_request_id)
        .layer(trace_layer)
        .layer(set_request_id)
        .layer(cors)
        .with_state(state)
}

fn build_cors_layer(settings: &Settings) -> CorsLayer {
    let any_origin = settings.cors_allow_origins.iter().any(|o| o == "*");

    // In dev mode, use longer preflight cache to reduce OPTIONS requests
    let max_age = if settings.env.is_dev() {
        std::time::Duration::from_secs(86400)
    } else {
        std::time::Duration::from_secs(3600)
    };

    let layer = CorsLayer::new()
        .allow_methods(AllowMethods::list([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
            X_REQUEST_ID,
        ]))
        .expose_headers([X_REQUEST_ID, axum::http::header::CONTENT_DISPOSITION])
        .max_age(max_age);

    // Credentials cannot be combined with a wildcard origin
    if any_origin {
        layer.allow_origin(AllowOrigin::any())
    } else {
        let origins: Vec<HeaderValue> = settings
            .cors_allow_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        layer.allow_origin(origins).allow_credentials(true)
    }
}

#[cfg(test)]
mod tests {
    use crate::middleware::X_REQUEST_ID;
    use crate::tests::TestApp;
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };

    #[tokio::test]
    async fn unknown_routes_get_an_error_envelope() {
        let app = TestApp::spawn().await;
        let (status, body) = app.get("/api/v1/nope").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn request_id_is_minted_or_echoed() {
        let app = TestApp::spawn().await;

        let response = app
            .request(Request::get("/api/v1/health").body(Body::empty()).unwrap())
            .await;
        let minted = response.headers()[X_REQUEST_ID].to_str().unwrap();
        assert_eq!(minted.len(), 32);

        let response = app
            .request(
                Request::get("/api/v1/health")
                    .header(X_REQUEST_ID, "client-id-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(response.headers()[X_REQUEST_ID], "client-id-1");
    }

    #[tokio::test]
    async fn wildcard_cors_allows_any_origin_without_credentials() {
        let app = TestApp::spawn().await;

        let response = app
            .request(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/api/v1/users")
                    .header(header::ORIGIN, "https://example.com")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;

        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(headers
            .get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
            .is_none());
    }

    #[tokio::test]
    async fn listed_origins_get_credentials() {
        let app = TestApp::spawn_with(&[("CORS_ALLOW_ORIGINS", "https://app.example.com")]).await;

        let response = app
            .request(
                Request::get("/api/v1/health")
                    .header(header::ORIGIN, "https://app.example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;

        let headers = response.headers();
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://app.example.com"
        );
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    }
}
