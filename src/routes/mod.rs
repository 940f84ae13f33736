pub mod files;
pub mod health;
pub mod heroes;
pub mod users;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

use crate::app::AppState;
use crate::config::Settings;
use crate::error::ApiError;

/// Multipart framing allowance on top of the raw file bytes
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Build the API router with all routes
pub fn api_router(settings: &Settings) -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(health::root))
        .nest("/api/v1", v1_router(settings))
}

fn v1_router(settings: &Settings) -> Router<Arc<AppState>> {
    Router::new()
        // Health
        .route("/health", get(health::health_check))
        .route("/health/db", get(health::database_health_check))
        .route("/health/detailed", get(health::detailed_health_check))
        // Users
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/:user_id",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        // Heroes
        .route("/heroes", get(heroes::list_heroes).post(heroes::create_hero))
        .route("/heroes/teams/list", get(heroes::list_teams))
        .route(
            "/heroes/stats/power-distribution",
            get(heroes::power_distribution),
        )
        .route("/heroes/name/:hero_name", get(heroes::get_hero_by_name))
        .route(
            "/heroes/:hero_id",
            get(heroes::get_hero)
                .put(heroes::update_hero)
                .delete(heroes::delete_hero),
        )
        .route("/heroes/:hero_id/activate", post(heroes::activate_hero))
        .route("/heroes/:hero_id/deactivate", post(heroes::deactivate_hero))
        // Files
        .nest("/files", files_router(settings))
}

fn files_router(settings: &Settings) -> Router<Arc<AppState>> {
    let uploads = &settings.uploads;
    // Oversized single files are rejected with a proper 413 envelope by the
    // handler; this only bounds the whole request body.
    let body_limit = uploads
        .max_file_size
        .saturating_add(1)
        .saturating_mul(uploads.max_files_per_request.max(1))
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/upload", post(files::upload_file))
        .route("/upload/multiple", post(files::upload_files))
        .route("/download/:file_id", get(files::download_file))
        .route("/delete/:file_id", delete(files::delete_file))
        .route("/list", get(files::list_files))
        .route("/info/:file_id", get(files::file_info))
        .route("/stats", get(files::upload_stats))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
}

/// Fallback for unknown routes
pub async fn not_found() -> ApiError {
    ApiError::not_found("The requested resource was not found")
}
