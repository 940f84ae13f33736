//! Health routes
//!
//! Liveness, database reachability and a detailed status report.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::api::ApiResponse;
use crate::app::AppState;
use crate::db;
use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct WelcomeInfo {
    pub service: String,
    pub version: &'static str,
    pub health_url: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub service: String,
    pub version: &'static str,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub name: String,
    pub version: &'static str,
    pub started_at: DateTime<Utc>,
    pub uptime_seconds: u64,
}

#[derive(Debug, Serialize)]
pub struct DatabaseStatus {
    pub status: &'static str,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DetailedHealth {
    pub status: &'static str,
    pub service: ServiceInfo,
    pub database: DatabaseStatus,
    pub upload_directory: String,
    pub timestamp: DateTime<Utc>,
}

/// GET /
pub async fn root(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ApiResponse::success(
        WelcomeInfo {
            service: state.settings.app_name.clone(),
            version: env!("CARGO_PKG_VERSION"),
            health_url: "/api/v1/health",
        },
        format!("Welcome to {}", state.settings.app_name),
    )
}

/// GET /api/v1/health
///
/// Liveness only; never touches the database.
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ApiResponse::success(
        HealthStatus {
            status: "healthy",
            service: state.settings.app_name.clone(),
            version: env!("CARGO_PKG_VERSION"),
            timestamp: Utc::now(),
        },
        "Service is healthy",
    )
}

/// GET /api/v1/health/db
pub async fn database_health_check(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    if let Err(e) = db::health_check(&state.db).await {
        tracing::warn!(error = %e, "Database health check failed");
        return Err(ApiError::Unavailable(format!(
            "Database connection failed: {}",
            e
        )));
    }

    Ok(ApiResponse::success(
        DatabaseStatus {
            status: "healthy",
            error: None,
        },
        "Database is healthy",
    ))
}

/// GET /api/v1/health/detailed
pub async fn detailed_health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let db_result = db::health_check(&state.db).await;

    let (status_code, status, database) = match db_result {
        Ok(()) => (
            StatusCode::OK,
            "healthy",
            DatabaseStatus {
                status: "healthy",
                error: None,
            },
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Database unreachable during detailed health check");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "unhealthy",
                DatabaseStatus {
                    status: "unhealthy",
                    error: Some(e.to_string()),
                },
            )
        }
    };

    let report = DetailedHealth {
        status,
        service: ServiceInfo {
            name: state.settings.app_name.clone(),
            version: env!("CARGO_PKG_VERSION"),
            started_at: state.started_at,
            uptime_seconds: state.started.elapsed().as_secs(),
        },
        database,
        upload_directory: state.storage.root().display().to_string(),
        timestamp: Utc::now(),
    };

    let message = if status_code.is_success() {
        "All systems operational"
    } else {
        "Service is degraded"
    };

    (status_code, ApiResponse::success(report, message))
}

#[cfg(test)]
mod tests {
    use crate::tests::TestApp;
    use axum::http::StatusCode;
    use serde_json::Value;

    #[tokio::test]
    async fn root_points_at_health() {
        let app = TestApp::spawn().await;
        let (status, body) = app.get("/").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["health_url"], "/api/v1/health");
    }

    #[tokio::test]
    async fn liveness_reports_healthy() {
        let app = TestApp::spawn().await;
        let (status, body) = app.get("/api/v1/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "healthy");
        assert_eq!(body["data"]["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(body["error"], Value::Null);
    }

    #[tokio::test]
    async fn database_check_succeeds_against_live_pool() {
        let app = TestApp::spawn().await;
        let (status, body) = app.get("/api/v1/health/db").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "healthy");
    }

    #[tokio::test]
    async fn closed_pool_is_reported_as_unavailable() {
        let app = TestApp::spawn().await;
        app.state.db.close().await;

        let (status, body) = app.get("/api/v1/health/db").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "SERVICE_UNAVAILABLE");

        let (status, body) = app.get("/api/v1/health/detailed").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["data"]["database"]["status"], "unhealthy");
    }

    #[tokio::test]
    async fn detailed_report_includes_service_info() {
        let app = TestApp::spawn().await;
        let (status, body) = app.get("/api/v1/health/detailed").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "healthy");
        assert_eq!(body["data"]["service"]["name"], app.state.settings.app_name);
        assert!(body["data"]["service"]["uptime_seconds"].is_u64());
    }
}
