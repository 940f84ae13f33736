//! One log line per request, with the level chosen by response status

use axum::{
    extract::{ConnectInfo, Request},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::time::Instant;

use super::request_id::request_id_of;

pub async fn log_requests(req: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let request_id = request_id_of(&req).unwrap_or("-").to_owned();
    let client = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    tracing::debug!(%method, %path, %client, %request_id, "Request received");

    let response = next.run(req).await;

    let status = response.status().as_u16();
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

    if status < 400 {
        tracing::info!(%method, %path, status, elapsed_ms, %request_id, "Request completed");
    } else if status < 500 {
        tracing::warn!(%method, %path, status, elapsed_ms, %request_id, "Request rejected");
    } else {
        tracing::error!(%method, %path, status, elapsed_ms, %request_id, "Request failed");
    }

    response
}
