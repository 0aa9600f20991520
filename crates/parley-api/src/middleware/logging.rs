use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

/// Request logging middleware
///
/// Query strings are left out; signed file URLs carry their signature there.
pub async fn log_request(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(req).await;

    let status = response.status();
    let duration_ms = start.elapsed().as_millis();
    if status.is_server_error() {
        tracing::warn!(%method, %path, %status, duration_ms, "Request failed");
    } else {
        tracing::info!(%method, %path, %status, duration_ms, "Request processed");
    }

    response
}
