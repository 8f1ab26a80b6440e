//! Request logging middleware.
//!
//! Logs every API request with method, path, status code and latency.
//! Transaction endpoints log at INFO so submissions show up without debug
//! output; reads log at DEBUG.

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Method, Request},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::time::Instant;
use tracing::{debug, info, warn};

const TX_PATHS: [&str; 3] = ["/api/approve", "/api/deposit", "/api/withdraw"];

pub fn is_transaction_request(method: &Method, path: &str) -> bool {
    *method == Method::POST && TX_PATHS.contains(&path)
}

pub async fn request_logging(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    // Health checks are polled constantly.
    if path == "/health" {
        return next.run(request).await;
    }

    let start = Instant::now();
    let response = next.run(request).await;
    let latency_ms = start.elapsed().as_millis() as u64;
    let status = response.status().as_u16();

    if status >= 500 {
        warn!(
            method = %method,
            path = %path,
            status,
            latency_ms,
            client_ip = %addr.ip(),
            "Request failed (5xx)"
        );
    } else if is_transaction_request(&method, &path) {
        info!(
            method = %method,
            path = %path,
            status,
            latency_ms,
            client_ip = %addr.ip(),
            "Transaction request"
        );
    } else {
        debug!(method = %method, path = %path, status, latency_ms, "Request completed");
    }

    response
}
