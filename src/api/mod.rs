pub mod routes;

pub use routes::{create_router, ApiError, AppState};

use anyhow::Context;
use axum::{middleware, Router};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::middleware::request_logging;

/// Router with the CORS, tracing and request-logging layers applied.
///
/// Request logging reads the peer address, so the router must be served
/// with connect info (see [`serve`]).
pub fn app(state: AppState) -> Router {
    create_router(state)
        .layer(middleware::from_fn(request_logging))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn serve(listener: TcpListener, state: AppState) -> anyhow::Result<()> {
    let addr = listener.local_addr().context("listener has no local address")?;
    info!("API server listening on {}", addr);

    axum::serve(
        listener,
        app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Server error")
}
