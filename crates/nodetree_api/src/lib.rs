//! HTTP surface for the node tree.
//!
//! # Responsibility
//! - Map REST requests onto `nodetree_core::TreeService` calls.
//! - Map results and errors onto JSON responses and status codes.
//! - Log one `http_request` event per request.
//!
//! # Invariants
//! - Handlers never touch SQL directly; all writes go through the service.
//! - Every non-2xx response has a JSON body with an `error` field.

mod error;
mod routes;
mod state;

pub use error::{ApiError, ErrorBody};
pub use routes::{AddNodePayload, HealthStatus, SuccessBody, UpdateNodePayload};
pub use state::AppState;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::Router;
use log::info;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::net::TcpListener;

/// Builds the full application router.
pub fn router(state: AppState) -> Router {
    routes::routes(state)
        .fallback(unknown_route)
        .layer(middleware::from_fn(log_request))
}

/// Binds `addr` and serves until Ctrl-C.
pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(
        "event=server_start module=api status=ok addr={}",
        listener.local_addr()?
    );
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("event=server_stop module=api status=ok");
    Ok(())
}

async fn unknown_route() -> ApiError {
    ApiError::not_found("Not found")
}

async fn log_request(request: Request, next: Next) -> Response {
    let started_at = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    info!(
        "event=http_request module=api status={} method={} path={} code={} duration_ms={}",
        if response.status().is_server_error() {
            "error"
        } else {
            "ok"
        },
        method,
        path,
        response.status().as_u16(),
        started_at.elapsed().as_millis()
    );
    response
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log::error!("event=shutdown_signal module=api status=error error={err}");
        // Without a signal handler the server keeps running until killed.
        std::future::pending::<()>().await;
    }
}
