//! Sentiment service: two-tier resolver, access tokens, and the axum HTTP surface.

pub mod auth;
pub mod resolver;
pub mod routes;

#[cfg(test)]
mod testing;

use std::net::SocketAddr;
use std::sync::Arc;

pub use auth::{AuthError, Claims, TokenAuthority};
pub use resolver::{ResolveError, Resolver};
pub use routes::{AppState, LoginCredentials, create_router};

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(addr: SocketAddr, state: Arc<AppState>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "sentiment service listening");
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
