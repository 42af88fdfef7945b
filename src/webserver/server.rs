/// Listener setup and graceful serving
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Notify;

use crate::errors::{MetadataError, MetadataResult};
use crate::logger::{self, LogTag};
use crate::webserver::{routes, state::AppState};

/// Bind the listener up front so address problems fail startup
pub async fn bind(host: &str, port: u16) -> MetadataResult<TcpListener> {
    TcpListener::bind((host, port)).await.map_err(|e| {
        let hint = match e.kind() {
            std::io::ErrorKind::AddrInUse => " (address already in use; is another instance running?)",
            std::io::ErrorKind::PermissionDenied => " (permission denied; try a port above 1024)",
            _ => "",
        };
        MetadataError::Config(format!("Failed to bind {}:{}: {}{}", host, port, e, hint))
    })
}

pub fn build_app(state: AppState) -> Router {
    routes::create_router(Arc::new(state))
}

/// Serve until `shutdown` is notified
pub async fn serve(listener: TcpListener, state: AppState, shutdown: Arc<Notify>) -> MetadataResult<()> {
    if let Ok(addr) = listener.local_addr() {
        logger::info(LogTag::Webserver, &format!("Listening on http://{}", addr));
    }

    let shutdown_signal = async move {
        shutdown.notified().await;
        logger::debug(LogTag::Webserver, "Shutdown signal received, stopping webserver");
    };

    axum::serve(listener, build_app(state))
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    logger::info(LogTag::Webserver, "Webserver stopped");
    Ok(())
}
