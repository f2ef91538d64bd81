//! HTTP adapter: binds the listener and serves the dispatch router until
//! cancelled.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use restapi_dispatch::Dispatcher;

use crate::config::PublicAddr;

pub async fn bind(addr: &PublicAddr) -> anyhow::Result<TcpListener> {
    let listener = TcpListener::bind((addr.host.as_str(), addr.port)).await?;
    Ok(listener)
}

pub async fn serve(
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let app = restapi_dispatch::http::routes(dispatcher).layer(CorsLayer::permissive());

    tracing::info!("HTTP adapter listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            cancel.cancelled().await;
        })
        .await?;

    tracing::debug!("HTTP adapter stopped");
    Ok(())
}
