mod discovery;
mod metrics;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use kube_registry_discovery::Discovery;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::Result;

#[derive(Clone)]
pub struct State {
    discovery: Discovery,
}

impl State {
    pub fn new(discovery: Discovery) -> Self {
        Self { discovery }
    }
}

pub async fn serve(addr: SocketAddr, state: Arc<State>, cancel: CancellationToken) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("http listening on {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown(cancel))
        .await?;
    Ok(())
}

pub fn router(state: Arc<State>) -> Router {
    Router::new()
        .route("/metrics", get(metrics::metrics))
        .route("/readyz", get(metrics::readyz))
        .route("/services", get(discovery::services))
        .route("/services/{service}/instances", get(discovery::instances))
        .with_state(state)
}

pub(crate) async fn shutdown(cancel: CancellationToken) {
    cancel.cancelled().await
}
