use kube_registry_discovery::{DiscoveryController, ENDPOINTS, KubeInformers, PODS, SERVICES};
use kube_registry_sync::SyncConfig;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::Result;
use crate::metrics::StoreMetrics;

/// Builds a controller over the cluster `client`, recording every applied
/// change in `metrics`.
pub fn build(
    client: kube::Client,
    config: SyncConfig,
    metrics: &StoreMetrics,
) -> Result<DiscoveryController> {
    let mut informers = KubeInformers::from_client(client);
    informers.services.subscribe(metrics.handler(SERVICES));
    informers.endpoints.subscribe(metrics.handler(ENDPOINTS));
    informers.pods.subscribe(metrics.handler(PODS));
    Ok(DiscoveryController::new(informers, config)?)
}

/// Waits for the caches to sync, then keeps the controller alive until
/// `cancel` fires. A sync timeout only delays readiness.
pub async fn start(mut controller: DiscoveryController, cancel: CancellationToken) -> Result<()> {
    match controller.run(cancel.clone()).await {
        Ok(()) => {}
        Err(kube_registry_discovery::Error::Sync(kube_registry_sync::Error::Timeout(timeout))) => {
            warn!(
                "caches not synced after {timeout:?}, pending: {}",
                controller.coordinator().pending().join(", ")
            );
        }
        Err(e) => return Err(e.into()),
    }
    cancel.cancelled().await;
    info!("stopping discovery controller");
    Ok(())
}
