use std::sync::Arc;

use k8s_openapi::api::core::v1::{Endpoints, Pod, Service};
use kube::{Api, Client};
use kube_registry_sync::{
    ChangeFeed, CollectionKey, HandlerFuncs, Informer, QueryFacade, Selector, SyncConfig,
    SyncCoordinator,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::Result;
use crate::feed::KubeFeed;
use crate::records::{EndpointsRecord, PodRecord, ServiceRecord};
use crate::registry::{MicroService, MicroServiceInstance, split_service_key};

pub const SERVICES: &str = "services";
pub const ENDPOINTS: &str = "endpoints";
pub const PODS: &str = "pods";

/// Informers for the three collections mirrored by a [`DiscoveryController`].
pub struct Informers<S: ChangeFeed, E: ChangeFeed, P: ChangeFeed> {
    pub services: Informer<S>,
    pub endpoints: Informer<E>,
    pub pods: Informer<P>,
}

pub type KubeInformers = Informers<
    KubeFeed<Service, ServiceRecord>,
    KubeFeed<Endpoints, EndpointsRecord>,
    KubeFeed<Pod, PodRecord>,
>;

impl KubeInformers {
    /// Watches services, endpoints and pods across all namespaces.
    pub fn from_client(client: Client) -> Self {
        Self {
            services: Informer::from_feed(KubeFeed::new(Api::all(client.clone()))),
            endpoints: Informer::from_feed(KubeFeed::new(Api::all(client.clone()))),
            pods: Informer::from_feed(KubeFeed::new(Api::all(client))),
        }
    }
}

pub struct DiscoveryController {
    coordinator: SyncCoordinator,
    discovery: Discovery,
}

impl DiscoveryController {
    pub fn new<S, E, P>(informers: Informers<S, E, P>, config: SyncConfig) -> Result<Self>
    where
        S: ChangeFeed<Item = ServiceRecord>,
        E: ChangeFeed<Item = EndpointsRecord>,
        P: ChangeFeed<Item = PodRecord>,
    {
        let Informers {
            mut services,
            mut endpoints,
            pods,
        } = informers;
        services.subscribe(
            HandlerFuncs::default()
                .with_add(|svc: &Arc<ServiceRecord>| info!("Add Service: {}", svc.key.name)),
        );
        endpoints.subscribe(
            HandlerFuncs::default()
                .with_add(|ep: &Arc<EndpointsRecord>| info!("Add Endpoints: {}", ep.key.name)),
        );

        let mut coordinator = SyncCoordinator::new(config);
        coordinator.register(SERVICES, services)?;
        coordinator.register(ENDPOINTS, endpoints)?;
        coordinator.register(PODS, pods)?;
        let discovery = Discovery {
            query: coordinator.query(),
        };
        Ok(Self {
            coordinator,
            discovery,
        })
    }

    pub fn from_client(client: Client, config: SyncConfig) -> Result<Self> {
        Self::new(KubeInformers::from_client(client), config)
    }

    /// Starts the informers and waits for their caches to sync.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<()> {
        info!("Starting Discovery Controller");
        if let Err(e) = self.coordinator.run(cancel).await {
            error!(%e, "failed to wait for caches to sync");
            return Err(e.into());
        }
        info!("Finish Waiting For Cache Sync");
        Ok(())
    }

    pub fn coordinator(&self) -> &SyncCoordinator {
        &self.coordinator
    }

    pub fn discovery(&self) -> Discovery {
        self.discovery.clone()
    }
}

/// Cloneable read handle answering discovery queries from the mirrored
/// collections.
#[derive(Clone)]
pub struct Discovery {
    query: QueryFacade,
}

impl Discovery {
    pub fn is_ready(&self) -> bool {
        self.query.is_ready()
    }

    /// Instances of the `name.namespace` service whose pods carry every
    /// label in `tags`.
    pub fn find_endpoints(&self, service: &str, tags: &Selector) -> Result<Vec<MicroServiceInstance>> {
        let (name, namespace) = split_service_key(service);
        self.find_endpoints_like(&CollectionKey::new(namespace, name), tags)
    }

    pub fn find_endpoints_like(
        &self,
        key: &CollectionKey,
        selector: &Selector,
    ) -> Result<Vec<MicroServiceInstance>> {
        let instances = self.query.find_related::<EndpointsRecord, PodRecord, _, _>(
            ENDPOINTS,
            PODS,
            key,
            selector,
            MicroServiceInstance::new,
        )?;
        debug!("found {} instances of {key}", instances.len());
        Ok(instances)
    }

    pub fn get_all_services(&self) -> Result<Vec<MicroService>> {
        let services = self
            .query
            .list_all::<ServiceRecord, _>(SERVICES, |_| true)
            .inspect_err(|e| info!(%e, "get all microservices from kube failed"))?;
        let services: Vec<_> = services.iter().map(|s| MicroService::from(s.as_ref())).collect();
        debug!("get all microservices success, {} microservices", services.len());
        Ok(services)
    }
}

#[cfg(test)]
mod test {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use k8s_openapi::api::core::v1::{EndpointAddress, EndpointPort, EndpointSubset, ObjectReference};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use kube_registry_sync::{ChannelFeed, FeedSender, channel_feed};

    use super::*;
    use crate::Error;

    type TestInformers =
        Informers<ChannelFeed<ServiceRecord>, ChannelFeed<EndpointsRecord>, ChannelFeed<PodRecord>>;

    struct Feeds {
        services: FeedSender<ServiceRecord>,
        endpoints: FeedSender<EndpointsRecord>,
        pods: FeedSender<PodRecord>,
    }

    fn informers() -> (Feeds, TestInformers) {
        let (services, service_feed) = channel_feed(16);
        let (endpoints, endpoints_feed) = channel_feed(16);
        let (pods, pod_feed) = channel_feed(16);
        (
            Feeds {
                services,
                endpoints,
                pods,
            },
            Informers {
                services: Informer::from_feed(service_feed),
                endpoints: Informer::from_feed(endpoints_feed),
                pods: Informer::from_feed(pod_feed),
            },
        )
    }

    fn meta(namespace: &str, name: &str, labels: &[(&str, &str)]) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            uid: Some(format!("{name}-uid")),
            labels: Some(
                labels
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ),
            ..Default::default()
        }
    }

    fn pod(name: &str, labels: &[(&str, &str)]) -> PodRecord {
        PodRecord::try_from(Pod {
            metadata: meta("default", name, labels),
            ..Default::default()
        })
        .unwrap()
    }

    fn address(ip: &str, pod: Option<&str>) -> EndpointAddress {
        EndpointAddress {
            ip: ip.to_string(),
            target_ref: pod.map(|name| ObjectReference {
                kind: Some("Pod".to_string()),
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn endpoints() -> EndpointsRecord {
        EndpointsRecord::try_from(Endpoints {
            metadata: meta("default", "web", &[]),
            subsets: Some(vec![EndpointSubset {
                addresses: Some(vec![
                    address("10.0.0.1", Some("p1")),
                    address("10.0.0.2", Some("p2")),
                    address("10.0.0.3", Some("gone")),
                    address("10.0.0.4", None),
                ]),
                ports: Some(vec![EndpointPort {
                    name: Some("http".to_string()),
                    port: 8080,
                    ..Default::default()
                }]),
                ..Default::default()
            }]),
        })
        .unwrap()
    }

    fn service() -> ServiceRecord {
        ServiceRecord::try_from(Service {
            metadata: meta("default", "web", &[("team", "a")]),
            ..Default::default()
        })
        .unwrap()
    }

    async fn synced() -> (Feeds, DiscoveryController) {
        let (feeds, informers) = informers();
        let mut controller = DiscoveryController::new(
            informers,
            SyncConfig {
                timeout: Some(Duration::from_secs(5)),
            },
        )
        .unwrap();
        feeds.services.bootstrap(vec![service()]).await.unwrap();
        feeds.endpoints.bootstrap(vec![endpoints()]).await.unwrap();
        feeds
            .pods
            .bootstrap(vec![pod("p1", &[("app", "x")]), pod("p2", &[("app", "y")])])
            .await
            .unwrap();
        controller.run(CancellationToken::new()).await.unwrap();
        (feeds, controller)
    }

    #[tokio::test]
    async fn test_find_endpoints_filters_by_tags() {
        let (_feeds, controller) = synced().await;
        let discovery = controller.discovery();

        let instances = discovery
            .find_endpoints("web", &Selector::everything().with("app", "x"))
            .unwrap();
        assert_eq!(
            instances,
            vec![MicroServiceInstance {
                instance_id: "p1-uid".to_string(),
                service_id: "web.default".to_string(),
                host_name: String::new(),
                endpoints: BTreeMap::from([("http".to_string(), "10.0.0.1:8080".to_string())]),
            }]
        );

        let all = discovery
            .find_endpoints("web.default", &Selector::everything())
            .unwrap();
        let ids: Vec<_> = all.iter().map(|i| i.instance_id.as_str()).collect();
        assert_eq!(ids, vec!["p1-uid", "p2-uid"]);
    }

    #[tokio::test]
    async fn test_find_endpoints_unknown_service() {
        let (_feeds, controller) = synced().await;
        let res = controller
            .discovery()
            .find_endpoints("missing.default", &Selector::everything());
        assert!(matches!(
            res,
            Err(Error::Sync(kube_registry_sync::Error::NotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_get_all_services() {
        let (_feeds, controller) = synced().await;
        let services = controller.discovery().get_all_services().unwrap();
        assert_eq!(
            services,
            vec![MicroService {
                service_id: "web.default".to_string(),
                service_name: "web".to_string(),
                namespace: "default".to_string(),
                metadata: BTreeMap::from([("team".to_string(), "a".to_string())]),
            }]
        );
    }

    #[tokio::test]
    async fn test_queries_fail_before_sync() {
        let (_feeds, informers) = informers();
        let controller = DiscoveryController::new(informers, SyncConfig::default()).unwrap();
        let discovery = controller.discovery();
        assert!(!discovery.is_ready());
        assert!(matches!(
            discovery.get_all_services(),
            Err(Error::Sync(kube_registry_sync::Error::NotReady))
        ));
    }

    #[tokio::test]
    async fn test_run_cancelled() {
        let (_feeds, informers) = informers();
        let mut controller = DiscoveryController::new(informers, SyncConfig::default()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let res = controller.run(cancel).await;
        assert!(matches!(
            res,
            Err(Error::Sync(kube_registry_sync::Error::SyncAborted { .. }))
        ));
        assert_eq!(
            controller.coordinator().pending(),
            vec![SERVICES, ENDPOINTS, PODS]
        );
    }
}
