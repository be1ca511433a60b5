use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};

use kube_registry_sync::CollectionKey;
use serde::Serialize;

use crate::records::{EndpointRef, EndpointsRecord, PodRecord, ServiceRecord};

pub const DEFAULT_NAMESPACE: &str = "default";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MicroServiceInstance {
    pub instance_id: String,
    pub service_id: String,
    pub host_name: String,
    /// Address of the instance keyed by port name or protocol.
    pub endpoints: BTreeMap<String, String>,
}

impl MicroServiceInstance {
    pub(crate) fn new(endpoints: &EndpointsRecord, at: &EndpointRef<'_>, pod: &PodRecord) -> Self {
        Self {
            instance_id: pod.uid.clone(),
            service_id: service_id(&endpoints.key),
            host_name: at.address.hostname.clone().unwrap_or_default(),
            endpoints: protocol_map(at),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MicroService {
    pub service_id: String,
    pub service_name: String,
    pub namespace: String,
    pub metadata: BTreeMap<String, String>,
}

impl From<&ServiceRecord> for MicroService {
    fn from(svc: &ServiceRecord) -> Self {
        Self {
            service_id: service_id(&svc.key),
            service_name: svc.key.name.clone(),
            namespace: svc.key.namespace.clone(),
            metadata: svc.labels.clone(),
        }
    }
}

/// Splits a `name.namespace` service key. Keys without a namespace part
/// resolve to the default namespace.
pub fn split_service_key(service: &str) -> (&str, &str) {
    match service.split_once('.') {
        Some((name, namespace)) if !namespace.is_empty() => (name, namespace),
        Some((name, _)) => (name, DEFAULT_NAMESPACE),
        None => (service, DEFAULT_NAMESPACE),
    }
}

fn service_id(key: &CollectionKey) -> String {
    format!("{}.{}", key.name, key.namespace)
}

fn protocol_map(at: &EndpointRef<'_>) -> BTreeMap<String, String> {
    at.ports
        .iter()
        .map(|port| {
            let scheme = match &port.name {
                Some(name) => name.clone(),
                None if port.protocol.is_empty() => "tcp".to_string(),
                None => port.protocol.to_lowercase(),
            };
            let addr = match at.address.ip.parse::<IpAddr>() {
                Ok(ip) => SocketAddr::new(ip, port.port).to_string(),
                Err(_) => format!("{}:{}", at.address.ip, port.port),
            };
            (scheme, addr)
        })
        .collect()
}
