use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    EndpointAddress, EndpointPort, EndpointSubset, Endpoints, ObjectReference, Pod, Service,
    ServicePort,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube_registry_sync::{CollectionKey, MirroredItem, Related};
use tracing::warn;

use crate::{Error, Result};

const DEFAULT_PROTOCOL: &str = "TCP";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortRecord {
    pub name: Option<String>,
    pub port: u16,
    pub protocol: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceRecord {
    pub key: CollectionKey,
    pub uid: String,
    pub labels: BTreeMap<String, String>,
    pub cluster_ips: Vec<String>,
    pub ports: Vec<PortRecord>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddressRecord {
    pub ip: String,
    pub hostname: Option<String>,
    /// Pod backing this address, if any.
    pub target: Option<CollectionKey>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubsetRecord {
    pub addresses: Vec<AddressRecord>,
    pub ports: Vec<PortRecord>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointsRecord {
    pub key: CollectionKey,
    pub labels: BTreeMap<String, String>,
    pub subsets: Vec<SubsetRecord>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PodRecord {
    pub key: CollectionKey,
    pub uid: String,
    pub labels: BTreeMap<String, String>,
    pub ip: Option<String>,
}

/// A ready address of an [`EndpointsRecord`] together with the ports of
/// its subset.
#[derive(Clone, Copy, Debug)]
pub struct EndpointRef<'a> {
    pub address: &'a AddressRecord,
    pub ports: &'a [PortRecord],
}

fn object_key(meta: &ObjectMeta) -> Result<CollectionKey> {
    let name = meta
        .name
        .clone()
        .ok_or_else(|| Error::ConversionError("object has no name".to_string()))?;
    Ok(CollectionKey::new(
        meta.namespace.clone().unwrap_or_default(),
        name,
    ))
}

fn port(name: Option<String>, port: i32, protocol: Option<String>) -> Option<PortRecord> {
    let Ok(number) = u16::try_from(port) else {
        warn!("skipping invalid port {port}");
        return None;
    };
    Some(PortRecord {
        name: name.filter(|n| !n.is_empty()),
        port: number,
        protocol: protocol.unwrap_or_else(|| DEFAULT_PROTOCOL.to_string()),
    })
}

fn service_port(p: ServicePort) -> Option<PortRecord> {
    port(p.name, p.port, p.protocol)
}

fn endpoint_port(p: EndpointPort) -> Option<PortRecord> {
    port(p.name, p.port, p.protocol)
}

impl TryFrom<Service> for ServiceRecord {
    type Error = Error;

    fn try_from(svc: Service) -> Result<Self> {
        let key = object_key(&svc.metadata)?;
        let spec = svc.spec.unwrap_or_default();
        Ok(Self {
            key,
            uid: svc.metadata.uid.unwrap_or_default(),
            labels: svc.metadata.labels.unwrap_or_default(),
            cluster_ips: spec.cluster_ips.unwrap_or_default(),
            ports: spec
                .ports
                .unwrap_or_default()
                .into_iter()
                .filter_map(service_port)
                .collect(),
        })
    }
}

fn pod_target(target: Option<ObjectReference>, namespace: &str) -> Option<CollectionKey> {
    let target = target?;
    if target.kind.as_deref().is_some_and(|kind| kind != "Pod") {
        return None;
    }
    let name = target.name?;
    Some(CollectionKey::new(
        target.namespace.unwrap_or_else(|| namespace.to_string()),
        name,
    ))
}

fn subset(subset: EndpointSubset, namespace: &str) -> SubsetRecord {
    SubsetRecord {
        addresses: subset
            .addresses
            .unwrap_or_default()
            .into_iter()
            .map(|a: EndpointAddress| AddressRecord {
                ip: a.ip,
                hostname: a.hostname.filter(|h| !h.is_empty()),
                target: pod_target(a.target_ref, namespace),
            })
            .collect(),
        ports: subset
            .ports
            .unwrap_or_default()
            .into_iter()
            .filter_map(endpoint_port)
            .collect(),
    }
}

impl TryFrom<Endpoints> for EndpointsRecord {
    type Error = Error;

    fn try_from(ep: Endpoints) -> Result<Self> {
        let key = object_key(&ep.metadata)?;
        let subsets = ep
            .subsets
            .unwrap_or_default()
            .into_iter()
            .map(|s| subset(s, &key.namespace))
            .collect();
        Ok(Self {
            key,
            labels: ep.metadata.labels.unwrap_or_default(),
            subsets,
        })
    }
}

impl TryFrom<Pod> for PodRecord {
    type Error = Error;

    fn try_from(pod: Pod) -> Result<Self> {
        let key = object_key(&pod.metadata)?;
        Ok(Self {
            key,
            uid: pod.metadata.uid.unwrap_or_default(),
            labels: pod.metadata.labels.unwrap_or_default(),
            ip: pod.status.and_then(|s| s.pod_ip),
        })
    }
}

impl MirroredItem for ServiceRecord {
    fn key(&self) -> CollectionKey {
        self.key.clone()
    }

    fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }
}

impl MirroredItem for EndpointsRecord {
    fn key(&self) -> CollectionKey {
        self.key.clone()
    }

    fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }
}

impl MirroredItem for PodRecord {
    fn key(&self) -> CollectionKey {
        self.key.clone()
    }

    fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }
}

impl Related for EndpointsRecord {
    type Detail<'a> = EndpointRef<'a>;

    fn sub_relations(&self) -> Vec<(CollectionKey, EndpointRef<'_>)> {
        let mut refs = Vec::new();
        for subset in &self.subsets {
            for address in &subset.addresses {
                let Some(target) = &address.target else {
                    warn!("address {} of endpoints {} has no pod target", address.ip, self.key);
                    continue;
                };
                refs.push((
                    target.clone(),
                    EndpointRef {
                        address,
                        ports: &subset.ports,
                    },
                ));
            }
        }
        refs
    }
}
