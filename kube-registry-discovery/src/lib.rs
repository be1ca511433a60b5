pub mod client;
pub mod controller;
pub mod error;
pub mod feed;
pub mod records;
pub mod registry;

pub use client::client;
pub use controller::{
    Discovery, DiscoveryController, ENDPOINTS, Informers, KubeInformers, PODS, SERVICES,
};
pub use error::{Error, Result};
pub use feed::KubeFeed;
pub use records::{AddressRecord, EndpointsRecord, PodRecord, PortRecord, ServiceRecord, SubsetRecord};
pub use registry::{MicroService, MicroServiceInstance, split_service_key};
