use std::sync::{Arc, LazyLock, RwLock};

use kube_registry_sync::EventHandler;
use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;

pub static REGISTRY: LazyLock<RwLock<Registry>> =
    LazyLock::new(|| RwLock::new(Registry::with_prefix("kube_registry")));

#[derive(Clone, Default)]
pub struct StoreMetrics {
    pub events: Family<EventLabels, Counter>,
    pub items: Family<CollectionLabels, Gauge>,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct EventLabels {
    pub collection: String,
    pub kind: EventKind,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum EventKind {
    Add,
    Update,
    Delete,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct CollectionLabels {
    pub collection: String,
}

impl StoreMetrics {
    /// Register store metrics to start tracking them.
    pub fn register(self, r: &mut Registry) -> Self {
        r.register(
            "feed_events",
            "Number of change feed events applied to a store",
            self.events.clone(),
        );
        r.register(
            "store_items",
            "Number of items mirrored in a store",
            self.items.clone(),
        );
        self
    }

    pub fn handler(&self, collection: &str) -> MetricsHandler {
        MetricsHandler {
            collection: collection.to_string(),
            metrics: self.clone(),
        }
    }
}

/// Records the events of one collection.
pub struct MetricsHandler {
    collection: String,
    metrics: StoreMetrics,
}

impl MetricsHandler {
    fn record(&self, kind: EventKind) {
        self.metrics
            .events
            .get_or_create(&EventLabels {
                collection: self.collection.clone(),
                kind,
            })
            .inc();
    }

    fn items(&self) -> Gauge {
        self.metrics
            .items
            .get_or_create(&CollectionLabels {
                collection: self.collection.clone(),
            })
            .clone()
    }
}

impl<K> EventHandler<K> for MetricsHandler {
    fn on_add(&self, _item: &Arc<K>) {
        self.record(EventKind::Add);
        self.items().inc();
    }

    fn on_update(&self, _old: &Arc<K>, _new: &Arc<K>) {
        self.record(EventKind::Update);
    }

    fn on_delete(&self, _item: &Arc<K>) {
        self.record(EventKind::Delete);
        self.items().dec();
    }
}
