use std::any::Any;
use std::sync::Arc;

use ahash::HashMap;
use tracing::{debug, warn};

use crate::gate::ReadyGate;
use crate::selector::Selector;
use crate::store::{CollectionKey, LocalStore, MirroredItem};
use crate::{Error, Result};

pub(crate) type Catalog = HashMap<String, Arc<dyn Any + Send + Sync>>;

/// Foreign-key style references from an item to items of another
/// collection.
pub trait Related {
    /// Per reference data handed to the translation step along with the
    /// referenced item.
    type Detail<'a>
    where
        Self: 'a;

    fn sub_relations(&self) -> Vec<(CollectionKey, Self::Detail<'_>)>;
}

/// Read-only queries across the stores of a [`crate::SyncCoordinator`].
/// Queries fail with [`Error::NotReady`] until every collection has synced
/// once.
#[derive(Clone)]
pub struct QueryFacade {
    ready: ReadyGate,
    stores: Arc<Catalog>,
}

impl QueryFacade {
    pub(crate) fn new(ready: ReadyGate, stores: Catalog) -> Self {
        Self {
            ready,
            stores: Arc::new(stores),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.is_ready()
    }

    pub fn store<K: MirroredItem>(&self, collection: &str) -> Result<LocalStore<K>> {
        lookup(&self.stores, collection)
    }

    /// Resolves every sub-relation of the `primary` item at `key` in the
    /// `related` collection and translates the resolved items whose labels
    /// match `selector`. References that can't be resolved are skipped.
    pub fn find_related<P, R, T, F>(
        &self,
        primary: &str,
        related: &str,
        key: &CollectionKey,
        selector: &Selector,
        mut translate: F,
    ) -> Result<Vec<T>>
    where
        P: MirroredItem + Related,
        R: MirroredItem,
        F: FnMut(&P, &P::Detail<'_>, &R) -> T,
    {
        self.ensure_ready()?;
        let primaries = self.store::<P>(primary)?;
        let relatives = self.store::<R>(related)?;

        let item = primaries.get(key).ok_or_else(|| Error::NotFound {
            collection: primary.to_string(),
            key: key.clone(),
        })?;

        let mut results = Vec::new();
        for (target, detail) in item.sub_relations() {
            let Some(resolved) = relatives.get(&target) else {
                warn!("failed to resolve {related} {target} referenced by {primary} {key}");
                continue;
            };
            if !selector.matches(resolved.labels()) {
                debug!("{related} {target} does not match selector {selector}");
                continue;
            }
            results.push(translate(&item, &detail, &resolved));
        }
        Ok(results)
    }

    /// Lists every item of `collection` matching `predicate`.
    pub fn list_all<K, P>(&self, collection: &str, predicate: P) -> Result<Vec<Arc<K>>>
    where
        K: MirroredItem,
        P: Fn(&K) -> bool,
    {
        self.ensure_ready()?;
        Ok(self.store::<K>(collection)?.list(predicate).collect())
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.ready.is_ready() {
            Ok(())
        } else {
            Err(Error::NotReady)
        }
    }
}

pub(crate) fn lookup<K: MirroredItem>(stores: &Catalog, collection: &str) -> Result<LocalStore<K>> {
    let store = stores
        .get(collection)
        .ok_or_else(|| Error::UnknownCollection(collection.to_string()))?;
    (**store)
        .downcast_ref::<LocalStore<K>>()
        .cloned()
        .ok_or_else(|| Error::CollectionType {
            collection: collection.to_string(),
        })
}
