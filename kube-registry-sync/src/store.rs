use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::sync::Arc;

use ahash::{HashSet, RandomState};
use dashmap::DashMap;

use crate::selector::Selector;

/// Identifies one item within one collection. Cluster scoped items use an
/// empty namespace.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionKey {
    pub namespace: String,
    pub name: String,
}

impl CollectionKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn cluster_scoped(name: impl Into<String>) -> Self {
        Self::new(String::new(), name)
    }
}

impl Display for CollectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.namespace, self.name)
        }
    }
}

/// An item that can be mirrored in a [`LocalStore`].
pub trait MirroredItem: Send + Sync + 'static {
    fn key(&self) -> CollectionKey;
    fn labels(&self) -> &BTreeMap<String, String>;
}

type Entries<K> = DashMap<CollectionKey, Arc<K>, RandomState>;

/// Creates the read and write halves of an empty store.
pub fn store<K: MirroredItem>() -> (LocalStore<K>, StoreWriter<K>) {
    let entries = Arc::new(DashMap::with_hasher(RandomState::new()));
    (
        LocalStore {
            entries: entries.clone(),
        },
        StoreWriter {
            entries,
            relisted: None,
        },
    )
}

/// Read half of a mirrored collection.
pub struct LocalStore<K> {
    entries: Arc<Entries<K>>,
}

impl<K> Clone for LocalStore<K> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<K: MirroredItem> LocalStore<K> {
    pub fn get(&self, key: &CollectionKey) -> Option<Arc<K>> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Lazily yields every item matching `predicate`. The entries are
    /// snapshotted when called so a scan never holds a lock and never sees a
    /// partially written item; call again to observe newer state.
    pub fn list<P>(&self, predicate: P) -> impl Iterator<Item = Arc<K>> + use<K, P>
    where
        P: Fn(&K) -> bool,
    {
        self.state()
            .into_iter()
            .filter(move |item| predicate(item.as_ref()))
    }

    pub fn list_matching(&self, selector: &Selector) -> impl Iterator<Item = Arc<K>> + use<K> {
        let selector = selector.clone();
        self.list(move |item| selector.matches(item.labels()))
    }

    pub fn state(&self) -> Vec<Arc<K>> {
        self.entries
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn keys(&self) -> Vec<CollectionKey> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Write half of a mirrored collection, owned by the informer feeding it.
pub struct StoreWriter<K> {
    entries: Arc<Entries<K>>,
    // keys seen since the last `Listing` event
    relisted: Option<HashSet<CollectionKey>>,
}

impl<K: MirroredItem> StoreWriter<K> {
    pub fn reader(&self) -> LocalStore<K> {
        LocalStore {
            entries: self.entries.clone(),
        }
    }

    pub(crate) fn apply_add(&mut self, item: Arc<K>) -> Option<Arc<K>> {
        self.upsert(item)
    }

    pub(crate) fn apply_update(&mut self, item: Arc<K>) -> Option<Arc<K>> {
        self.upsert(item)
    }

    pub(crate) fn apply_delete(&mut self, key: &CollectionKey) -> Option<Arc<K>> {
        if let Some(relisted) = self.relisted.as_mut() {
            relisted.remove(key);
        }
        self.entries.remove(key).map(|(_, item)| item)
    }

    pub(crate) fn begin_relist(&mut self) {
        self.relisted = Some(HashSet::default());
    }

    /// Removes every item not seen since [`Self::begin_relist`] and returns
    /// the removed items.
    pub(crate) fn finish_relist(&mut self) -> Vec<Arc<K>> {
        let Some(relisted) = self.relisted.take() else {
            return Vec::new();
        };
        let stale: Vec<CollectionKey> = self
            .entries
            .iter()
            .filter(|entry| !relisted.contains(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();
        stale
            .iter()
            .filter_map(|key| self.entries.remove(key).map(|(_, item)| item))
            .collect()
    }

    fn upsert(&mut self, item: Arc<K>) -> Option<Arc<K>> {
        let key = item.key();
        if let Some(relisted) = self.relisted.as_mut() {
            relisted.insert(key.clone());
        }
        self.entries.insert(key, item)
    }
}

#[cfg(test)]
mod test {
    use std::thread;

    use super::*;
    use crate::testing::{TestItem, item};

    #[test]
    fn test_last_writer_wins() {
        let (store, mut writer) = store::<TestItem>();
        writer.apply_add(Arc::new(item("ns", "a", &[]).version(1)));
        writer.apply_add(Arc::new(item("ns", "b", &[]).version(1)));
        writer.apply_update(Arc::new(item("ns", "a", &[]).version(2)));
        writer.apply_delete(&CollectionKey::new("ns", "b"));
        writer.apply_update(Arc::new(item("ns", "a", &[]).version(3)));
        writer.apply_add(Arc::new(item("ns", "b", &[]).version(4)));

        assert_eq!(store.len(), 2);
        assert_eq!(
            store.get(&CollectionKey::new("ns", "a")).unwrap().version,
            3
        );
        assert_eq!(
            store.get(&CollectionKey::new("ns", "b")).unwrap().version,
            4
        );
        assert!(store.get(&CollectionKey::new("other", "a")).is_none());
    }

    #[test]
    fn test_apply_returns_previous() {
        let (_store, mut writer) = store::<TestItem>();
        assert!(writer.apply_add(Arc::new(item("ns", "a", &[]))).is_none());
        let old = writer
            .apply_update(Arc::new(item("ns", "a", &[]).version(7)))
            .unwrap();
        assert_eq!(old.version, 0);
        assert_eq!(
            writer
                .apply_delete(&CollectionKey::new("ns", "a"))
                .unwrap()
                .version,
            7
        );
        assert!(writer.apply_delete(&CollectionKey::new("ns", "a")).is_none());
    }

    #[test]
    fn test_list_selector_superset() {
        let (store, mut writer) = store::<TestItem>();
        writer.apply_add(Arc::new(item("ns", "x", &[("app", "x")])));
        writer.apply_add(Arc::new(item("ns", "xw", &[("app", "x"), ("tier", "web")])));
        writer.apply_add(Arc::new(item("ns", "yw", &[("app", "y"), ("tier", "web")])));
        writer.apply_add(Arc::new(item("ns", "none", &[])));

        let selector = Selector::everything().with("app", "x");
        let mut names: Vec<String> = store
            .list_matching(&selector)
            .map(|i| i.key.name.clone())
            .collect();
        names.sort();
        assert_eq!(names, vec!["x", "xw"]);

        let selector = Selector::everything().with("tier", "web");
        let mut names: Vec<String> = store
            .list_matching(&selector)
            .map(|i| i.key.name.clone())
            .collect();
        names.sort();
        assert_eq!(names, vec!["xw", "yw"]);

        let selector = Selector::everything().with("app", "x").with("tier", "db");
        assert_eq!(store.list_matching(&selector).count(), 0);
        assert_eq!(store.list_matching(&Selector::everything()).count(), 4);
    }

    #[test]
    fn test_list_is_a_fresh_scan() {
        let (store, mut writer) = store::<TestItem>();
        writer.apply_add(Arc::new(item("ns", "a", &[])));
        let before = store.list(|_| true);
        writer.apply_add(Arc::new(item("ns", "b", &[])));
        assert_eq!(before.count(), 1);
        assert_eq!(store.list(|_| true).count(), 2);
    }

    #[test]
    fn test_relist_prunes_unseen() {
        let (store, mut writer) = store::<TestItem>();
        writer.apply_add(Arc::new(item("ns", "a", &[])));
        writer.apply_add(Arc::new(item("ns", "b", &[])));

        writer.begin_relist();
        writer.apply_add(Arc::new(item("ns", "b", &[]).version(2)));
        writer.apply_add(Arc::new(item("ns", "c", &[])));
        let pruned = writer.finish_relist();

        assert_eq!(pruned.len(), 1);
        assert_eq!(pruned[0].key, CollectionKey::new("ns", "a"));
        let mut keys = store.keys();
        keys.sort();
        assert_eq!(
            keys,
            vec![CollectionKey::new("ns", "b"), CollectionKey::new("ns", "c")]
        );
        assert!(writer.finish_relist().is_empty());
    }

    #[test]
    fn test_concurrent_readers_during_writes() {
        let (store, mut writer) = store::<TestItem>();
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || {
                    for _ in 0..200 {
                        for i in store.list(|_| true) {
                            // versions are written together with matching labels
                            assert_eq!(i.labels.get("version"), Some(&i.version.to_string()));
                        }
                    }
                })
            })
            .collect();

        for version in 0..500u32 {
            let name = format!("item-{}", version % 10);
            let labels = [("version", version.to_string())];
            let labels: Vec<(&str, &str)> =
                labels.iter().map(|(k, v)| (*k, v.as_str())).collect();
            writer.apply_update(Arc::new(item("ns", &name, &labels).version(version)));
        }
        for reader in readers {
            reader.join().unwrap();
        }

        assert_eq!(store.len(), 10);
        for n in 0..10u32 {
            let stored = store
                .get(&CollectionKey::new("ns", format!("item-{n}")))
                .unwrap();
            assert_eq!(stored.version, 490 + n);
        }
    }

    #[test]
    fn test_key_display() {
        assert_eq!(CollectionKey::new("ns", "a").to_string(), "ns/a");
        assert_eq!(CollectionKey::cluster_scoped("node-1").to_string(), "node-1");
    }
}
