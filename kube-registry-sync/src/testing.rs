use std::collections::BTreeMap;

use crate::query::Related;
use crate::store::{CollectionKey, MirroredItem};

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct TestItem {
    pub key: CollectionKey,
    pub labels: BTreeMap<String, String>,
    pub version: u32,
    pub refs: Vec<CollectionKey>,
}

impl TestItem {
    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn refs(mut self, refs: &[(&str, &str)]) -> Self {
        self.refs = refs
            .iter()
            .map(|(ns, name)| CollectionKey::new(*ns, *name))
            .collect();
        self
    }
}

impl MirroredItem for TestItem {
    fn key(&self) -> CollectionKey {
        self.key.clone()
    }

    fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }
}

impl Related for TestItem {
    type Detail<'a> = usize;

    fn sub_relations(&self) -> Vec<(CollectionKey, usize)> {
        self.refs
            .iter()
            .enumerate()
            .map(|(i, key)| (key.clone(), i))
            .collect()
    }
}

pub(crate) fn item(namespace: &str, name: &str, labels: &[(&str, &str)]) -> TestItem {
    TestItem {
        key: CollectionKey::new(namespace, name),
        labels: labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        version: 0,
        refs: Vec::new(),
    }
}
