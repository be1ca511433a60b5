use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::str::FromStr;

use crate::Error;

/// Equality-based label selector. An item matches when every required label
/// is present on it with the same value, i.e. the selector is a subset of the
/// item's labels.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Selector(BTreeMap<String, String>);

impl Selector {
    /// Selector matching every item.
    pub fn everything() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        for (key, value) in self.0.iter() {
            if labels.get(key) != Some(value) {
                return false;
            }
        }
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }
}

impl From<BTreeMap<String, String>> for Selector {
    fn from(labels: BTreeMap<String, String>) -> Self {
        Self(labels)
    }
}

impl<K, V> FromIterator<(K, V)> for Selector
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl FromStr for Selector {
    type Err = Error;

    /// Parses `key=value` pairs separated by commas. Blank input selects
    /// everything.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut labels = BTreeMap::new();
        for pair in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let Some((key, value)) = pair.split_once('=') else {
                return Err(Error::InvalidSelector(format!(
                    "expected key=value, found {pair}"
                )));
            };
            let key = key.trim();
            if key.is_empty() {
                return Err(Error::InvalidSelector(format!("empty key in {pair}")));
            }
            labels.insert(key.to_string(), value.trim().to_string());
        }
        Ok(Self(labels))
    }
}

impl Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pairs: Vec<String> = self.0.iter().map(|(k, v)| format!("{k}={v}")).collect();
        write!(f, "{}", pairs.join(","))
    }
}
