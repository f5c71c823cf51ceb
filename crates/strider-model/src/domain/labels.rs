use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::constants::{LABEL_CONTAINER_TYPE, LABEL_INVOCATION};
use crate::ContainerType;

/// Structured key–value metadata applied to containers, images, and volumes.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Labels(pub BTreeMap<String, String>);

impl Labels {
    /// Create an empty set of labels.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Create the label set every job-owned entity must carry: the
    /// invocation identity plus the container-type discriminant.
    pub fn for_invocation(invocation_id: &str, kind: ContainerType) -> Self {
        let mut labels = Self::new();
        labels.insert(LABEL_INVOCATION, invocation_id);
        labels.insert(LABEL_CONTAINER_TYPE, kind.label_value());
        labels
    }

    /// Returns `true` if no labels are present.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Insert or overwrite a label.
    ///
    /// Returns `self` for chaining.
    pub fn insert<K, V>(&mut self, key: K, val: V) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.0.insert(key.into(), val.into());
        self
    }

    /// Get the value for a key, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|s| s.as_str())
    }

    /// Iterate through all labels as `(&str, &str)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
