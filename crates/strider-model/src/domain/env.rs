use serde::{Deserialize, Serialize};

use crate::domain::constants::{ENV_INVOCATION_ID, ENV_SUBMITTER};

/// One variable of a container's environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvVar {
    key: String,
    value: String,
}

impl EnvVar {
    pub fn new<K, V>(key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// The `KEY=value` form handed to the engine.
    pub fn render(&self) -> String {
        format!("{}={}", self.key, self.value)
    }
}

/// Environment a container is started with.
///
/// The job description declares these per step, in order. The runner
/// appends to the list rather than replacing entries, and a repeated key
/// resolves to the latest entry, so runner-appended variables always beat
/// whatever the job declared.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Env(pub Vec<EnvVar>);

impl Env {
    /// Create an empty environment.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Value for `key`. The latest entry wins when the key repeats.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|var| var.key() == key)
            .map(|var| var.value())
    }

    /// Append a variable.
    pub fn push<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.0.push(EnvVar::new(key, value));
    }

    /// Iterate the variables in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &EnvVar> {
        self.0.iter()
    }

    /// Copy of this environment with the submitter and invocation id
    /// appended. Every step container gets these before it starts; cleanup
    /// and accounting downstream key off them.
    pub fn with_identity(&self, submitter: &str, invocation_id: &str) -> Env {
        let mut out = self.clone();
        out.push(ENV_SUBMITTER, submitter);
        out.push(ENV_INVOCATION_ID, invocation_id);
        out
    }
}
