//! Attribute maps and the reserved-key renaming policy

use serde::Serialize;
use serde_json::Value;
use std::collections::btree_map;
use std::collections::BTreeMap;

/// Prefix applied to user keys that collide with a backend-populated field.
pub const CUSTOM_PREFIX: &str = "custom_";

/// String-keyed attribute map attached to log entries.
///
/// Backed by a `BTreeMap` so that rendering order is stable across runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, Value>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, replacing any previous value stored under `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.0.iter()
    }

    /// Render as `key=value` tokens, strings unquoted.
    pub fn tokens(&self) -> impl Iterator<Item = String> + '_ {
        self.0
            .iter()
            .map(|(k, v)| format!("{}={}", k, display_value(v)))
    }
}

impl<'a> IntoIterator for &'a Attributes {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Format a value the way a human expects to read it: strings without quotes.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Keys a backend populates on its own, per kind of entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservedKeys {
    /// Keys reserved in child (trace) log attributes.
    pub attributes: &'static [&'static str],
    /// Keys reserved in parent (request) log attributes.
    pub request: &'static [&'static str],
}

impl ReservedKeys {
    pub const NONE: ReservedKeys = ReservedKeys {
        attributes: &[],
        request: &[],
    };

    pub const fn new(
        attributes: &'static [&'static str],
        request: &'static [&'static str],
    ) -> Self {
        Self {
            attributes,
            request,
        }
    }

    /// Storage key for a child attribute.
    pub fn attribute_key(&self, key: &str) -> String {
        rename_reserved(self.attributes, key)
    }

    /// Storage key for a request attribute.
    pub fn request_key(&self, key: &str) -> String {
        rename_reserved(self.request, key)
    }
}

/// Prefix `key` with [`CUSTOM_PREFIX`] when it appears in `reserved`.
pub fn rename_reserved(reserved: &[&str], key: &str) -> String {
    if reserved.contains(&key) {
        format!("{}{}", CUSTOM_PREFIX, key)
    } else {
        key.to_string()
    }
}
