//! In-memory mapping state of one simulated device.
//!
//! A [`MappingSet`] maps a destination port address to a [`MappingValue`].
//! On disk each value is a plain string; a string containing
//! [`EXCEPTION_MARKER`] (case-insensitive) marks the port as faulted instead
//! of naming a peer port.

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Marker token that flags a stored value as a simulated port fault.
pub const EXCEPTION_MARKER: &str = "except";

/// A stored mapping value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MappingValue {
    /// Normal mapping to a peer port address.
    Port(String),
    /// Fault-injected port; holds the full stored marker text.
    Exception(String),
}

impl MappingValue {
    /// Creates a normal mapping to `address`.
    pub fn port(address: impl Into<String>) -> Self {
        Self::Port(address.into())
    }

    /// Parses a raw stored string, detecting the exception marker.
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        if raw.to_lowercase().contains(EXCEPTION_MARKER) {
            Self::Exception(raw)
        } else {
            Self::Port(raw)
        }
    }

    /// Returns the raw stored text.
    pub fn as_str(&self) -> &str {
        match self {
            MappingValue::Port(s) | MappingValue::Exception(s) => s,
        }
    }

    /// Returns the peer port address for a normal mapping.
    pub fn as_port(&self) -> Option<&str> {
        match self {
            MappingValue::Port(addr) => Some(addr),
            MappingValue::Exception(_) => None,
        }
    }

    /// Returns true if this value carries the exception marker.
    pub fn is_exception(&self) -> bool {
        matches!(self, MappingValue::Exception(_))
    }
}

impl From<String> for MappingValue {
    fn from(raw: String) -> Self {
        Self::parse(raw)
    }
}

impl From<MappingValue> for String {
    fn from(value: MappingValue) -> Self {
        match value {
            MappingValue::Port(s) | MappingValue::Exception(s) => s,
        }
    }
}

impl fmt::Display for MappingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full connection table of one device: destination port -> value.
///
/// Bidirectional links are stored as two entries (`A -> B`, `B -> A`);
/// unidirectional and tap links as one entry per destination pointing at the
/// source. Keys are kept sorted so the serialized file is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MappingSet {
    entries: BTreeMap<String, MappingValue>,
}

impl MappingSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value stored for `port`.
    pub fn get(&self, port: &str) -> Option<&MappingValue> {
        self.entries.get(port)
    }

    /// Returns the peer stored for `port`, ignoring exception values.
    pub fn peer_of(&self, port: &str) -> Option<&str> {
        self.entries.get(port).and_then(MappingValue::as_port)
    }

    /// Inserts or replaces the value for `port`, returning the old value.
    pub fn insert(&mut self, port: impl Into<String>, value: MappingValue) -> Option<MappingValue> {
        self.entries.insert(port.into(), value)
    }

    /// Removes `port`, returning its value if present.
    pub fn remove(&mut self, port: &str) -> Option<MappingValue> {
        self.entries.remove(port)
    }

    /// Returns the stored marker text if `port` is exception-marked.
    pub fn exception_for(&self, port: &str) -> Option<&str> {
        match self.entries.get(port) {
            Some(MappingValue::Exception(marker)) => Some(marker),
            _ => None,
        }
    }

    /// Returns every key whose entry involves `port`, either as the key
    /// itself or as the stored value.
    pub fn keys_referencing(&self, port: &str) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(k, v)| k.as_str() == port || v.as_str() == port)
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is mapped.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in key order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, MappingValue> {
        self.entries.iter()
    }
}

impl<K, V> FromIterator<(K, V)> for MappingSet
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), MappingValue::parse(v)))
                .collect(),
        }
    }
}

impl<'a> IntoIterator for &'a MappingSet {
    type Item = (&'a String, &'a MappingValue);
    type IntoIter = btree_map::Iter<'a, String, MappingValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
