//! Nested external data.
//!
//! The exchange shape used by the dict bridge: what a form submission or a
//! deserialized JSON body looks like once normalized. Maps keep their keys
//! sorted so every traversal of the same data is deterministic.

use std::collections::BTreeMap;

/// One value of the nested data shape.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DictValue {
    /// Explicit absence; used as a gap filler in sequences.
    #[default]
    Null,
    Text(String),
    Seq(Vec<DictValue>),
    Map(DictMap),
}

impl DictValue {
    pub fn text(value: &str) -> Self {
        Self::Text(value.to_string())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&DictMap> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[DictValue]> {
        match self {
            Self::Seq(seq) => Some(seq.as_slice()),
            _ => None,
        }
    }
}

/// A string-keyed map with sorted iteration order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DictMap {
    entries: BTreeMap<String, DictValue>,
}

impl DictMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: DictValue) {
        self.entries.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&DictValue> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut DictValue> {
        self.entries.get_mut(key)
    }

    pub fn entry_or_null(&mut self, key: &str) -> &mut DictValue {
        self.entries.entry(key.to_string()).or_default()
    }

    pub fn remove(&mut self, key: &str) -> Option<DictValue> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter_sorted(&self) -> impl Iterator<Item = (&str, &DictValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl FromIterator<(String, DictValue)> for DictMap {
    fn from_iter<I: IntoIterator<Item = (String, DictValue)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl From<DictMap> for DictValue {
    fn from(map: DictMap) -> Self {
        Self::Map(map)
    }
}
