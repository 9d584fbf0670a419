// src/models/snapshot.rs

//! Snapshot of every release known as of one run.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::models::ReleaseRecord;

/// String-keyed map that keeps insertion order.
///
/// Serialized as a JSON object whose keys appear in insertion order, and
/// deserialized back in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedMap<V> {
    entries: Vec<(String, V)>,
    index: HashMap<String, usize>,
}

impl<V> OrderedMap<V> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Insert a value. An existing key keeps its position and gets the new value.
    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        match self.index.get(&key) {
            Some(&pos) => self.entries[pos].1 = value,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.index.get(key).map(|&pos| &self.entries[pos].1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V: Default> OrderedMap<V> {
    /// Get the value for `key`, inserting a default one at the end if missing.
    pub fn entry_or_default(&mut self, key: &str) -> &mut V {
        if !self.index.contains_key(key) {
            self.insert(key, V::default());
        }
        let pos = self.index[key];
        &mut self.entries[pos].1
    }
}

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderedMap<ReleaseRecord> {
    /// Source columns of a wiki section in header order, taken from its
    /// first record. Empty for listing sections.
    pub fn column_order(&self) -> Vec<String> {
        self.values()
            .next()
            .map(|r| r.columns.keys().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

struct OrderedMapVisitor<V>(PhantomData<V>);

impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedMapVisitor<V> {
    type Value = OrderedMap<V>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map with string keys")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut map = OrderedMap::new();
        while let Some((key, value)) = access.next_entry::<String, V>()? {
            map.insert(key, value);
        }
        Ok(map)
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(OrderedMapVisitor(PhantomData))
    }
}

/// All release records of one tracked project.
///
/// Maps a section key (`"{project}_{part}"` for API sources, the project
/// name for wiki sources) to that section's records, keyed by
/// [`ReleaseRecord::key`].
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    sections: OrderedMap<OrderedMap<ReleaseRecord>>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record to a section, creating the section on first use.
    pub fn insert(&mut self, section: &str, record: ReleaseRecord) {
        self.sections
            .entry_or_default(section)
            .insert(record.key(), record);
    }

    /// Make sure a section exists even if it ends up with no records.
    pub fn ensure_section(&mut self, section: &str) {
        self.sections.entry_or_default(section);
    }

    pub fn contains(&self, section: &str, key: &str) -> bool {
        self.sections
            .get(section)
            .is_some_and(|records| records.contains_key(key))
    }

    pub fn section(&self, section: &str) -> Option<&OrderedMap<ReleaseRecord>> {
        self.sections.get(section)
    }

    pub fn sections(&self) -> impl Iterator<Item = (&str, &OrderedMap<ReleaseRecord>)> {
        self.sections.iter()
    }

    /// Every record with its section, in snapshot order.
    pub fn records(&self) -> impl Iterator<Item = (&str, &ReleaseRecord)> {
        self.sections
            .iter()
            .flat_map(|(section, records)| records.values().map(move |r| (section, r)))
    }

    /// Total number of records across sections.
    pub fn len(&self) -> usize {
        self.sections.values().map(OrderedMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
