//! Config documents
//!
//! An insertion-ordered mapping from keys to [`ConfigValue`]s. Both base
//! configs and sparse override documents use this type.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_yaml::{Mapping, Value as YamlValue};

use crate::error::ValueError;
use crate::path::OverridePath;
use crate::value::ConfigValue;

/// Ordered mapping of config keys to values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigDocument {
    entries: IndexMap<String, ConfigValue>,
}

impl ConfigDocument {
    /// Create an empty document
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a YAML document
    ///
    /// An empty or `null` document yields an empty mapping.
    ///
    /// # Errors
    /// Returns error if `text` is not YAML or its top level is not a mapping
    pub fn from_yaml_str(text: &str) -> Result<Self, ValueError> {
        let value: YamlValue = serde_yaml::from_str(text).map_err(ValueError::Yaml)?;
        match ConfigValue::from_yaml(value)? {
            ConfigValue::Null => Ok(Self::new()),
            ConfigValue::Map(doc) => Ok(doc),
            other => Err(ValueError::NotAMapping(other.type_name())),
        }
    }

    /// Serialize to YAML text
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_yaml_string(&self) -> Result<String, ValueError> {
        serde_yaml::to_string(&self.to_yaml_mapping()).map_err(ValueError::Yaml)
    }

    /// [`ConfigValue::same_value`] over every entry, ignoring key order
    #[must_use]
    pub fn same_entries(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .all(|(key, value)| other.entries.get(key).is_some_and(|v| value.same_value(v)))
    }

    /// Convert into a YAML mapping
    #[must_use]
    pub fn to_yaml_mapping(&self) -> Mapping {
        self.entries
            .iter()
            .map(|(k, v)| (YamlValue::String(k.clone()), v.to_yaml()))
            .collect()
    }

    /// Number of top-level keys
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if there are no keys
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Top-level entries in insertion order
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ConfigValue)> {
        self.entries.iter()
    }

    /// Top-level value for `key`
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.entries.get(key)
    }

    /// Insert or replace a top-level value, keeping the original position
    #[inline]
    pub fn insert(&mut self, key: impl Into<String>, value: ConfigValue) -> Option<ConfigValue> {
        self.entries.insert(key.into(), value)
    }

    /// Remove a top-level value, keeping the order of the rest
    #[inline]
    pub fn remove(&mut self, key: &str) -> Option<ConfigValue> {
        self.entries.shift_remove(key)
    }

    /// Value at `path`
    ///
    /// Every key except the last must resolve to a nested document; walking
    /// through a scalar or list yields `None`.
    #[must_use]
    pub fn get_path(&self, path: &OverridePath) -> Option<&ConfigValue> {
        let mut current = self;
        for key in path.parents() {
            current = current.get(key)?.as_map()?;
        }
        current.get(path.last())
    }

    /// Set value at `path`, creating intermediate groups
    ///
    /// An intermediate key holding a non-group value is replaced by a group.
    pub fn set_path(&mut self, path: &OverridePath, value: ConfigValue) {
        let mut current = self;
        for key in path.parents() {
            let slot = current
                .entries
                .entry(key.clone())
                .or_insert_with(|| ConfigValue::Map(Self::new()));
            if slot.as_map().is_none() {
                *slot = ConfigValue::Map(Self::new());
            }
            current = match slot.as_map_mut() {
                Some(doc) => doc,
                None => return,
            };
        }
        current.insert(path.last(), value);
    }

    /// Remove the value at `path`, dropping groups that become empty
    pub fn remove_path(&mut self, path: &OverridePath) -> Option<ConfigValue> {
        remove_in(self, path.segments())
    }

    /// All non-group leaves with their paths, depth-first in document order
    #[must_use]
    pub fn leaves(&self) -> Vec<(OverridePath, &ConfigValue)> {
        let mut out = Vec::new();
        collect_leaves(self, &[], &mut out);
        out
    }
}

fn remove_in(doc: &mut ConfigDocument, segments: &[String]) -> Option<ConfigValue> {
    let (first, rest) = segments.split_first()?;
    if rest.is_empty() {
        return doc.remove(first);
    }
    let child = doc.entries.get_mut(first)?.as_map_mut()?;
    let removed = remove_in(child, rest);
    if removed.is_some() && child.is_empty() {
        doc.remove(first);
    }
    removed
}

fn collect_leaves<'a>(
    doc: &'a ConfigDocument,
    prefix: &[String],
    out: &mut Vec<(OverridePath, &'a ConfigValue)>,
) {
    for (key, value) in doc.iter() {
        let mut segments = prefix.to_vec();
        segments.push(key.clone());
        match value {
            ConfigValue::Map(child) => collect_leaves(child, &segments, out),
            leaf => {
                if let Ok(path) = OverridePath::new(segments) {
                    out.push((path, leaf));
                }
            }
        }
    }
}

impl FromIterator<(String, ConfigValue)> for ConfigDocument {
    fn from_iter<I: IntoIterator<Item = (String, ConfigValue)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl Serialize for ConfigDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ConfigDocument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match ConfigValue::deserialize(deserializer)? {
            ConfigValue::Null => Ok(Self::new()),
            ConfigValue::Map(doc) => Ok(doc),
            other => Err(serde::de::Error::custom(ValueError::NotAMapping(
                other.type_name(),
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> OverridePath {
        s.parse().unwrap()
    }

    #[test]
    fn parse_keeps_insertion_order() {
        let doc = ConfigDocument::from_yaml_str("zeta: 1\nalpha: 2\nmid: 3\n").unwrap();
        let keys: Vec<_> = doc.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn empty_text_is_empty_document() {
        assert!(ConfigDocument::from_yaml_str("").unwrap().is_empty());
        assert!(ConfigDocument::from_yaml_str("~").unwrap().is_empty());
    }

    #[test]
    fn scalar_top_level_is_rejected() {
        let err = ConfigDocument::from_yaml_str("- a\n- b\n").unwrap_err();
        assert!(matches!(err, ValueError::NotAMapping("list")));
    }

    #[test]
    fn get_path_walks_groups_only() {
        let doc = ConfigDocument::from_yaml_str("a:\n  b: 1\n  l: [1, 2]\ns: x\n").unwrap();
        assert_eq!(doc.get_path(&path("a.b")), Some(&ConfigValue::Int(1)));
        assert_eq!(doc.get_path(&path("s.x")), None);
        assert_eq!(doc.get_path(&path("a.l.0")), None);
        assert_eq!(doc.get_path(&path("a.missing")), None);
    }

    #[test]
    fn set_path_creates_groups() {
        let mut doc = ConfigDocument::new();
        doc.set_path(&path("trainer.optim.lr"), ConfigValue::Float(0.1));
        assert_eq!(
            doc.get_path(&path("trainer.optim.lr")),
            Some(&ConfigValue::Float(0.1))
        );
    }

    #[test]
    fn set_path_replaces_scalar_parent() {
        let mut doc = ConfigDocument::from_yaml_str("a: 3\n").unwrap();
        doc.set_path(&path("a.b"), ConfigValue::Bool(true));
        assert_eq!(doc.get_path(&path("a.b")), Some(&ConfigValue::Bool(true)));
    }

    #[test]
    fn remove_path_prunes_empty_groups() {
        let mut doc = ConfigDocument::from_yaml_str("a:\n  b:\n    c: 1\nd: 2\n").unwrap();
        assert_eq!(doc.remove_path(&path("a.b.c")), Some(ConfigValue::Int(1)));
        assert!(doc.get("a").is_none());
        assert_eq!(doc.len(), 1);
    }

    #[test]
    fn leaves_are_depth_first() {
        let doc = ConfigDocument::from_yaml_str("a:\n  b: 1\n  c: [1]\nd: x\n").unwrap();
        let paths: Vec<_> = doc.leaves().into_iter().map(|(p, _)| p.to_string()).collect();
        assert_eq!(paths, vec!["a.b", "a.c", "d"]);
    }

    #[test]
    fn yaml_round_trip() {
        let text = "model:\n  lr: 0.001\n  layers:\n  - 64\n  - 128\nflag: false\n";
        let doc = ConfigDocument::from_yaml_str(text).unwrap();
        let again = ConfigDocument::from_yaml_str(&doc.to_yaml_string().unwrap()).unwrap();
        assert_eq!(doc, again);
    }
}
