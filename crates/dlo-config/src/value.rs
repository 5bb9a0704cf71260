//! Config values
//!
//! [`ConfigValue`] is the tagged union every leaf and group of a config
//! document is made of. YAML is only the storage format: values are converted
//! from `serde_yaml::Value` once at load time.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_yaml::Value as YamlValue;

use crate::document::ConfigDocument;
use crate::error::ValueError;

/// A value in a hierarchical config document
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    /// YAML `~` / `null`
    Null,
    /// Boolean
    Bool(bool),
    /// Integer literal
    Int(i64),
    /// Floating-point literal
    Float(f64),
    /// String
    Str(String),
    /// Ordered sequence
    List(Vec<ConfigValue>),
    /// Nested group
    Map(ConfigDocument),
}

impl ConfigValue {
    /// Short type name used in logs and listings
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    /// Nested group, if this is one
    #[inline]
    #[must_use]
    pub fn as_map(&self) -> Option<&ConfigDocument> {
        match self {
            Self::Map(doc) => Some(doc),
            _ => None,
        }
    }

    /// Mutable nested group, if this is one
    #[inline]
    pub fn as_map_mut(&mut self) -> Option<&mut ConfigDocument> {
        match self {
            Self::Map(doc) => Some(doc),
            _ => None,
        }
    }

    /// Convert a parsed YAML value
    ///
    /// Tags are dropped; mapping keys must be scalars and are stringified.
    ///
    /// # Errors
    /// Returns error on a non-scalar mapping key
    pub fn from_yaml(value: YamlValue) -> Result<Self, ValueError> {
        Ok(match value {
            YamlValue::Null => Self::Null,
            YamlValue::Bool(b) => Self::Bool(b),
            YamlValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else {
                    // u64 beyond i64::MAX and real floats both land here
                    Self::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            YamlValue::String(s) => Self::Str(s),
            YamlValue::Sequence(seq) => Self::List(
                seq.into_iter()
                    .map(Self::from_yaml)
                    .collect::<Result<_, _>>()?,
            ),
            YamlValue::Mapping(map) => {
                let mut doc = ConfigDocument::new();
                for (key, val) in map {
                    doc.insert(yaml_key(key)?, Self::from_yaml(val)?);
                }
                Self::Map(doc)
            }
            YamlValue::Tagged(tagged) => Self::from_yaml(tagged.value)?,
        })
    }

    /// Convert back into a YAML value for writing
    #[must_use]
    pub fn to_yaml(&self) -> YamlValue {
        match self {
            Self::Null => YamlValue::Null,
            Self::Bool(b) => YamlValue::Bool(*b),
            Self::Int(i) => YamlValue::Number((*i).into()),
            Self::Float(f) => YamlValue::Number((*f).into()),
            Self::Str(s) => YamlValue::String(s.clone()),
            Self::List(items) => YamlValue::Sequence(items.iter().map(Self::to_yaml).collect()),
            Self::Map(doc) => YamlValue::Mapping(doc.to_yaml_mapping()),
        }
    }

    /// Parse a single YAML scalar or flow collection
    ///
    /// # Errors
    /// Returns error if `text` is not valid YAML
    pub fn parse_yaml(text: &str) -> Result<Self, ValueError> {
        let value: YamlValue = serde_yaml::from_str(text).map_err(ValueError::Yaml)?;
        Self::from_yaml(value)
    }

    /// Equality under which every NaN equals every other NaN
    ///
    /// Used to decide whether an edited value still matches its default; the
    /// derived `PartialEq` follows `f64` and never matches a `.nan` leaf.
    #[must_use]
    pub fn same_value(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Float(a), Self::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Self::List(a), Self::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_value(y))
            }
            (Self::Map(a), Self::Map(b)) => a.same_entries(b),
            _ => self == other,
        }
    }

    /// Render as the right-hand side of a `key=value` command-line override
    ///
    /// Strings are emitted verbatim; collections use YAML flow syntax.
    #[must_use]
    pub fn to_arg(&self) -> String {
        match self {
            Self::Str(s) => s.clone(),
            other => other.to_flow(),
        }
    }

    /// Render in YAML flow syntax so that parsing the text yields `self` again
    #[must_use]
    pub fn to_flow(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => format_float(*f),
            Self::Str(s) => flow_string(s),
            Self::List(items) => {
                let parts: Vec<_> = items.iter().map(Self::to_flow).collect();
                format!("[{}]", parts.join(", "))
            }
            Self::Map(doc) => {
                let parts: Vec<_> = doc
                    .iter()
                    .map(|(k, v)| format!("{}: {}", flow_string(k), v.to_flow()))
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
        }
    }
}

impl Display for ConfigValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_arg())
    }
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for ConfigValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for ConfigValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<ConfigDocument> for ConfigValue {
    fn from(doc: ConfigDocument) -> Self {
        Self::Map(doc)
    }
}

impl<T: Into<ConfigValue>> From<Vec<T>> for ConfigValue {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl Serialize for ConfigValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::Str(s) => serializer.serialize_str(s),
            Self::List(items) => items.serialize(serializer),
            Self::Map(doc) => doc.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ConfigValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = YamlValue::deserialize(deserializer)?;
        Self::from_yaml(value).map_err(serde::de::Error::custom)
    }
}

fn yaml_key(key: YamlValue) -> Result<String, ValueError> {
    match key {
        YamlValue::String(s) => Ok(s),
        YamlValue::Bool(b) => Ok(b.to_string()),
        YamlValue::Number(n) => Ok(n.to_string()),
        YamlValue::Null => Ok("null".to_string()),
        YamlValue::Tagged(tagged) => yaml_key(tagged.value),
        other => Err(ValueError::UnsupportedKey(format!("{other:?}"))),
    }
}

/// Float text that keeps its float-ness when read back (`1.0`, not `1`)
fn format_float(f: f64) -> String {
    if f.is_nan() {
        ".nan".to_string()
    } else if f == f64::INFINITY {
        ".inf".to_string()
    } else if f == f64::NEG_INFINITY {
        "-.inf".to_string()
    } else {
        format!("{f:?}")
    }
}

/// Plain string when YAML reads it back as the same string, quoted otherwise
fn flow_string(s: &str) -> String {
    let plain_ok = !s.is_empty()
        && !s.contains([',', ':', '[', ']', '{', '}', '#', '"', '\''])
        && s.trim() == s
        && matches!(
            serde_yaml::from_str::<YamlValue>(s),
            Ok(YamlValue::String(ref parsed)) if parsed == s
        );
    if plain_ok {
        s.to_string()
    } else {
        let escaped = s
            .replace('\\', "\\\\")
            .replace('"', "\\\"")
            .replace('\n', "\\n")
            .replace('\t', "\\t");
        format!("\"{escaped}\"")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_scalars_classify() {
        assert_eq!(ConfigValue::parse_yaml("true").unwrap(), ConfigValue::Bool(true));
        assert_eq!(ConfigValue::parse_yaml("3").unwrap(), ConfigValue::Int(3));
        assert_eq!(ConfigValue::parse_yaml("3.0").unwrap(), ConfigValue::Float(3.0));
        assert_eq!(ConfigValue::parse_yaml("1e-4").unwrap(), ConfigValue::Float(1e-4));
        assert_eq!(ConfigValue::parse_yaml("~").unwrap(), ConfigValue::Null);
        assert_eq!(
            ConfigValue::parse_yaml("cuda:0").unwrap(),
            ConfigValue::Str("cuda:0".into())
        );
    }

    #[test]
    fn numeric_mapping_keys_are_stringified() {
        let value = ConfigValue::parse_yaml("{1: a, true: b}").unwrap();
        let doc = value.as_map().unwrap();
        assert_eq!(doc.get("1"), Some(&ConfigValue::from("a")));
        assert_eq!(doc.get("true"), Some(&ConfigValue::from("b")));
    }

    #[test]
    fn sequence_key_is_rejected() {
        let err = ConfigValue::parse_yaml("? [a, b]\n: c\n").unwrap_err();
        assert!(matches!(err, ValueError::UnsupportedKey(_)));
    }

    #[test]
    fn float_flow_keeps_fraction() {
        assert_eq!(ConfigValue::Float(1.0).to_flow(), "1.0");
        assert_eq!(ConfigValue::Float(0.25).to_flow(), "0.25");
        assert_eq!(ConfigValue::Float(f64::INFINITY).to_flow(), ".inf");
    }

    #[test]
    fn ambiguous_strings_are_quoted() {
        assert_eq!(ConfigValue::from("true").to_flow(), "\"true\"");
        assert_eq!(ConfigValue::from("42").to_flow(), "\"42\"");
        assert_eq!(ConfigValue::from("a, b").to_flow(), "\"a, b\"");
        assert_eq!(ConfigValue::from("").to_flow(), "\"\"");
        assert_eq!(ConfigValue::from("adam").to_flow(), "adam");
    }

    #[test]
    fn flow_text_parses_back() {
        let value = ConfigValue::from(vec![
            ConfigValue::Int(1),
            ConfigValue::Float(2.0),
            ConfigValue::from("yes"),
            ConfigValue::from("x y"),
        ]);
        assert_eq!(ConfigValue::parse_yaml(&value.to_flow()).unwrap(), value);
    }

    #[test]
    fn arg_rendering() {
        assert_eq!(ConfigValue::from("resnet").to_arg(), "resnet");
        assert_eq!(ConfigValue::from(vec![1_i64, 2, 4]).to_arg(), "[1, 2, 4]");
        assert_eq!(ConfigValue::Bool(false).to_arg(), "false");
    }

    #[test]
    fn nan_is_the_same_value_as_nan() {
        let nan = ConfigValue::Float(f64::NAN);
        assert!(nan.same_value(&ConfigValue::Float(f64::NAN)));
        assert!(!nan.same_value(&ConfigValue::Float(0.0)));
        assert!(ConfigValue::List(vec![nan.clone()]).same_value(&ConfigValue::List(vec![nan])));
        assert!(!ConfigValue::Int(1).same_value(&ConfigValue::Float(1.0)));
        assert!(ConfigValue::Float(f64::INFINITY).same_value(&ConfigValue::Float(f64::INFINITY)));
    }
}
