//! Field reflection
//!
//! Walks a base document depth-first and produces one [`FieldDescriptor`] per
//! leaf, showing the cached override where there is a usable one.

use tracing::debug;

use crate::document::ConfigDocument;
use crate::field::{FieldDescriptor, FieldKind, FieldSet};
use crate::merge::effective_value;
use crate::path::OverridePath;
use crate::value::ConfigValue;

/// Keys that are composition directives of the config system, not parameters
pub const RESERVED_KEYS: [&str; 2] = ["defaults", "_self_"];

/// Build the editable fields of `base`, showing values from `overrides`
#[must_use]
pub fn reflect(base: &ConfigDocument, overrides: &ConfigDocument) -> FieldSet {
    let mut fields = Vec::new();
    walk(base, base, overrides, &[], &mut fields);
    FieldSet::new(fields)
}

/// Kind of a field whose default is `value`; `None` for groups
///
/// Booleans are matched before numbers so they never become `int`.
#[must_use]
pub fn classify(value: &ConfigValue) -> Option<FieldKind> {
    match value {
        ConfigValue::Map(_) => None,
        ConfigValue::List(_) => Some(FieldKind::List),
        ConfigValue::Bool(_) => Some(FieldKind::Bool),
        ConfigValue::Float(_) => Some(FieldKind::Float),
        ConfigValue::Int(_) => Some(FieldKind::Int),
        ConfigValue::Str(_) | ConfigValue::Null => Some(FieldKind::Str),
    }
}

fn walk(
    root: &ConfigDocument,
    doc: &ConfigDocument,
    overrides: &ConfigDocument,
    prefix: &[String],
    out: &mut Vec<FieldDescriptor>,
) {
    for (key, value) in doc.iter() {
        if RESERVED_KEYS.contains(&key.as_str()) {
            continue;
        }
        let mut segments = prefix.to_vec();
        segments.push(key.clone());

        let Some(kind) = classify(value) else {
            if let ConfigValue::Map(child) = value {
                walk(root, child, overrides, &segments, out);
            }
            continue;
        };
        let Ok(path) = OverridePath::new(segments) else {
            continue;
        };

        let current = match effective_value(root, overrides, &path) {
            Some(cached) if FieldDescriptor::accepts(kind, cached) => cached,
            Some(cached) => {
                debug!(
                    %path,
                    expected = %kind,
                    found = cached.type_name(),
                    "ignoring cached override of the wrong kind"
                );
                value
            }
            None => value,
        };
        out.push(FieldDescriptor::new(path, kind, value.clone(), current));
    }
}
