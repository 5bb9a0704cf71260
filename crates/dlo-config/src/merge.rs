//! Override resolution
//!
//! Overrides win over base values. Lookups use presence, never truthiness:
//! an override of `false`, `0` or `""` is still an override.

use crate::document::ConfigDocument;
use crate::path::OverridePath;
use crate::value::ConfigValue;

/// Override value at `path`, or `None` when the caller should fall back to `base`
///
/// `base` is accepted so call sites read as "effective value of `path` given
/// `base` and `overrides`"; only `overrides` is consulted.
#[inline]
#[must_use]
pub fn effective_value<'a>(
    _base: &ConfigDocument,
    overrides: &'a ConfigDocument,
    path: &OverridePath,
) -> Option<&'a ConfigValue> {
    overrides.get_path(path)
}

/// Override value at `path` if present, else the base value
#[inline]
#[must_use]
pub fn resolve<'a>(
    base: &'a ConfigDocument,
    overrides: &'a ConfigDocument,
    path: &OverridePath,
) -> Option<&'a ConfigValue> {
    effective_value(base, overrides, path).or_else(|| base.get_path(path))
}

/// Deep-merge `overrides` onto `base`
///
/// Groups merge key by key; any other override value replaces the base
/// value wholesale (lists are not concatenated).
#[must_use]
pub fn merge(base: &ConfigDocument, overrides: &ConfigDocument) -> ConfigDocument {
    let mut result = base.clone();
    for (key, value) in overrides.iter() {
        let merged = match (result.get(key), value) {
            (Some(ConfigValue::Map(base_child)), ConfigValue::Map(override_child)) => {
                ConfigValue::Map(merge(base_child, override_child))
            }
            (_, override_value) => override_value.clone(),
        };
        result.insert(key.clone(), merged);
    }
    result
}
