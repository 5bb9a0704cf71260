//! Override extraction
//!
//! Turns edited fields back into a sparse override document holding only the
//! paths whose value differs from the default.

use tracing::debug;

use crate::document::ConfigDocument;
use crate::field::{FieldKind, FieldSet, FieldState};
use crate::value::ConfigValue;

/// Sparse document of every field whose current value differs from its default
///
/// Values are typed by the field kind. List text that does not parse is kept
/// verbatim as a string and therefore always counts as changed.
#[must_use]
pub fn extract(fields: &FieldSet) -> ConfigDocument {
    let mut overrides = ConfigDocument::new();
    for field in fields {
        let value = field.current_value();
        if !value.same_value(field.default_value()) {
            debug!(path = %field.path(), value = %value, "override differs from default");
            overrides.set_path(field.path(), value);
        }
    }
    overrides
}

/// Read an editor state back as a value of `kind`
pub(crate) fn parse_state(kind: FieldKind, default: &ConfigValue, state: &FieldState) -> ConfigValue {
    match (kind, state) {
        (FieldKind::Bool, FieldState::Bool(b)) => ConfigValue::Bool(*b),
        (FieldKind::Int, FieldState::Int(i)) => ConfigValue::Int(*i),
        (FieldKind::Float, FieldState::Float(f)) => ConfigValue::Float(*f),
        (FieldKind::Str, FieldState::Text(text)) => {
            if text.is_empty() && matches!(default, ConfigValue::Null) {
                ConfigValue::Null
            } else {
                ConfigValue::Str(text.clone())
            }
        }
        (FieldKind::List, FieldState::Text(text)) => parse_list_text(text),
        // setters keep state and kind in step
        _ => default.clone(),
    }
}

/// Read comma-separated text as a flow sequence, keeping the raw text on failure
#[must_use]
pub fn parse_list_text(text: &str) -> ConfigValue {
    match ConfigValue::parse_yaml(&format!("[{text}]")) {
        Ok(list @ ConfigValue::List(_)) => list,
        Ok(other) => {
            debug!(text, parsed = other.type_name(), "list text did not parse as a sequence");
            ConfigValue::Str(text.to_string())
        }
        Err(err) => {
            debug!(text, error = %err, "keeping unparsable list text verbatim");
            ConfigValue::Str(text.to_string())
        }
    }
}
