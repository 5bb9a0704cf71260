//! Editable fields
//!
//! A [`FieldDescriptor`] is produced for every leaf of a base config by
//! [`reflect`](crate::reflect::reflect). It carries the leaf's path, its kind
//! (derived from the default, never from override data), the default value
//! and the editable state a user mutates.

use std::fmt::{self, Display, Formatter};

use crate::error::FieldEditError;
use crate::extract;
use crate::path::OverridePath;
use crate::value::ConfigValue;

/// Largest magnitude an integer editor accepts
pub const INT_EDIT_BOUND: i64 = 2_147_483_647;

/// Largest magnitude a float editor accepts
pub const FLOAT_EDIT_BOUND: f64 = 1e10;

/// Decimal digits a float editor keeps
pub const FLOAT_EDIT_DECIMALS: i32 = 6;

/// Kind of an editable leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Checkbox-like boolean
    Bool,
    /// Integer
    Int,
    /// Floating point
    Float,
    /// Free text (also used for null leaves)
    Str,
    /// Comma-separated list of scalars
    List,
}

impl FieldKind {
    /// Lowercase name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Str => "str",
            Self::List => "list",
        }
    }
}

impl Display for FieldKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the user is currently editing
#[derive(Debug, Clone, PartialEq)]
pub enum FieldState {
    /// Boolean toggle
    Bool(bool),
    /// Integer spin box
    Int(i64),
    /// Float spin box
    Float(f64),
    /// Text box (str and list fields)
    Text(String),
}

impl Display for FieldState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => f.write_str(&ConfigValue::Float(*x).to_flow()),
            Self::Text(t) => f.write_str(t),
        }
    }
}

/// One editable leaf of a config document
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    path: OverridePath,
    kind: FieldKind,
    default: ConfigValue,
    state: FieldState,
}

impl FieldDescriptor {
    /// Create a field whose state shows `current`
    ///
    /// `current` must already be kind-compatible; see [`FieldDescriptor::accepts`].
    pub(crate) fn new(
        path: OverridePath,
        kind: FieldKind,
        default: ConfigValue,
        current: &ConfigValue,
    ) -> Self {
        let state = state_for(kind, current);
        Self {
            path,
            kind,
            default,
            state,
        }
    }

    /// Whether an override `value` can be shown in a field of `kind`
    ///
    /// A null override is never shown: a str field displays null as empty
    /// text, which would read back as `""` on a non-null default.
    #[must_use]
    pub fn accepts(kind: FieldKind, value: &ConfigValue) -> bool {
        matches!(
            (kind, value),
            (FieldKind::Bool, ConfigValue::Bool(_))
                | (FieldKind::Int, ConfigValue::Int(_))
                | (FieldKind::Float, ConfigValue::Float(_) | ConfigValue::Int(_))
                | (FieldKind::Str, ConfigValue::Str(_))
                | (FieldKind::List, ConfigValue::List(_) | ConfigValue::Str(_))
        )
    }

    /// Location in the document
    #[inline]
    #[must_use]
    pub fn path(&self) -> &OverridePath {
        &self.path
    }

    /// Kind, derived from the default
    #[inline]
    #[must_use]
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Value from the base config
    #[inline]
    #[must_use]
    pub fn default_value(&self) -> &ConfigValue {
        &self.default
    }

    /// Editable state
    #[inline]
    #[must_use]
    pub fn state(&self) -> &FieldState {
        &self.state
    }

    /// State read back as a typed value
    #[must_use]
    pub fn current_value(&self) -> ConfigValue {
        extract::parse_state(self.kind, &self.default, &self.state)
    }

    /// True if the current value differs from the default
    #[must_use]
    pub fn is_modified(&self) -> bool {
        !self.current_value().same_value(&self.default)
    }

    /// Put the default back into the editor
    pub fn reset(&mut self) {
        self.state = state_for(self.kind, &self.default);
    }

    /// Set a bool field
    ///
    /// # Errors
    /// Returns error if this is not a bool field
    pub fn set_bool(&mut self, value: bool) -> Result<(), FieldEditError> {
        self.expect_kind(FieldKind::Bool)?;
        self.state = FieldState::Bool(value);
        Ok(())
    }

    /// Set an int field, clamped to the editor bounds
    ///
    /// # Errors
    /// Returns error if this is not an int field
    pub fn set_int(&mut self, value: i64) -> Result<(), FieldEditError> {
        self.expect_kind(FieldKind::Int)?;
        self.state = FieldState::Int(value.clamp(-INT_EDIT_BOUND, INT_EDIT_BOUND));
        Ok(())
    }

    /// Set a float field, clamped and rounded to the editor precision
    ///
    /// # Errors
    /// Returns error if this is not a float field
    pub fn set_float(&mut self, value: f64) -> Result<(), FieldEditError> {
        self.expect_kind(FieldKind::Float)?;
        self.state = FieldState::Float(round_for_editor(value));
        Ok(())
    }

    /// Set the text of a str or list field
    ///
    /// # Errors
    /// Returns error if this is neither a str nor a list field
    pub fn set_text(&mut self, text: impl Into<String>) -> Result<(), FieldEditError> {
        if !matches!(self.kind, FieldKind::Str | FieldKind::List) {
            return Err(self.mismatch(FieldKind::Str));
        }
        self.state = FieldState::Text(text.into());
        Ok(())
    }

    /// Apply free-form input, interpreted according to the field kind
    ///
    /// # Errors
    /// Returns error if `input` cannot be read as a bool/int/float
    pub fn edit(&mut self, input: &str) -> Result<(), FieldEditError> {
        match self.kind {
            FieldKind::Bool => {
                let value = parse_bool(input).ok_or_else(|| self.invalid(input))?;
                self.set_bool(value)
            }
            FieldKind::Int => {
                let value = input.trim().parse::<i64>().map_err(|_| self.invalid(input))?;
                self.set_int(value)
            }
            FieldKind::Float => {
                let value = input
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .ok_or_else(|| self.invalid(input))?;
                self.set_float(value)
            }
            FieldKind::Str | FieldKind::List => self.set_text(input),
        }
    }

    fn expect_kind(&self, given: FieldKind) -> Result<(), FieldEditError> {
        if self.kind == given {
            Ok(())
        } else {
            Err(self.mismatch(given))
        }
    }

    fn mismatch(&self, given: FieldKind) -> FieldEditError {
        FieldEditError::KindMismatch {
            path: self.path.clone(),
            kind: self.kind,
            given,
        }
    }

    fn invalid(&self, input: &str) -> FieldEditError {
        FieldEditError::InvalidInput {
            path: self.path.clone(),
            kind: self.kind,
            input: input.to_string(),
        }
    }
}

/// Ordered fields of one editing session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSet {
    fields: Vec<FieldDescriptor>,
}

impl FieldSet {
    /// Wrap reflected fields
    #[inline]
    #[must_use]
    pub fn new(fields: Vec<FieldDescriptor>) -> Self {
        Self { fields }
    }

    /// Fields in reflection order
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter()
    }

    /// Mutable fields in reflection order
    #[inline]
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut FieldDescriptor> {
        self.fields.iter_mut()
    }

    /// Number of fields
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if the document had no editable leaves
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field at `path`
    #[must_use]
    pub fn get(&self, path: &OverridePath) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.path() == path)
    }

    /// Mutable field at `path`
    pub fn get_mut(&mut self, path: &OverridePath) -> Option<&mut FieldDescriptor> {
        self.fields.iter_mut().find(|f| f.path() == path)
    }

    /// Fields inside the group at `prefix` (or the leaf itself)
    pub fn under<'a>(
        &'a self,
        prefix: &'a OverridePath,
    ) -> impl Iterator<Item = &'a FieldDescriptor> + 'a {
        self.fields.iter().filter(move |f| prefix.is_prefix_of(f.path()))
    }

    /// Fields whose value differs from their default
    pub fn modified(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.is_modified())
    }

    /// Every field back to its default
    pub fn reset_all(&mut self) {
        for field in &mut self.fields {
            field.reset();
        }
    }
}

impl IntoIterator for FieldSet {
    type Item = FieldDescriptor;
    type IntoIter = std::vec::IntoIter<FieldDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl<'a> IntoIterator for &'a FieldSet {
    type Item = &'a FieldDescriptor;
    type IntoIter = std::slice::Iter<'a, FieldDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

/// Editor state showing `value` in a field of `kind`
fn state_for(kind: FieldKind, value: &ConfigValue) -> FieldState {
    match (kind, value) {
        (FieldKind::Bool, ConfigValue::Bool(b)) => FieldState::Bool(*b),
        (FieldKind::Int, ConfigValue::Int(i)) => FieldState::Int(*i),
        (FieldKind::Float, ConfigValue::Float(f)) => FieldState::Float(*f),
        #[allow(clippy::cast_precision_loss)]
        (FieldKind::Float, ConfigValue::Int(i)) => FieldState::Float(*i as f64),
        (FieldKind::List, ConfigValue::List(items)) => FieldState::Text(list_text(items)),
        (_, ConfigValue::Null) => FieldState::Text(String::new()),
        (_, ConfigValue::Str(s)) => FieldState::Text(s.clone()),
        (_, other) => FieldState::Text(other.to_flow()),
    }
}

/// Comma-joined list items, readable back as a flow sequence body
#[must_use]
pub fn list_text(items: &[ConfigValue]) -> String {
    items
        .iter()
        .map(ConfigValue::to_flow)
        .collect::<Vec<_>>()
        .join(", ")
}

fn parse_bool(input: &str) -> Option<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn round_for_editor(value: f64) -> f64 {
    let scale = 10_f64.powi(FLOAT_EDIT_DECIMALS);
    let clamped = value.clamp(-FLOAT_EDIT_BOUND, FLOAT_EDIT_BOUND);
    (clamped * scale).round() / scale
}
