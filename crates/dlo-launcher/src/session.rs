//! Config editing session for one script
//!
//! Opening a session loads the script's base config and its cached overrides
//! and reflects them into editable fields. Committing extracts the overrides,
//! stores them in the cache and returns them as process arguments.

use dlo_config::{
    extract, merge, override_args, reflect, ConfigDocument, ConfigStore, FieldDescriptor,
    FieldSet, OverridePath,
};
use tracing::{debug, info};

use crate::error::{LauncherError, Result};
use crate::script::ScriptTarget;

/// Editable view of a script's configuration
#[derive(Debug)]
pub struct EditSession {
    target: ScriptTarget,
    store: ConfigStore,
    base: ConfigDocument,
    fields: FieldSet,
}

impl EditSession {
    /// Load the base config and cached overrides of `target`
    ///
    /// A missing base config gives a session without fields.
    ///
    /// # Errors
    /// Returns [`LauncherError::Config`] if the base config is unreadable or malformed
    pub fn open(target: ScriptTarget, store: ConfigStore) -> Result<Self> {
        let base = store.load(&target.config)?;
        let cached = store.load_overrides(target.kind.scope());
        let fields = reflect(&base, &cached);
        debug!(
            script = %target.kind,
            config = %target.config.display(),
            fields = fields.len(),
            cached = cached.leaves().len(),
            "opened config session"
        );
        Ok(Self {
            target,
            store,
            base,
            fields,
        })
    }

    /// Script this session edits
    #[inline]
    #[must_use]
    pub fn target(&self) -> &ScriptTarget {
        &self.target
    }

    /// Base config as loaded
    #[inline]
    #[must_use]
    pub fn base(&self) -> &ConfigDocument {
        &self.base
    }

    /// Editable fields in document order
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }

    /// Field at `path`
    ///
    /// # Errors
    /// Returns [`LauncherError::UnknownField`] if no leaf has this path
    pub fn field_mut(&mut self, path: &OverridePath) -> Result<&mut FieldDescriptor> {
        self.fields
            .get_mut(path)
            .ok_or_else(|| LauncherError::UnknownField { path: path.clone() })
    }

    /// Apply a `path=value` assignment
    ///
    /// The value is parsed according to the field's kind.
    ///
    /// # Errors
    /// Fails if the assignment is malformed, the field does not exist, or
    /// the value does not fit the field
    pub fn assign(&mut self, assignment: &str) -> Result<()> {
        let (path, value) = assignment
            .split_once('=')
            .ok_or_else(|| LauncherError::InvalidAssignment(assignment.to_string()))?;
        let path: OverridePath = path.parse()?;
        self.field_mut(&path)?.edit(value)?;
        Ok(())
    }

    /// Every field back to its default
    pub fn reset_all(&mut self) {
        self.fields.reset_all();
    }

    /// Fields that differ from their default, as a sparse document
    #[must_use]
    pub fn overrides(&self) -> ConfigDocument {
        extract(&self.fields)
    }

    /// Base config with the current overrides applied
    #[must_use]
    pub fn effective(&self) -> ConfigDocument {
        merge(&self.base, &self.overrides())
    }

    /// Save the overrides to the cache and return them as process arguments
    #[must_use = "the returned arguments are what the script should receive"]
    pub fn commit(&self) -> Vec<String> {
        let overrides = self.overrides();
        self.store.save_overrides(self.target.kind.scope(), &overrides);
        let args = override_args(&overrides, self.target.kind.arg_style());
        info!(script = %self.target.kind, args = args.len(), "committed config overrides");
        args
    }
}
