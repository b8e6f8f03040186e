//! Field-level diffs between an existing entry and freshly fetched data.
//!
//! Parsing never touches an undo log. A caller that merges fetched fields into
//! an entry it already holds computes the changes here, applies them, and
//! records the same list in its own history.

use super::Entry;

/// How conflicting field values are resolved when merging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverwritePolicy {
    /// Only fill in fields the existing entry lacks.
    Never,
    /// Replace every differing value.
    Always,
}

/// One field mutation: `old` is `None` when the field was absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    /// Lower-cased field name
    pub field: String,
    /// Value before the change
    pub old: Option<String>,
    /// Value after the change
    pub new: String,
}

impl Entry {
    /// Computes the changes needed to merge `incoming` into this entry.
    #[must_use]
    pub fn diff_fields(&self, incoming: &Entry, policy: OverwritePolicy) -> Vec<FieldChange> {
        self.diff_fields_with(incoming, |_, _, _| policy == OverwritePolicy::Always)
    }

    /// Computes merge changes, asking `overwrite(field, old, new)` for each
    /// conflicting value. Absent fields are always filled in.
    pub fn diff_fields_with(
        &self,
        incoming: &Entry,
        mut overwrite: impl FnMut(&str, &str, &str) -> bool,
    ) -> Vec<FieldChange> {
        let mut changes = Vec::new();
        for (name, new_value) in incoming.fields() {
            let Some(old) = self.field(name) else {
                changes.push(FieldChange {
                    field: name.to_string(),
                    old: None,
                    new: new_value.to_string(),
                });
                continue;
            };
            if old != new_value && overwrite(name, old, new_value) {
                changes.push(FieldChange {
                    field: name.to_string(),
                    old: Some(old.to_string()),
                    new: new_value.to_string(),
                });
            }
        }
        changes
    }

    /// Applies previously computed changes.
    pub fn apply_changes(&mut self, changes: &[FieldChange]) {
        for change in changes {
            self.set_field(&change.field, change.new.clone());
        }
    }

    /// Reverts previously applied changes.
    pub fn revert_changes(&mut self, changes: &[FieldChange]) {
        for change in changes.iter().rev() {
            match &change.old {
                Some(old) => {
                    self.set_field(&change.field, old.clone());
                }
                None => {
                    self.remove_field(&change.field);
                }
            }
        }
    }
}
