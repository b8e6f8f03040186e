//! The canonical bibliographic entry.

use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

static NEXT_ENTRY_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique entry identifier, assigned at creation and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EntryId(u64);

impl EntryId {
    fn next() -> Self {
        Self(NEXT_ENTRY_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw numeric value.
    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entry-{}", self.0)
    }
}

/// A bibliographic record: entry type, optional citation key and fields.
///
/// Field names are case-insensitive (stored lower-cased). A field is either
/// present with a non-empty value or absent; setting an empty value removes it.
///
/// `Entry` is not `Clone`; [`Entry::duplicate`] copies it under a fresh identifier.
#[derive(Debug, Serialize)]
pub struct Entry {
    id: EntryId,
    #[serde(rename = "type")]
    entry_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    fields: BTreeMap<String, String>,
}

impl Entry {
    /// Creates an empty entry of the given type with a fresh identifier.
    #[must_use]
    pub fn new(entry_type: &str) -> Self {
        Self {
            id: EntryId::next(),
            entry_type: entry_type.trim().to_ascii_lowercase(),
            key: None,
            fields: BTreeMap::new(),
        }
    }

    /// Returns a copy of this entry under a fresh identifier.
    #[must_use]
    pub fn duplicate(&self) -> Self {
        Self {
            id: EntryId::next(),
            entry_type: self.entry_type.clone(),
            key: self.key.clone(),
            fields: self.fields.clone(),
        }
    }

    /// Returns the process-unique identifier.
    #[must_use]
    pub fn id(&self) -> EntryId {
        self.id
    }

    /// Returns the lower-cased entry type name.
    #[must_use]
    pub fn entry_type(&self) -> &str {
        &self.entry_type
    }

    /// Replaces the entry type.
    pub fn set_entry_type(&mut self, entry_type: &str) {
        self.entry_type = entry_type.trim().to_ascii_lowercase();
    }

    /// Returns the citation key, if any.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Sets the citation key; a blank key clears it.
    pub fn set_key(&mut self, key: &str) {
        let key = key.trim();
        self.key = if key.is_empty() {
            None
        } else {
            Some(key.to_string())
        };
    }

    /// Returns a field value by case-insensitive name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Returns true when the field is present.
    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(&name.to_ascii_lowercase())
    }

    /// Sets a field; returns false (and removes any old value) when `value`
    /// is blank.
    ///
    /// The value is stored as given, untrimmed.
    pub fn set_field(&mut self, name: &str, value: impl Into<String>) -> bool {
        let name = name.trim().to_ascii_lowercase();
        let value = value.into();
        if name.is_empty() || value.trim().is_empty() {
            self.fields.remove(&name);
            return false;
        }
        self.fields.insert(name, value);
        true
    }

    /// Sets a field only when it is not already present.
    pub fn set_field_if_absent(&mut self, name: &str, value: impl Into<String>) -> bool {
        if self.has_field(name) {
            return false;
        }
        self.set_field(name, value)
    }

    /// Removes a field, returning its value.
    pub fn remove_field(&mut self, name: &str) -> Option<String> {
        self.fields.remove(&name.to_ascii_lowercase())
    }

    /// Iterates fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Rewrites every field value through `f`; values that become blank are removed.
    pub fn map_fields(&mut self, mut f: impl FnMut(&str, &str) -> String) {
        let names: Vec<String> = self.fields.keys().cloned().collect();
        for name in names {
            if let Some(value) = self.fields.get(&name) {
                let updated = f(&name, value);
                self.set_field(&name, updated);
            }
        }
    }

    /// Renders the entry as BibTeX text, fields in name order.
    #[must_use]
    pub fn to_bibtex(&self) -> String {
        let key = self.key.as_deref().unwrap_or("");
        let mut out = format!("@{}{{{key},\n", self.entry_type);
        for (name, value) in &self.fields {
            let _ = writeln!(out, "  {name} = {{{value}}},");
        }
        out.push_str("}\n");
        out
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_ids_are_unique() {
        let a = Entry::new("article");
        let b = Entry::new("article");
        let c = a.duplicate();
        assert_ne!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
        assert_eq!(c.field_count(), a.field_count());
    }

    #[test]
    fn test_entry_type_lowercased() {
        let entry = Entry::new("  InProceedings ");
        assert_eq!(entry.entry_type(), "inproceedings");
    }

    #[test]
    fn test_field_names_case_insensitive() {
        let mut entry = Entry::new("article");
        entry.set_field("Title", "A Title");
        assert_eq!(entry.field("TITLE"), Some("A Title"));
        assert_eq!(entry.field("title"), Some("A Title"));
        assert!(entry.has_field("tItLe"));
    }

    #[test]
    fn test_blank_value_means_absent() {
        let mut entry = Entry::new("article");
        assert!(entry.set_field("title", "X"));
        assert!(!entry.set_field("title", "   "));
        assert!(!entry.has_field("title"));
        assert_eq!(entry.field_count(), 0);
    }

    #[test]
    fn test_value_stored_untrimmed() {
        let mut entry = Entry::new("article");
        entry.set_field("journal", "Phys. Rev. ");
        assert_eq!(entry.field("journal"), Some("Phys. Rev. "));
    }

    #[test]
    fn test_set_field_if_absent_keeps_first() {
        let mut entry = Entry::new("misc");
        assert!(entry.set_field_if_absent("year", "1999"));
        assert!(!entry.set_field_if_absent("year", "2001"));
        assert_eq!(entry.field("year"), Some("1999"));
    }

    #[test]
    fn test_map_fields_removes_blank_results() {
        let mut entry = Entry::new("misc");
        entry.set_field("title", " Title ");
        entry.set_field("note", "drop me");
        entry.map_fields(|name, value| {
            if name == "note" {
                String::new()
            } else {
                value.trim().to_string()
            }
        });
        assert_eq!(entry.field("title"), Some("Title"));
        assert!(!entry.has_field("note"));
    }

    #[test]
    fn test_to_bibtex_renders_sorted_fields() {
        let mut entry = Entry::new("article");
        entry.set_key("smith99");
        entry.set_field("year", "1999");
        entry.set_field("author", "J. Smith");
        assert_eq!(
            entry.to_bibtex(),
            "@article{smith99,\n  author = {J. Smith},\n  year = {1999},\n}\n"
        );
    }

    #[test]
    fn test_entry_serializes_type_and_fields() {
        let mut entry = Entry::new("book");
        entry.set_field("title", "T");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "book");
        assert_eq!(json["fields"]["title"], "T");
        assert!(json.get("key").is_none());
    }
}
