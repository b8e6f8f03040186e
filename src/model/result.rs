//! Aggregate result of one parse or fetch run.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;
use tracing::debug;

use super::{Entry, EntryType};
use crate::error::FieldError;

/// Entries in discovery order plus deduplicated warnings and run metadata.
#[derive(Debug, Default, Serialize)]
pub struct ParseResult {
    entries: Vec<Entry>,
    warnings: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    encoding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    origin: Option<String>,
    merge_into_existing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    preamble: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    metadata: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    custom_types: Vec<EntryType>,
}

/// Results of a fetch run have the same shape as parse results.
pub type FetchResult = ParseResult;

impl ParseResult {
    /// Creates an empty result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty result tagged with its originating file path or query.
    #[must_use]
    pub fn with_origin(origin: impl Into<String>) -> Self {
        Self {
            origin: Some(origin.into()),
            ..Self::default()
        }
    }

    /// Appends an entry (discovery order is preserved).
    pub fn add_entry(&mut self, entry: Entry) {
        self.entries.push(entry);
    }

    /// Records a warning; identical messages are stored once.
    pub fn add_warning(&mut self, message: impl Into<String>) {
        let message = message.into();
        if self.warnings.insert(message.clone()) {
            debug!(warning = %message, "Import warning recorded");
        }
    }

    /// Records a skipped field or record as a warning.
    pub fn add_field_error(&mut self, error: &FieldError) {
        self.add_warning(error.to_string());
    }

    /// Returns the entries in discovery order.
    #[must_use]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Returns the entries mutably, for post-parse normalization.
    pub fn entries_mut(&mut self) -> &mut [Entry] {
        &mut self.entries
    }

    /// Consumes the result, returning its entries.
    #[must_use]
    pub fn into_entries(self) -> Vec<Entry> {
        self.entries
    }

    /// Removes and returns the first entry.
    pub fn take_first(&mut self) -> Option<Entry> {
        if self.entries.is_empty() {
            None
        } else {
            Some(self.entries.remove(0))
        }
    }

    /// Iterates warnings in sorted order.
    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        self.warnings.iter().map(String::as_str)
    }

    /// Returns the number of distinct warnings.
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// Returns true if `message` was recorded.
    #[must_use]
    pub fn has_warning(&self, message: &str) -> bool {
        self.warnings.contains(message)
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no entries were produced.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the detected text encoding label.
    #[must_use]
    pub fn encoding(&self) -> Option<&str> {
        self.encoding.as_deref()
    }

    /// Records the detected text encoding label.
    pub fn set_encoding(&mut self, encoding: impl Into<String>) {
        self.encoding = Some(encoding.into());
    }

    /// Returns the originating file path or query.
    #[must_use]
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    /// Sets the originating file path or query.
    pub fn set_origin(&mut self, origin: impl Into<String>) {
        self.origin = Some(origin.into());
    }

    /// Returns the "merge into existing workspace" hint.
    #[must_use]
    pub fn merge_into_existing(&self) -> bool {
        self.merge_into_existing
    }

    /// Sets the "merge into existing workspace" hint.
    pub fn set_merge_into_existing(&mut self, merge: bool) {
        self.merge_into_existing = merge;
    }

    /// Returns the BibTeX `@preamble` text, if one was read.
    #[must_use]
    pub fn preamble(&self) -> Option<&str> {
        self.preamble.as_deref()
    }

    /// Stores the BibTeX `@preamble` text.
    pub fn set_preamble(&mut self, preamble: impl Into<String>) {
        self.preamble = Some(preamble.into());
    }

    /// Returns the key/value metadata read from the input.
    #[must_use]
    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// Stores one metadata item.
    pub fn insert_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// Returns custom entry types declared by the input, for the caller to register.
    #[must_use]
    pub fn custom_types(&self) -> &[EntryType] {
        &self.custom_types
    }

    /// Records a custom entry type declared by the input.
    pub fn add_custom_type(&mut self, entry_type: EntryType) {
        if !self
            .custom_types
            .iter()
            .any(|known| known.name() == entry_type.name())
        {
            self.custom_types.push(entry_type);
        }
    }

    /// Moves entries, warnings and metadata of `other` into this result.
    pub fn merge(&mut self, other: ParseResult) {
        self.entries.extend(other.entries);
        self.warnings.extend(other.warnings);
        self.metadata.extend(other.metadata);
        for entry_type in other.custom_types {
            self.add_custom_type(entry_type);
        }
        if self.encoding.is_none() {
            self.encoding = other.encoding;
        }
        if self.preamble.is_none() {
            self.preamble = other.preamble;
        }
    }
}

impl fmt::Display for ParseResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} entries, {} warnings",
            self.entries.len(),
            self.warnings.len()
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_keep_discovery_order() {
        let mut result = ParseResult::new();
        for title in ["first", "second", "third"] {
            let mut entry = Entry::new("misc");
            entry.set_field("title", title);
            result.add_entry(entry);
        }
        let titles: Vec<_> = result
            .entries()
            .iter()
            .map(|e| e.field("title").unwrap())
            .collect();
        assert_eq!(titles, ["first", "second", "third"]);
    }

    #[test]
    fn test_warnings_are_deduplicated() {
        let mut result = ParseResult::new();
        result.add_warning("duplicate BibTeX key: a");
        result.add_warning("duplicate BibTeX key: a");
        result.add_field_error(&FieldError::new("pages", "row too short"));
        assert_eq!(result.warning_count(), 2);
        assert!(result.has_warning("skipped pages: row too short"));
    }

    #[test]
    fn test_take_first() {
        let mut result = ParseResult::new();
        assert!(result.take_first().is_none());
        result.add_entry(Entry::new("book"));
        result.add_entry(Entry::new("article"));
        assert_eq!(result.take_first().unwrap().entry_type(), "book");
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_merge_combines_results() {
        let mut a = ParseResult::with_origin("a.bib");
        a.add_entry(Entry::new("misc"));
        a.add_warning("w1");
        let mut b = ParseResult::new();
        b.add_entry(Entry::new("book"));
        b.add_warning("w1");
        b.add_warning("w2");
        b.set_encoding("UTF-8");
        b.add_custom_type(EntryType::custom("patent", &[], &[]));

        a.merge(b);
        assert_eq!(a.len(), 2);
        assert_eq!(a.warning_count(), 2);
        assert_eq!(a.encoding(), Some("UTF-8"));
        assert_eq!(a.origin(), Some("a.bib"));
        assert_eq!(a.custom_types().len(), 1);
    }

    #[test]
    fn test_display_summary() {
        let mut result = ParseResult::new();
        result.add_entry(Entry::new("misc"));
        result.add_warning("w");
        assert_eq!(result.to_string(), "1 entries, 1 warnings");
    }
}
