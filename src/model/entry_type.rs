//! Entry type vocabulary and its registry.
//!
//! The registry is an explicitly constructed object, usually shared as
//! `Arc<EntryTypeRegistry>`. It is filled with the built-in types at
//! construction; the only mutation afterwards is [`EntryTypeRegistry::register_custom`],
//! which takes the write lock.

use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};

use serde::Serialize;
use tracing::{debug, info};

/// Type given to entries whose declared type is unknown.
pub const DEFAULT_ENTRY_TYPE: &str = "other";

/// Built-in types as `(name, required fields, optional fields)`.
const BUILTIN_TYPES: &[(&str, &[&str], &[&str])] = &[
    (
        "article",
        &["author", "title", "journal", "year"],
        &["volume", "number", "pages", "month", "note"],
    ),
    (
        "book",
        &["title", "publisher", "year"],
        &["author", "editor", "volume", "number", "series", "address", "edition", "month", "note"],
    ),
    (
        "booklet",
        &["title"],
        &["author", "howpublished", "address", "month", "year", "note"],
    ),
    (
        "conference",
        &["author", "title", "booktitle", "year"],
        &["editor", "volume", "number", "series", "pages", "address", "month", "organization", "publisher", "note"],
    ),
    (
        "inbook",
        &["title", "chapter", "publisher", "year"],
        &["author", "editor", "volume", "number", "series", "type", "address", "edition", "month", "pages", "note"],
    ),
    (
        "incollection",
        &["author", "title", "booktitle", "publisher", "year"],
        &["editor", "volume", "number", "series", "type", "chapter", "pages", "address", "edition", "month", "note"],
    ),
    (
        "inproceedings",
        &["author", "title", "booktitle", "year"],
        &["editor", "volume", "number", "series", "pages", "address", "month", "organization", "publisher", "note"],
    ),
    (
        "manual",
        &["title"],
        &["author", "organization", "address", "edition", "month", "year", "note"],
    ),
    (
        "mastersthesis",
        &["author", "title", "school", "year"],
        &["type", "address", "month", "note"],
    ),
    (
        "misc",
        &[],
        &["author", "title", "howpublished", "month", "year", "note"],
    ),
    (DEFAULT_ENTRY_TYPE, &[], &[]),
    (
        "phdthesis",
        &["author", "title", "school", "year"],
        &["type", "address", "month", "note"],
    ),
    (
        "proceedings",
        &["title", "year"],
        &["editor", "volume", "number", "series", "address", "month", "organization", "publisher", "note"],
    ),
    (
        "techreport",
        &["author", "title", "institution", "year"],
        &["type", "number", "address", "month", "note"],
    ),
    (
        "unpublished",
        &["author", "title", "note"],
        &["month", "year"],
    ),
];

/// A named entry type with its required and optional field lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryType {
    name: String,
    required: Vec<String>,
    optional: Vec<String>,
    custom: bool,
}

impl EntryType {
    /// Creates a custom (non built-in) entry type.
    #[must_use]
    pub fn custom(name: &str, required: &[&str], optional: &[&str]) -> Self {
        Self {
            name: name.trim().to_ascii_lowercase(),
            required: required.iter().map(|f| f.to_ascii_lowercase()).collect(),
            optional: optional.iter().map(|f| f.to_ascii_lowercase()).collect(),
            custom: true,
        }
    }

    fn builtin(name: &str, required: &[&str], optional: &[&str]) -> Self {
        Self {
            custom: false,
            ..Self::custom(name, required, optional)
        }
    }

    /// Parses a custom type declaration of the form
    /// `Name: req[field;field] opt[field;field]`.
    ///
    /// Returns `None` when the declaration has no name.
    #[must_use]
    pub fn parse_declaration(declaration: &str) -> Option<Self> {
        let (name, rest) = declaration.split_once(':')?;
        let name = name.trim();
        if name.is_empty() || name.contains(char::is_whitespace) {
            return None;
        }
        let required = bracketed_list(rest, "req[");
        let optional = bracketed_list(rest, "opt[");
        let required: Vec<&str> = required.iter().map(String::as_str).collect();
        let optional: Vec<&str> = optional.iter().map(String::as_str).collect();
        Some(Self::custom(name, &required, &optional))
    }

    /// Returns the lower-cased type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the required field names.
    #[must_use]
    pub fn required_fields(&self) -> &[String] {
        &self.required
    }

    /// Returns the optional field names.
    #[must_use]
    pub fn optional_fields(&self) -> &[String] {
        &self.optional
    }

    /// Returns true for types registered at runtime.
    #[must_use]
    pub fn is_custom(&self) -> bool {
        self.custom
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

fn bracketed_list(text: &str, opener: &str) -> Vec<String> {
    let lower = text.to_ascii_lowercase();
    let Some(start) = lower.find(opener) else {
        return Vec::new();
    };
    let body_start = start + opener.len();
    let Some(len) = text[body_start..].find(']') else {
        return Vec::new();
    };
    text[body_start..body_start + len]
        .split(';')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_ascii_lowercase)
        .collect()
}

/// Registry of known entry types keyed by lower-cased name.
///
/// Readers take the read lock; registering a custom type takes the write lock,
/// so concurrent imports that discover custom types are serialized.
pub struct EntryTypeRegistry {
    types: RwLock<HashMap<String, EntryType>>,
}

impl EntryTypeRegistry {
    /// Creates a registry holding the built-in types.
    #[must_use]
    pub fn with_builtins() -> Self {
        let types = BUILTIN_TYPES
            .iter()
            .map(|(name, required, optional)| {
                (
                    (*name).to_string(),
                    EntryType::builtin(name, required, optional),
                )
            })
            .collect();
        Self {
            types: RwLock::new(types),
        }
    }

    /// Returns true when `name` (any case) is known.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&name.trim().to_ascii_lowercase())
    }

    /// Returns a copy of the type registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<EntryType> {
        self.types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&name.trim().to_ascii_lowercase())
            .cloned()
    }

    /// Returns the lower-cased `name` when known, else [`DEFAULT_ENTRY_TYPE`].
    #[must_use]
    pub fn resolve_or_default(&self, name: &str) -> String {
        let lower = name.trim().to_ascii_lowercase();
        if self.contains(&lower) {
            lower
        } else {
            DEFAULT_ENTRY_TYPE.to_string()
        }
    }

    /// Returns all registered type names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Registers a custom type after the caller confirms it.
    ///
    /// `confirm` runs only for names that are not yet known. Returns true when
    /// the type was added. The check and the insert happen under one write
    /// lock, so two imports racing on the same name add it once.
    #[tracing::instrument(skip(self, entry_type, confirm), fields(type_name = entry_type.name()))]
    pub fn register_custom(
        &self,
        entry_type: EntryType,
        confirm: impl FnOnce(&EntryType) -> bool,
    ) -> bool {
        if self.contains(entry_type.name()) {
            debug!("Entry type already known; not registering");
            return false;
        }
        // No lock is held while the caller decides
        if !confirm(&entry_type) {
            debug!("Custom entry type declined by caller");
            return false;
        }
        let mut types = self.types.write().unwrap_or_else(PoisonError::into_inner);
        if types.contains_key(entry_type.name()) {
            debug!("Entry type registered while confirming; not registering");
            return false;
        }
        info!(type_name = entry_type.name(), "Registered custom entry type");
        types.insert(entry_type.name().to_string(), entry_type);
        true
    }
}

impl Default for EntryTypeRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for EntryTypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryTypeRegistry")
            .field("types", &self.names())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_builtins_present() {
        let registry = EntryTypeRegistry::with_builtins();
        for name in ["article", "book", "inproceedings", "misc", "other", "techreport"] {
            assert!(registry.contains(name), "missing builtin {name}");
        }
        assert!(registry.contains("ARTICLE"));
        assert_eq!(
            registry.get("article").unwrap().required_fields()[0],
            "author"
        );
    }

    #[test]
    fn test_unknown_type_falls_back_to_default() {
        let registry = EntryTypeRegistry::default();
        assert_eq!(registry.resolve_or_default("Article"), "article");
        assert_eq!(registry.resolve_or_default("dataset"), DEFAULT_ENTRY_TYPE);
    }

    #[test]
    fn test_register_custom_requires_confirmation() {
        let registry = EntryTypeRegistry::default();
        let dataset = EntryType::custom("Dataset", &["title"], &["url"]);

        assert!(!registry.register_custom(dataset.clone(), |_| false));
        assert!(!registry.contains("dataset"));

        assert!(registry.register_custom(dataset, |_| true));
        assert!(registry.get("dataset").unwrap().is_custom());
    }

    #[test]
    fn test_register_custom_skips_known_without_asking() {
        let registry = EntryTypeRegistry::default();
        let asked = AtomicUsize::new(0);
        let added = registry.register_custom(EntryType::custom("article", &[], &[]), |_| {
            asked.fetch_add(1, Ordering::SeqCst);
            true
        });
        assert!(!added);
        assert_eq!(asked.load(Ordering::SeqCst), 0);
        assert!(!registry.get("article").unwrap().is_custom());
    }

    #[test]
    fn test_confirm_can_read_registry() {
        let registry = EntryTypeRegistry::default();
        let added = registry.register_custom(EntryType::custom("patent", &[], &[]), |ty| {
            !registry.contains(ty.name()) && registry.contains("article")
        });
        assert!(added);
        assert!(registry.contains("patent"));
    }

    #[test]
    fn test_confirm_loses_race_to_concurrent_registration() {
        let registry = EntryTypeRegistry::default();
        let added = registry.register_custom(EntryType::custom("patent", &["a"], &[]), |_| {
            registry.register_custom(EntryType::custom("patent", &["b"], &[]), |_| true)
        });
        assert!(!added);
        assert_eq!(registry.get("patent").unwrap().required_fields(), ["b"]);
    }

    #[test]
    fn test_concurrent_registration_adds_once() {
        let registry = Arc::new(EntryTypeRegistry::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    registry.register_custom(EntryType::custom("patent", &[], &[]), |_| true)
                })
            })
            .collect();
        let added = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|added| *added)
            .count();
        assert_eq!(added, 1);
    }

    #[test]
    fn test_parse_declaration() {
        let parsed =
            EntryType::parse_declaration("Patent: req[author;title;number] opt[url; note]")
                .unwrap();
        assert_eq!(parsed.name(), "patent");
        assert_eq!(parsed.required_fields(), ["author", "title", "number"]);
        assert_eq!(parsed.optional_fields(), ["url", "note"]);
        assert!(parsed.is_custom());
    }

    #[test]
    fn test_parse_declaration_rejects_missing_name() {
        assert!(EntryType::parse_declaration(": req[a]").is_none());
        assert!(EntryType::parse_declaration("no colon here").is_none());
    }
}
