//! Format registry with priority-ordered auto-detection.
//!
//! The [`FormatRegistry`] owns one instance of every import format. Callers
//! either name a format explicitly or let the registry sniff the input.

use std::io::Read;
use std::sync::Arc;

use tracing::{debug, info};

use super::{
    BibtexFormat, BibtexmlFormat, CiteSeerFormat, FormatPriority, ImportFormat, JstorFormat,
    MsBibFormat, Oai2Format, decode_input,
};
use crate::error::ImportError;
use crate::model::{EntryTypeRegistry, ParseResult};

/// A priority-ordered collection of import formats.
///
/// Detection tries formats in priority order (Specialized first, then General,
/// then Permissive). Within the same priority level, registration order is kept.
pub struct FormatRegistry {
    formats: Vec<Box<dyn ImportFormat>>,
}

impl FormatRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            formats: Vec::new(),
        }
    }

    /// Creates a registry holding every built-in format.
    ///
    /// The BibTeX and `BibTeXML` parsers share `entry_types` to resolve entry
    /// type names.
    #[must_use]
    pub fn with_defaults(entry_types: Arc<EntryTypeRegistry>) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(BibtexmlFormat::new(Arc::clone(&entry_types))));
        registry.register(Box::new(CiteSeerFormat::new()));
        registry.register(Box::new(Oai2Format::new()));
        registry.register(Box::new(BibtexFormat::new(entry_types)));
        registry.register(Box::new(MsBibFormat::new()));
        registry.register(Box::new(JstorFormat::new()));
        registry
    }

    /// Registers a format.
    #[tracing::instrument(skip(self, format), fields(format_name))]
    pub fn register(&mut self, format: Box<dyn ImportFormat>) {
        tracing::Span::current().record("format_name", format.name());
        debug!(
            name = format.name(),
            priority = ?format.priority(),
            "Registering import format"
        );
        self.formats.push(format);
    }

    /// Returns the number of registered formats.
    #[must_use]
    pub fn format_count(&self) -> usize {
        self.formats.len()
    }

    /// Returns true if no formats are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }

    /// Returns all formats in detection order.
    #[must_use]
    pub fn formats(&self) -> Vec<&dyn ImportFormat> {
        let mut formats: Vec<&dyn ImportFormat> = self.formats.iter().map(AsRef::as_ref).collect();
        formats.sort_by_key(|f| f.priority());
        formats
    }

    /// Returns the format registered under `name` (case-insensitive).
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&dyn ImportFormat> {
        self.formats
            .iter()
            .find(|f| f.name().eq_ignore_ascii_case(name))
            .map(AsRef::as_ref)
    }

    /// Returns registered format names in detection order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.formats().into_iter().map(|f| f.name()).collect()
    }

    /// Returns the first format, in detection order, that recognizes `input`.
    #[must_use]
    #[tracing::instrument(skip(self, input), fields(input_len = input.len()))]
    pub fn detect(&self, input: &[u8]) -> Option<&dyn ImportFormat> {
        let found = self.formats().into_iter().find(|f| f.recognizes(input));
        match found {
            Some(format) => debug!(format = format.name(), "Detected input format"),
            None => debug!("No format recognized the input"),
        }
        found
    }

    /// Reads `reader` once, detects its format and parses it.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::Io`] when reading fails,
    /// [`ImportError::Unrecognized`] when no format matches, and any error
    /// the chosen parser returns.
    pub fn import_auto(&self, mut reader: impl Read) -> Result<ParseResult, ImportError> {
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer)?;
        let format = self
            .detect(&buffer)
            .ok_or_else(|| ImportError::Unrecognized {
                known: self.names().join(", "),
            })?;
        Self::run(format, &buffer)
    }

    /// Reads `reader` once and parses it with the format called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::UnknownFormat`] for an unregistered name,
    /// [`ImportError::Io`] when reading fails, and any parser error.
    pub fn import_with(&self, name: &str, mut reader: impl Read) -> Result<ParseResult, ImportError> {
        let format = self.find(name).ok_or_else(|| ImportError::UnknownFormat {
            name: name.to_string(),
            known: self.names().join(", "),
        })?;
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer)?;
        Self::run(format, &buffer)
    }

    /// Parses an in-memory buffer, detecting the format when `name` is `None`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::import_auto`] and [`Self::import_with`].
    pub fn parse_bytes(&self, name: Option<&str>, input: &[u8]) -> Result<ParseResult, ImportError> {
        match name {
            Some(name) => self.import_with(name, input),
            None => self.import_auto(input),
        }
    }

    #[tracing::instrument(skip(format, input), fields(format = format.name(), input_len = input.len()))]
    fn run(format: &dyn ImportFormat, input: &[u8]) -> Result<ParseResult, ImportError> {
        let mut result = format.parse(input)?;
        if result.encoding().is_none() {
            if let Ok(decoded) = decode_input(input, format.name()) {
                result.set_encoding(decoded.encoding.label());
            }
        }
        info!(
            entries = result.len(),
            warnings = result.warning_count(),
            "Import finished"
        );
        Ok(result)
    }
}

impl std::fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatRegistry")
            .field("format_count", &self.formats.len())
            .field("formats", &self.names())
            .finish()
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::with_defaults(Arc::new(EntryTypeRegistry::with_builtins()))
    }
}

impl FormatPriority {
    /// Returns a short label for listings.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Specialized => "specialized",
            Self::General => "general",
            Self::Permissive => "permissive",
        }
    }
}
