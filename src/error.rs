//! Error types for import operations.
//!
//! Structural failures abort the current parse and surface as [`ImportError`].
//! Per-record problems are [`FieldError`] values that degrade to diagnostics
//! on the [`ParseResult`](crate::model::ParseResult).

use thiserror::Error;

/// Errors that abort a whole parse call.
#[derive(Debug, Error)]
pub enum ImportError {
    /// Input cannot be decoded or does not follow the format's lexical grammar
    #[error("cannot read {format} input: {reason}\n  Suggestion: {suggestion}")]
    Format {
        /// Format that rejected the input
        format: String,
        /// Why decoding failed
        reason: String,
        /// How to fix the issue
        suggestion: String,
    },

    /// The source reported an explicit error payload instead of a record
    #[error("{source_name} reported an error: {message}\n  Suggestion: Check the identifier and try again")]
    Protocol {
        /// Source that sent the error payload
        source_name: String,
        /// Error text sent by the source
        message: String,
    },

    /// Auto-detection found no matching format
    #[error("no import format recognizes the input\n  Suggestion: Choose a format explicitly, one of: {known}")]
    Unrecognized {
        /// Comma-separated list of registered format names
        known: String,
    },

    /// A format was requested by a name nobody registered
    #[error("unknown import format '{name}'\n  Suggestion: Use one of: {known}")]
    UnknownFormat {
        /// Requested name
        name: String,
        /// Comma-separated list of registered format names
        known: String,
    },

    /// Reading the input stream failed
    #[error("I/O error while reading input: {0}")]
    Io(#[from] std::io::Error),
}

impl ImportError {
    /// Creates a `Format` error with a generic suggestion.
    #[must_use]
    pub fn format(format: &str, reason: &str) -> Self {
        Self::Format {
            format: format.to_string(),
            reason: reason.to_string(),
            suggestion: format!("Check that the input really is {format} data"),
        }
    }

    /// Creates a `Format` error for input that failed text decoding.
    #[must_use]
    pub fn undecodable(format: &str, reason: &str) -> Self {
        Self::Format {
            format: format.to_string(),
            reason: reason.to_string(),
            suggestion: "Re-export the file as UTF-8 or ISO-8859-1".to_string(),
        }
    }

    /// Creates a `Protocol` error from a source's error payload.
    #[must_use]
    pub fn protocol(source_name: &str, message: &str) -> Self {
        Self::Protocol {
            source_name: source_name.to_string(),
            message: message.to_string(),
        }
    }

    /// Returns true for errors caused by the source's explicit error payload.
    #[must_use]
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol { .. })
    }
}

/// A single field or record that could not be extracted.
///
/// Never aborts a parse; converted into a warning string on the result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("skipped {field}: {reason}")]
pub struct FieldError {
    /// Field (or record locator) that was skipped
    pub field: String,
    /// Why it was skipped
    pub reason: String,
}

impl FieldError {
    /// Creates a field error.
    #[must_use]
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a field error for an element lacking a required attribute.
    #[must_use]
    pub fn missing_attribute(element: &str, attribute: &str) -> Self {
        Self::new(element, format!("missing '{attribute}' attribute"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_format_error_message_names_format_and_reason() {
        let err = ImportError::format("JStor", "no 'Item Type' header");
        let msg = err.to_string();
        assert!(msg.contains("JStor"));
        assert!(msg.contains("Item Type"));
        assert!(msg.contains("Suggestion"));
    }

    #[test]
    fn test_protocol_error_message_carries_payload() {
        let err = ImportError::protocol("arXiv OAI2", "Malformed identifier");
        assert!(err.is_protocol());
        assert!(err.to_string().contains("Malformed identifier"));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "truncated");
        let err: ImportError = io.into();
        assert!(!err.is_protocol());
        assert!(err.to_string().contains("truncated"));
    }

    #[test]
    fn test_field_error_display() {
        let err = FieldError::missing_attribute("oai_citeseer:author", "name");
        assert_eq!(
            err.to_string(),
            "skipped oai_citeseer:author: missing 'name' attribute"
        );
    }
}
