//! Error types for remote fetches.
//!
//! Every variant is non-fatal at pipeline granularity: the pipeline turns it
//! into a diagnostic for the identifier and moves on.

use thiserror::Error;

use crate::error::ImportError;

/// Errors that can occur while fetching one identifier or page.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network failure, HTTP error status or empty body
    #[error("cannot fetch '{target}': {reason}\n  Suggestion: Check your network connection and try again")]
    Remote {
        /// Identifier or URL being fetched
        target: String,
        /// Why the fetch failed
        reason: String,
    },

    /// The source answered with an explicit error payload
    #[error("source rejected '{target}': {message}\n  Suggestion: Check that the identifier exists")]
    Protocol {
        /// Identifier being fetched
        target: String,
        /// Error text sent by the source
        message: String,
    },

    /// The identifier does not match the source's grammar
    #[error("'{identifier}' is not a valid {source_name} identifier\n  Suggestion: Use {expected}")]
    InvalidIdentifier {
        /// Identifier as given by the caller
        identifier: String,
        /// Source that rejected it
        source_name: String,
        /// Description of the accepted grammar
        expected: String,
    },

    /// The response arrived but could not be parsed
    #[error("cannot parse response for '{target}': {source}")]
    Parse {
        /// Identifier or URL being fetched
        target: String,
        /// Underlying parse failure
        #[source]
        source: ImportError,
    },

    /// HTTP client construction failed
    #[error("HTTP client setup failed: {reason}\n  Suggestion: Check proxy and TLS settings")]
    Client {
        /// Builder error text
        reason: String,
    },
}

impl FetchError {
    /// Creates a `Remote` error.
    #[must_use]
    pub fn remote(target: &str, reason: &str) -> Self {
        Self::Remote {
            target: target.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Creates an `InvalidIdentifier` error.
    #[must_use]
    pub fn invalid_identifier(identifier: &str, source_name: &str, expected: &str) -> Self {
        Self::InvalidIdentifier {
            identifier: identifier.to_string(),
            source_name: source_name.to_string(),
            expected: expected.to_string(),
        }
    }

    /// Wraps a parser error; error payloads become `Protocol`.
    #[must_use]
    pub fn from_import(target: &str, error: ImportError) -> Self {
        match error {
            ImportError::Protocol { message, .. } => Self::Protocol {
                target: target.to_string(),
                message,
            },
            other => Self::Parse {
                target: target.to_string(),
                source: other,
            },
        }
    }
}
