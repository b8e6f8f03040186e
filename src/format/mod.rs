//! Format detection and source parsing.
//!
//! Each supported source format implements [`ImportFormat`]: a non-destructive
//! `recognizes` check plus a `parse` that turns the bytes into a
//! [`ParseResult`]. Formats are collected in an explicit [`FormatRegistry`]
//! which also drives auto-detection.
//!
//! # Architecture
//!
//! - [`ImportFormat`] - capability trait every format implements
//! - [`FormatRegistry`] - priority-ordered collection with auto-detection
//! - [`XmlEvents`] - pull-style XML event iterator used by the XML formats
//! - [`decode_input`] - byte-to-text decoding with encoding detection
//!
//! Inputs are whole byte buffers: the registry reads a stream once and then
//! hands the same buffer to every detector and to the chosen parser.

mod bibtex;
mod bibtexml;
mod citeseer;
mod decode;
mod jstor;
mod msbib;
mod oai2;
mod registry;
mod xml_events;

pub use bibtex::{BibtexFormat, looks_like_bibtex};
pub use bibtexml::BibtexmlFormat;
pub use citeseer::{CiteSeerFormat, CiteSeerRecords, parse_citeseer};
pub use decode::{DecodedText, TextEncoding, decode_input};
pub use jstor::JstorFormat;
pub use msbib::MsBibFormat;
pub use oai2::{JournalRef, Oai2Format, parse_oai2, split_journal_ref};
pub use registry::FormatRegistry;
pub use xml_events::{XmlError, XmlEvent, XmlEvents, local_name};

use crate::error::ImportError;
use crate::model::ParseResult;

/// Detection order for formats.
///
/// Formats are tried in priority order: Specialized first, then General, then
/// Permissive. Within the same level, registration order is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FormatPriority {
    /// Formats with an unambiguous signature (namespaced XML feeds)
    Specialized = 0,
    /// Formats recognized by a common textual pattern (BibTeX)
    General = 1,
    /// Formats whose detector only rejects structurally impossible input
    Permissive = 2,
}

/// Capability interface implemented by every import format.
///
/// `recognizes` must never fail: malformed input is simply not recognized.
/// `parse` fails only when the input cannot be decoded or violates the
/// format's lexical grammar; broken individual records become warnings.
pub trait ImportFormat: Send + Sync {
    /// Returns the short format name used on the command line (e.g. "bibtex").
    fn name(&self) -> &str;

    /// Returns a one-line human readable description.
    fn description(&self) -> &str;

    /// Returns the detection priority.
    fn priority(&self) -> FormatPriority;

    /// Returns true if `input` looks like this format.
    fn recognizes(&self, input: &[u8]) -> bool;

    /// Parses `input` into entries.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::Format`] when the input cannot be decoded or is
    /// structurally incompatible with the format, and
    /// [`ImportError::Protocol`] when the input is an explicit error payload.
    fn parse(&self, input: &[u8]) -> Result<ParseResult, ImportError>;
}

/// Returns the first `max_lines` lines of `input` as lossy text, for detectors.
fn head_lines(input: &[u8], max_lines: usize) -> String {
    let text = decode_input(input, "detector").map_or_else(
        |_| String::from_utf8_lossy(input).into_owned(),
        |decoded| decoded.text,
    );
    text.lines().take(max_lines).collect::<Vec<_>>().join("\n")
}
