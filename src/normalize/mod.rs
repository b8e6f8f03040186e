//! Field normalization heuristics shared by the source parsers.
//!
//! Every function here is pure and runs once per raw value.
//!
//! - [`correct_line_breaks`] - collapse hard-wrapped lines and redundant spaces
//! - [`strip_html`] - bounded-window HTML entity and tag stripper
//! - [`CaseKeeper`] - brace-protect acronyms so styles keep their case
//! - [`authors`] - author-list joining and "last, first" reformatting
//! - [`date`] - month tables and date splitting

pub mod authors;
mod case_keeper;
pub mod date;
mod html;
mod text;

use regex::Regex;

pub use case_keeper::{CaseKeeper, DEFAULT_PROTECTED_TERMS};
pub use html::strip_html;
pub use text::{clean_scraped_title, collapse_whitespace, correct_line_breaks, normalize_page_range};

/// Compiles a regex at static init; panics on invalid pattern.
pub(crate) fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}
