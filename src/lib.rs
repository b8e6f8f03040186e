//! Bibliographic Import Core Library
//!
//! This library turns records from heterogeneous bibliographic sources into
//! canonical [`Entry`] values: structured XML dialects (OAI2, `BibTeXML`,
//! `CiteSeer` OAI, MS-Office bibliography XML), tab-delimited `JStor` exports,
//! BibTeX text, and scraped web responses (DBLP pages, a scraper service).
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`model`] - Entry, entry-type registry and the aggregate parse result
//! - [`normalize`] - Field normalization heuristics shared by the parsers
//! - [`format`] - Format detectors and source parsers behind one capability trait
//! - [`fetch`] - Identifier-driven remote fetch pipeline with progress and cancellation
//! - [`crawl`] - Directory crawl for files not referenced by a record collection
//! - [`config`] - File configuration for the command-line shell

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod crawl;
pub mod error;
pub mod fetch;
pub mod format;
pub mod model;
pub mod normalize;
mod user_agent;

// Re-export commonly used types
pub use error::{FieldError, ImportError};
pub use fetch::{
    ArxivSource, CancellationFlag, CiteSeerSource, DblpFetcher, FetchError, FetchPipeline,
    FetchSummary, HttpSettings, IdentifierSource, ImportSink, ScraperClient, TextSink,
};
pub use format::{FormatPriority, FormatRegistry, ImportFormat};
pub use model::{
    Entry, EntryId, EntryType, EntryTypeRegistry, FieldChange, OverwritePolicy, ParseResult,
};
