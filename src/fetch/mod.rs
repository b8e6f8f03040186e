//! Identifier-driven remote fetching.
//!
//! A [`FetchPipeline`] turns a free-text identifier list into entries by
//! driving an [`IdentifierSource`] one identifier at a time and reporting to
//! an injected [`ImportSink`].
//!
//! # Architecture
//!
//! - [`ImportSink`] - entry, progress and diagnostic receiver with a stop flag
//! - [`TextSink`] - minimal non-interactive sink writing to any `Write`
//! - [`IdentifierSource`] - async trait implemented by OAI sources
//! - [`ArxivSource`] / [`CiteSeerSource`] - OAI `GetRecord` sources
//! - [`DblpFetcher`] - DBLP search and record page extraction
//! - [`ScraperClient`] - best-effort single-entry lookup through a scraper service
//!
//! Failures for one identifier never abort the batch: they become diagnostics
//! and the pipeline moves on. Nothing is retried.

mod arxiv;
mod citeseer;
mod dblp;
mod error;
mod http_client;
mod scraper;
mod sink;

pub use arxiv::ArxivSource;
pub use citeseer::CiteSeerSource;
pub use dblp::DblpFetcher;
pub use error::FetchError;
pub use http_client::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_READ_TIMEOUT_SECS, HttpSettings};
pub use scraper::{ScraperClient, encode_target_url};
pub use sink::TextSink;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::model::Entry;
use crate::normalize::correct_line_breaks;

/// Receiver for fetched entries.
///
/// The pipeline checks [`is_cancelled`](Self::is_cancelled) once before each
/// identifier; a fetch already in flight is never interrupted.
pub trait ImportSink: Send {
    /// Accepts one fetched entry.
    fn report_entry(&mut self, entry: Entry);

    /// Reports `current` of `total` work items done.
    fn report_progress(&mut self, current: usize, total: usize);

    /// Returns true once the caller asked to stop.
    fn is_cancelled(&self) -> bool;

    /// Records a non-fatal diagnostic.
    fn report_diagnostic(&mut self, message: &str);
}

/// Shared cooperative stop flag.
///
/// Clones share the same flag, so a Ctrl-C handler can hold one clone while
/// the sink holds another.
#[derive(Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a stop. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for CancellationFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CancellationFlag")
            .field(&self.is_cancelled())
            .finish()
    }
}

/// A remote source that returns one entry per identifier.
///
/// This trait uses `async_trait` so sources can sit behind
/// `Box<dyn IdentifierSource>`.
#[async_trait]
pub trait IdentifierSource: Send + Sync {
    /// Returns the source's display name (e.g. "arXiv").
    fn name(&self) -> &str;

    /// Describes the accepted identifier grammar for diagnostics.
    fn identifier_grammar(&self) -> &str;

    /// Strips URL prefixes and other noise from a raw identifier.
    fn normalize_identifier(&self, raw: &str) -> String;

    /// Returns true if a normalized identifier matches the source's grammar.
    fn validate_identifier(&self, identifier: &str) -> bool;

    /// Fetches and parses the record for a normalized identifier.
    ///
    /// Returns `Ok(None)` when the source answered but held no record.
    async fn fetch_entry(&self, identifier: &str) -> Result<Option<Entry>, FetchError>;
}

/// Counters for one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchSummary {
    /// Identifiers in the query
    pub requested: usize,
    /// Entries handed to the sink
    pub imported: usize,
    /// Identifiers that produced a diagnostic instead of an entry
    pub failed: usize,
    /// True when the stop flag ended the run early
    pub cancelled: bool,
}

impl FetchSummary {
    /// Returns true if every requested identifier produced an entry.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.failed == 0 && self.imported == self.requested
    }
}

/// Splits a query on commas, semicolons and whitespace.
#[must_use]
pub fn split_identifiers(query: &str) -> Vec<String> {
    query
        .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

/// Drives `source` over `identifiers`, reporting each outcome to `sink`.
///
/// Progress is reported after every identifier, including failed ones.
pub async fn fetch_identifiers(
    source: &dyn IdentifierSource,
    identifiers: &[String],
    sink: &mut dyn ImportSink,
) -> FetchSummary {
    let total = identifiers.len();
    let mut summary = FetchSummary {
        requested: total,
        ..FetchSummary::default()
    };

    for (index, raw) in identifiers.iter().enumerate() {
        if sink.is_cancelled() {
            info!(
                source = source.name(),
                done = index,
                total,
                "Fetch cancelled"
            );
            summary.cancelled = true;
            break;
        }

        let identifier = source.normalize_identifier(raw);
        if source.validate_identifier(&identifier) {
            match source.fetch_entry(&identifier).await {
                Ok(Some(mut entry)) => {
                    entry.map_fields(|_, value| correct_line_breaks(value));
                    debug!(identifier = %identifier, "Entry fetched");
                    sink.report_entry(entry);
                    summary.imported += 1;
                }
                Ok(None) => {
                    summary.failed += 1;
                    sink.report_diagnostic(&format!(
                        "{}: no record found for '{identifier}'",
                        source.name()
                    ));
                }
                Err(e) => {
                    warn!(identifier = %identifier, error = %e, "Fetch failed");
                    summary.failed += 1;
                    sink.report_diagnostic(&e.to_string());
                }
            }
        } else {
            summary.failed += 1;
            let error =
                FetchError::invalid_identifier(raw, source.name(), source.identifier_grammar());
            sink.report_diagnostic(&error.to_string());
        }

        sink.report_progress(index + 1, total);
    }
    summary
}

/// Runs identifier-list queries against one source.
pub struct FetchPipeline {
    source: Box<dyn IdentifierSource>,
}

impl FetchPipeline {
    #[must_use]
    pub fn new(source: Box<dyn IdentifierSource>) -> Self {
        Self { source }
    }

    #[must_use]
    pub fn source(&self) -> &dyn IdentifierSource {
        self.source.as_ref()
    }

    /// Splits `query` into identifiers and fetches each one.
    #[tracing::instrument(skip(self, sink), fields(source = self.source.name()))]
    pub async fn run(&self, query: &str, sink: &mut dyn ImportSink) -> FetchSummary {
        let identifiers = split_identifiers(query);
        info!(count = identifiers.len(), "Starting fetch");
        let summary = fetch_identifiers(self.source.as_ref(), &identifiers, sink).await;
        info!(
            imported = summary.imported,
            failed = summary.failed,
            cancelled = summary.cancelled,
            "Fetch finished"
        );
        summary
    }
}

impl fmt::Debug for FetchPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchPipeline")
            .field("source", &self.source.name())
            .finish()
    }
}
