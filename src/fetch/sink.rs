//! Minimal non-interactive [`ImportSink`].

use std::collections::HashSet;
use std::io::Write;

use tracing::debug;

use super::{CancellationFlag, ImportSink};
use crate::model::{Entry, ParseResult};

/// Collects entries in memory and writes progress and diagnostics as text.
///
/// Diagnostics are deduplicated by exact message.
pub struct TextSink<W: Write> {
    out: W,
    entries: Vec<Entry>,
    diagnostics: Vec<String>,
    seen: HashSet<String>,
    stop: CancellationFlag,
}

impl<W: Write> TextSink<W> {
    #[must_use]
    pub fn new(out: W) -> Self {
        Self::with_cancellation(out, CancellationFlag::new())
    }

    /// Creates a sink that reports cancelled once `stop` is set.
    #[must_use]
    pub fn with_cancellation(out: W, stop: CancellationFlag) -> Self {
        Self {
            out,
            entries: Vec::new(),
            diagnostics: Vec::new(),
            seen: HashSet::new(),
            stop,
        }
    }

    #[must_use]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    #[must_use]
    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    /// Converts the collected entries and diagnostics into a [`ParseResult`].
    #[must_use]
    pub fn into_result(self) -> ParseResult {
        let mut result = ParseResult::new();
        for entry in self.entries {
            result.add_entry(entry);
        }
        for message in self.diagnostics {
            result.add_warning(message);
        }
        result
    }

    fn write_line(&mut self, line: &str) {
        if let Err(e) = writeln!(self.out, "{line}") {
            debug!(error = %e, "Cannot write to sink output");
        }
    }
}

impl<W: Write + Send> ImportSink for TextSink<W> {
    fn report_entry(&mut self, entry: Entry) {
        self.entries.push(entry);
    }

    fn report_progress(&mut self, current: usize, total: usize) {
        self.write_line(&format!("[{current}/{total}]"));
    }

    fn is_cancelled(&self) -> bool {
        self.stop.is_cancelled()
    }

    fn report_diagnostic(&mut self, message: &str) {
        if self.seen.insert(message.to_string()) {
            self.diagnostics.push(message.to_string());
            self.write_line(&format!("warning: {message}"));
        }
    }
}
