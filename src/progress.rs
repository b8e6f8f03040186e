//! Progress bar sink for fetch runs.

use std::collections::HashSet;

use bibimport_core::{CancellationFlag, Entry, ImportSink};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

/// Collects entries and drives an optional progress bar on stderr.
pub(crate) struct ProgressSink {
    bar: Option<ProgressBar>,
    entries: Vec<Entry>,
    seen: HashSet<String>,
    stop: CancellationFlag,
}

impl ProgressSink {
    pub(crate) fn new(show_bar: bool, stop: CancellationFlag) -> Self {
        let bar = show_bar.then(|| {
            let bar = ProgressBar::new(0);
            bar.set_style(
                ProgressStyle::with_template("{bar:30} {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            bar
        });
        Self {
            bar,
            entries: Vec::new(),
            seen: HashSet::new(),
            stop,
        }
    }

    /// Number of distinct diagnostics reported.
    pub(crate) fn diagnostic_count(&self) -> usize {
        self.seen.len()
    }

    /// Clears the bar and returns the collected entries.
    pub(crate) fn finish(self) -> Vec<Entry> {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
        self.entries
    }
}

impl ImportSink for ProgressSink {
    fn report_entry(&mut self, entry: Entry) {
        if let Some(bar) = &self.bar {
            bar.set_message(entry.key().unwrap_or("").to_string());
        }
        self.entries.push(entry);
    }

    fn report_progress(&mut self, current: usize, total: usize) {
        if let Some(bar) = &self.bar {
            bar.set_length(total as u64);
            bar.set_position(current as u64);
        }
    }

    fn is_cancelled(&self) -> bool {
        self.stop.is_cancelled()
    }

    fn report_diagnostic(&mut self, message: &str) {
        if !self.seen.insert(message.to_string()) {
            return;
        }
        match &self.bar {
            Some(bar) => bar.suspend(|| warn!("{message}")),
            None => warn!("{message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_sink_dedups_diagnostics() {
        let mut sink = ProgressSink::new(false, CancellationFlag::new());
        sink.report_diagnostic("same");
        sink.report_diagnostic("same");
        sink.report_diagnostic("other");
        assert_eq!(sink.diagnostic_count(), 2);
    }

    #[test]
    fn test_progress_sink_collects_entries() {
        let mut sink = ProgressSink::new(false, CancellationFlag::new());
        sink.report_entry(Entry::new("misc"));
        sink.report_progress(1, 1);
        assert_eq!(sink.finish().len(), 1);
    }
}
