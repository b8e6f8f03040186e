//! DBLP search and record page extraction.
//!
//! DBLP record pages carry the BibTeX text inside `<pre>` blocks. The first
//! block is the record itself; a second one, when present, is the
//! cross-referenced proceedings record.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use reqwest::Client;
use tracing::{debug, info, warn};
use url::Url;

use super::http_client::get_text;
use super::{FetchError, FetchSummary, HttpSettings, ImportSink};
use crate::error::ImportError;
use crate::format::BibtexFormat;
use crate::model::{EntryTypeRegistry, ParseResult};
use crate::normalize::{CaseKeeper, clean_scraped_title, collapse_whitespace, compile_static_regex};

const FORMAT_NAME: &str = "DBLP";

const PRE_OPEN: &str = "<pre>";
const PRE_CLOSE: &str = "</pre>";

static BACKLINK_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r#"<a href="[^"]*">DBLP</a>"#));

static RECORD_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r#"href="([^"]*/rec/bibtex/[^"]*)""#));

/// Rewrites a free-text query the way DBLP search expects it.
#[must_use]
pub fn clean_query(query: &str) -> String {
    collapse_whitespace(&query.replace('&', " and "))
}

/// Returns record page links from a search result page, deduplicated in order.
#[must_use]
pub fn record_links(page: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    RECORD_LINK_RE
        .captures_iter(page)
        .map(|caps| caps[1].to_string())
        .filter(|link| seen.insert(link.clone()))
        .collect()
}

/// Fetches DBLP record pages and search results.
pub struct DblpFetcher {
    client: Client,
    base_url: String,
    bibtex: BibtexFormat,
    case_keeper: Option<CaseKeeper>,
}

impl DblpFetcher {
    pub const DEFAULT_BASE_URL: &'static str = "https://dblp.org";

    /// Creates a fetcher for the public DBLP site.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] when the HTTP client cannot be built.
    pub fn new(
        settings: &HttpSettings,
        entry_types: Arc<EntryTypeRegistry>,
    ) -> Result<Self, FetchError> {
        Self::with_base_url(settings, entry_types, Self::DEFAULT_BASE_URL)
    }

    /// Creates a fetcher for a custom base URL (used for testing).
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] when the HTTP client cannot be built.
    pub fn with_base_url(
        settings: &HttpSettings,
        entry_types: Arc<EntryTypeRegistry>,
        base_url: impl Into<String>,
    ) -> Result<Self, FetchError> {
        Ok(Self {
            client: settings.build_client()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bibtex: BibtexFormat::new(entry_types),
            case_keeper: None,
        })
    }

    /// Enables case protection of fetched titles.
    #[must_use]
    pub fn with_case_keeper(mut self, keeper: CaseKeeper) -> Self {
        self.case_keeper = Some(keeper);
        self
    }

    /// Returns the search URL for a query.
    #[must_use]
    pub fn search_url(&self, query: &str) -> String {
        format!(
            "{}/search?q={}",
            self.base_url,
            urlencoding::encode(&clean_query(query))
        )
    }

    /// Extracts every BibTeX record from a DBLP record page.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::Format`] when the page holds no `<pre>` block.
    pub fn extract_from_page(&self, page: &str) -> Result<ParseResult, ImportError> {
        let Some(start) = page.find(PRE_OPEN) else {
            return Err(ImportError::format(
                FORMAT_NAME,
                "page contains no <pre> BibTeX block",
            ));
        };

        let mut result = ParseResult::new();
        let mut rest = &page[start..];
        while let Some(open) = rest.find(PRE_OPEN) {
            let body = &rest[open + PRE_OPEN.len()..];
            let (block, remaining) = body
                .find(PRE_CLOSE)
                .map_or((body, ""), |close| (&body[..close], &body[close + PRE_CLOSE.len()..]));
            let cleaned = BACKLINK_RE.replace_all(block, "DBLP");
            result.merge(self.bibtex.parse_text(&cleaned));
            rest = remaining;
        }

        if let Some(keeper) = &self.case_keeper {
            for entry in result.entries_mut() {
                if let Some(title) = entry.field("title").map(str::to_string) {
                    entry.set_field("title", clean_scraped_title(&title, Some(keeper)));
                }
            }
        }
        Ok(result)
    }

    /// Fetches and extracts one record page.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Remote`] on transport failure and
    /// [`FetchError::Parse`] when the page holds no record.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_page(&self, url: &str) -> Result<ParseResult, FetchError> {
        let page = get_text(&self.client, url, url).await?;
        self.extract_from_page(&page)
            .map_err(|e| FetchError::from_import(url, e))
    }

    fn absolute_link(&self, link: &str) -> String {
        Url::parse(&self.base_url)
            .and_then(|base| base.join(link))
            .map_or_else(|_| link.to_string(), String::from)
    }

    /// Searches DBLP and imports every listed record.
    ///
    /// Record pages are fetched one at a time; the stop flag is checked before
    /// each. Entries whose citation key was already imported are dropped.
    #[tracing::instrument(skip(self, sink))]
    pub async fn search(&self, query: &str, sink: &mut dyn ImportSink) -> FetchSummary {
        let mut summary = FetchSummary::default();
        let search_page = match get_text(&self.client, &self.search_url(query), query).await {
            Ok(page) => page,
            Err(e) => {
                warn!(error = %e, "DBLP search failed");
                sink.report_diagnostic(&e.to_string());
                return summary;
            }
        };

        let links = record_links(&search_page);
        let total = links.len();
        summary.requested = total;
        info!(records = total, "DBLP search returned records");

        let mut keys = HashSet::new();
        for (index, link) in links.iter().enumerate() {
            if sink.is_cancelled() {
                info!(done = index, total, "DBLP import cancelled");
                summary.cancelled = true;
                break;
            }

            match self.fetch_page(&self.absolute_link(link)).await {
                Ok(result) => {
                    for warning in result.warnings() {
                        sink.report_diagnostic(warning);
                    }
                    for entry in result.into_entries() {
                        if let Some(key) = entry.key() {
                            if !keys.insert(key.to_string()) {
                                debug!(key, "Dropping duplicate DBLP record");
                                sink.report_diagnostic(&format!(
                                    "duplicate citation key '{key}' dropped"
                                ));
                                continue;
                            }
                        }
                        sink.report_entry(entry);
                        summary.imported += 1;
                    }
                }
                Err(e) => {
                    warn!(link = %link, error = %e, "DBLP record fetch failed");
                    summary.failed += 1;
                    sink.report_diagnostic(&e.to_string());
                }
            }
            sink.report_progress(index + 1, total);
        }
        summary
    }
}

impl fmt::Debug for DblpFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DblpFetcher")
            .field("base_url", &self.base_url)
            .field("protects_case", &self.case_keeper.is_some())
            .finish_non_exhaustive()
    }
}
