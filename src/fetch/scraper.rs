//! Best-effort single-entry lookup through a remote scraper service.
//!
//! The service takes a web page URL and answers with BibTeX text describing
//! it. Lookups never fail loudly: any problem is logged and yields `None`.

use std::fmt;
use std::sync::Arc;

use reqwest::Client;
use tracing::{debug, warn};

use super::http_client::get_text;
use super::{FetchError, HttpSettings};
use crate::format::BibtexFormat;
use crate::model::{Entry, EntryTypeRegistry};
use crate::normalize::{CaseKeeper, clean_scraped_title};

/// Percent-encodes the characters that would break the service query.
///
/// `%` is encoded first so the escapes added afterwards stay intact.
#[must_use]
pub fn encode_target_url(url: &str) -> String {
    url.replace('%', "%25")
        .replace(':', "%3A")
        .replace('/', "%2F")
        .replace('?', "%3F")
        .replace('&', "%26")
        .replace('=', "%3D")
}

/// Client for the scraper service.
pub struct ScraperClient {
    client: Client,
    service_url: String,
    bibtex: BibtexFormat,
    case_keeper: Option<CaseKeeper>,
}

impl ScraperClient {
    /// Public scraper service endpoint.
    pub const DEFAULT_SERVICE_URL: &'static str = "http://scraper.bibsonomy.org/service";

    /// Creates a client for the public service.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] when the HTTP client cannot be built.
    pub fn new(
        settings: &HttpSettings,
        entry_types: Arc<EntryTypeRegistry>,
    ) -> Result<Self, FetchError> {
        Self::with_service_url(settings, entry_types, Self::DEFAULT_SERVICE_URL)
    }

    /// Creates a client for a custom service endpoint (used for testing).
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] when the HTTP client cannot be built.
    pub fn with_service_url(
        settings: &HttpSettings,
        entry_types: Arc<EntryTypeRegistry>,
        service_url: impl Into<String>,
    ) -> Result<Self, FetchError> {
        Ok(Self {
            client: settings.build_client()?,
            service_url: service_url.into(),
            bibtex: BibtexFormat::new(entry_types),
            case_keeper: None,
        })
    }

    /// Enables case protection of returned titles.
    #[must_use]
    pub fn with_case_keeper(mut self, keeper: CaseKeeper) -> Self {
        self.case_keeper = Some(keeper);
        self
    }

    /// Returns the service request URL for a target page.
    #[must_use]
    pub fn request_url(&self, target: &str) -> String {
        format!(
            "{}?url={}&format=bibtex",
            self.service_url,
            encode_target_url(target)
        )
    }

    /// Looks up `target` and returns the first entry the service describes.
    ///
    /// Returns `None` on any network failure or when the answer holds no entry.
    #[tracing::instrument(skip(self))]
    pub async fn lookup(&self, target: &str) -> Option<Entry> {
        let body = match get_text(&self.client, &self.request_url(target), target).await {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Scraper lookup failed");
                return None;
            }
        };

        let mut result = self.bibtex.parse_text(&body);
        for warning in result.warnings() {
            debug!(warning, "Scraper response warning");
        }
        let mut entry = result.take_first()?;
        if let Some(title) = entry.field("title").map(str::to_string) {
            entry.set_field(
                "title",
                clean_scraped_title(&title, self.case_keeper.as_ref()),
            );
        }
        Some(entry)
    }
}

impl fmt::Debug for ScraperClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScraperClient")
            .field("service_url", &self.service_url)
            .field("protects_case", &self.case_keeper.is_some())
            .finish_non_exhaustive()
    }
}
