//! arXiv OAI2 `GetRecord` source.

use std::fmt;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use tracing::debug;

use super::http_client::get_text;
use super::{FetchError, HttpSettings, IdentifierSource};
use crate::format::parse_oai2;
use crate::model::Entry;
use crate::normalize::compile_static_regex;
use crate::normalize::date::month_abbreviation;

static ARXIV_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r"(?i)^(?:\d{4}\.\d{4,5}|[a-z\-]+/\d{7})(?:v\d+)?$")
});

static ARXIV_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"(?i)^(?:arxiv:|https?://(?:www\.)?arxiv\.org/abs/)"));

/// `YYMM.` prefix of new-style identifiers.
static NEW_STYLE_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"^(\d{2})(\d{2})\."));

/// Fetches single records from the arXiv OAI2 endpoint.
pub struct ArxivSource {
    client: Client,
    base_url: String,
}

impl ArxivSource {
    /// Public arXiv OAI2 endpoint.
    pub const DEFAULT_BASE_URL: &'static str = "http://export.arxiv.org/oai2";

    /// Creates a source for the public endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] when the HTTP client cannot be built.
    pub fn new(settings: &HttpSettings) -> Result<Self, FetchError> {
        Self::with_base_url(settings, Self::DEFAULT_BASE_URL)
    }

    /// Creates a source for a custom endpoint (used for testing).
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] when the HTTP client cannot be built.
    pub fn with_base_url(
        settings: &HttpSettings,
        base_url: impl Into<String>,
    ) -> Result<Self, FetchError> {
        Ok(Self {
            client: settings.build_client()?,
            base_url: base_url.into(),
        })
    }

    /// Returns the `GetRecord` URL for a normalized identifier.
    #[must_use]
    pub fn record_url(&self, identifier: &str) -> String {
        format!(
            "{}?verb=GetRecord&identifier=oai:arXiv.org:{identifier}&metadataPrefix=arXiv",
            self.base_url
        )
    }
}

/// Fills `year` and `month` from a new-style `YYMM.NNNN` identifier.
fn apply_identifier_date(entry: &mut Entry, identifier: &str) {
    let Some(caps) = NEW_STYLE_DATE_RE.captures(identifier) else {
        return;
    };
    entry.set_field_if_absent("year", format!("20{}", &caps[1]));
    if let Some(month) = caps[2].parse().ok().and_then(month_abbreviation) {
        entry.set_field_if_absent("month", month);
    }
}

#[async_trait]
impl IdentifierSource for ArxivSource {
    fn name(&self) -> &str {
        "arXiv"
    }

    fn identifier_grammar(&self) -> &str {
        "an identifier like 0901.0001 or math/0309136"
    }

    fn normalize_identifier(&self, raw: &str) -> String {
        let mut identifier = ARXIV_PREFIX_RE.replace(raw.trim(), "").into_owned();
        // old-style archive.subclass/NNNNNNN drops the subclass
        if let Some((dot, slash)) = identifier
            .find('.')
            .zip(identifier.find('/'))
            .filter(|(dot, slash)| dot < slash)
        {
            identifier.replace_range(dot..slash, "");
        }
        identifier
    }

    fn validate_identifier(&self, identifier: &str) -> bool {
        ARXIV_ID_RE.is_match(identifier)
    }

    #[tracing::instrument(skip(self), fields(source = "arXiv"))]
    async fn fetch_entry(&self, identifier: &str) -> Result<Option<Entry>, FetchError> {
        let body = get_text(&self.client, &self.record_url(identifier), identifier).await?;
        let mut result =
            parse_oai2(&body).map_err(|e| FetchError::from_import(identifier, e))?;
        let Some(mut entry) = result.take_first() else {
            debug!("OAI2 response held no record");
            return Ok(None);
        };
        entry.set_entry_type("article");
        apply_identifier_date(&mut entry, identifier);
        Ok(Some(entry))
    }
}

impl fmt::Debug for ArxivSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArxivSource")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}
