//! `CiteSeer` OAI `GetRecord` source.

use std::fmt;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use tracing::{debug, info};

use super::http_client::get_text;
use super::{FetchError, FetchSummary, HttpSettings, IdentifierSource, ImportSink, fetch_identifiers};
use crate::format::{CiteSeerRecords, parse_citeseer};
use crate::model::Entry;
use crate::normalize::compile_static_regex;

static URL_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"(?i)^https?://[^/]+/"));

static DIGITS_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"\d+"));

/// Canonical page URL prefix stored in `citeseerurl`.
const PAGE_URL_PREFIX: &str = "http://citeseer.ist.psu.edu/";

/// Fetches records from the `CiteSeer` OAI endpoint.
pub struct CiteSeerSource {
    client: Client,
    base_url: String,
}

impl CiteSeerSource {
    /// Public `CiteSeer` OAI endpoint.
    pub const DEFAULT_BASE_URL: &'static str = "http://cs1.ist.psu.edu/cgi-bin/oai.cgi";

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

    /// Returns the `GetRecord` URL for a record number.
    #[must_use]
    pub fn record_url(&self, identifier: &str) -> String {
        format!(
            "{}?verb=GetRecord&metadataPrefix=oai_citeseer&identifier=oai:CiteSeerPSU:{identifier}",
            self.base_url
        )
    }

    /// Fetches one record with its citation list.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Remote`] for transport problems and
    /// [`FetchError::Protocol`] when the feed reports an error.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_record(&self, identifier: &str) -> Result<CiteSeerRecords, FetchError> {
        let body = get_text(&self.client, &self.record_url(identifier), identifier).await?;
        let mut records =
            parse_citeseer(&body).map_err(|e| FetchError::from_import(identifier, e))?;
        for entry in records.result.entries_mut() {
            entry.set_field("citeseerurl", format!("{PAGE_URL_PREFIX}{identifier}.html"));
        }
        Ok(records)
    }

    /// Fetches every record cited by `identifier`, in discovery order.
    ///
    /// A failure to fetch the citing record itself is a single diagnostic.
    #[tracing::instrument(skip(self, sink))]
    pub async fn fetch_citations(&self, identifier: &str, sink: &mut dyn ImportSink) -> FetchSummary {
        let identifier = self.normalize_identifier(identifier);
        if !self.validate_identifier(&identifier) {
            let error =
                FetchError::invalid_identifier(&identifier, self.name(), self.identifier_grammar());
            sink.report_diagnostic(&error.to_string());
            return FetchSummary {
                requested: 1,
                failed: 1,
                ..FetchSummary::default()
            };
        }

        let records = match self.fetch_record(&identifier).await {
            Ok(records) => records,
            Err(e) => {
                sink.report_diagnostic(&e.to_string());
                return FetchSummary {
                    requested: 1,
                    failed: 1,
                    ..FetchSummary::default()
                };
            }
        };
        info!(cited = records.cited.len(), "Fetching cited records");
        fetch_identifiers(self, &records.cited, sink).await
    }
}

#[async_trait]
impl IdentifierSource for CiteSeerSource {
    fn name(&self) -> &str {
        "CiteSeer"
    }

    fn identifier_grammar(&self) -> &str {
        "a numeric record identifier (digits only)"
    }

    fn normalize_identifier(&self, raw: &str) -> String {
        let without_host = URL_PREFIX_RE.replace(raw.trim(), "");
        let trimmed = without_host
            .strip_suffix(".html")
            .unwrap_or(without_host.as_ref());
        DIGITS_RE
            .find(trimmed)
            .map_or_else(|| trimmed.to_string(), |m| m.as_str().to_string())
    }

    fn validate_identifier(&self, identifier: &str) -> bool {
        !identifier.is_empty() && identifier.chars().all(|c| c.is_ascii_digit())
    }

    async fn fetch_entry(&self, identifier: &str) -> Result<Option<Entry>, FetchError> {
        let mut records = self.fetch_record(identifier).await?;
        let entry = records.result.take_first();
        if entry.is_none() {
            debug!("CiteSeer response held no record");
        }
        Ok(entry)
    }
}

impl fmt::Debug for CiteSeerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CiteSeerSource")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn source() -> CiteSeerSource {
        CiteSeerSource::new(&HttpSettings::default()).unwrap()
    }

    #[test]
    fn test_normalize_strips_page_url() {
        let source = source();
        assert_eq!(
            source.normalize_identifier("http://citeseer.ist.psu.edu/123456.html"),
            "123456"
        );
        assert_eq!(source.normalize_identifier(" 42 "), "42");
        assert_eq!(source.normalize_identifier("oai:CiteSeerPSU:777"), "777");
    }

    #[test]
    fn test_normalize_keeps_text_without_digits() {
        assert_eq!(source().normalize_identifier("abc"), "abc");
    }

    #[test]
    fn test_validate_digits_only() {
        let source = source();
        assert!(source.validate_identifier("123"));
        assert!(!source.validate_identifier("12a"));
        assert!(!source.validate_identifier(""));
    }

    #[test]
    fn test_record_url() {
        let source = CiteSeerSource::with_base_url(&HttpSettings::default(), "http://h/oai").unwrap();
        assert_eq!(
            source.record_url("42"),
            "http://h/oai?verb=GetRecord&metadataPrefix=oai_citeseer&identifier=oai:CiteSeerPSU:42"
        );
    }
}
