//! Shared HTTP client construction policy for fetch sources.
//!
//! Every remote source builds its client here so timeouts, User-Agent and
//! compression stay consistent. There are no retries: a failed request is
//! reported once and the caller moves on.

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use super::FetchError;
use crate::user_agent;

/// Default connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
/// Default whole-request timeout in seconds.
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 30;

/// Timeouts applied to every fetch client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpSettings {
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            read_timeout_secs: DEFAULT_READ_TIMEOUT_SECS,
        }
    }
}

impl HttpSettings {
    /// Builds a client with these timeouts, gzip and the shared User-Agent.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] when the builder fails.
    pub fn build_client(&self) -> Result<Client, FetchError> {
        Client::builder()
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .timeout(Duration::from_secs(self.read_timeout_secs))
            .user_agent(user_agent::default_user_agent())
            .gzip(true)
            .build()
            .map_err(|e| FetchError::Client {
                reason: e.to_string(),
            })
    }
}

/// GETs `url` and returns the body as text.
///
/// # Errors
///
/// Returns [`FetchError::Remote`] on transport failure, a non-success status
/// or an empty body.
#[tracing::instrument(skip(client), fields(target = %target))]
pub(crate) async fn get_text(client: &Client, url: &str, target: &str) -> Result<String, FetchError> {
    debug!(url = %url, "Sending request");
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| FetchError::remote(target, &format!("request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let reason = match status.as_u16() {
            404 => "not found (HTTP 404)".to_string(),
            429 => "rate limited by the server (HTTP 429)".to_string(),
            s if s >= 500 => format!("server unavailable (HTTP {s})"),
            s => format!("server returned HTTP {s}"),
        };
        return Err(FetchError::remote(target, &reason));
    }

    let body = response
        .text()
        .await
        .map_err(|e| FetchError::remote(target, &format!("cannot read response body: {e}")))?;
    if body.trim().is_empty() {
        return Err(FetchError::remote(target, "empty response body"));
    }
    debug!(body_len = body.len(), "Response received");
    Ok(body)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeouts() {
        let settings = HttpSettings::default();
        assert_eq!(settings.connect_timeout_secs, DEFAULT_CONNECT_TIMEOUT_SECS);
        assert_eq!(settings.read_timeout_secs, DEFAULT_READ_TIMEOUT_SECS);
    }

    #[test]
    fn test_build_client_succeeds() {
        let settings = HttpSettings {
            connect_timeout_secs: 1,
            read_timeout_secs: 2,
        };
        assert!(settings.build_client().is_ok());
    }
}
