//! Shared User-Agent string for every outgoing request.
//!
//! Fetch sources, the DBLP fetcher and the scraper lookup all identify
//! themselves the same way.

/// Default User-Agent (tool name plus crate version).
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("bibimport/{version} (bibliographic-import-tool)")
}
