//! Date and month helpers.

use std::sync::LazyLock;

use regex::Regex;

use super::compile_static_regex;

/// Three-letter month abbreviations, January first.
pub const MONTH_ABBREVIATIONS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

static FOUR_DIGIT_YEAR: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"\d{4}"));

/// Year and month pulled out of a free-text date.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateParts {
    /// Last token of the date
    pub year: Option<String>,
    /// First token, when the date has more than one
    pub month: Option<String>,
}

/// Returns the abbreviation for a 1-based month number.
#[must_use]
pub fn month_abbreviation(month: u32) -> Option<&'static str> {
    let index = usize::try_from(month.checked_sub(1)?).ok()?;
    MONTH_ABBREVIATIONS.get(index).copied()
}

/// Splits a whitespace-separated date such as `"January, 1990"`.
///
/// The last token is the year. With more than one token, the first token,
/// minus a trailing comma, is the month.
#[must_use]
pub fn split_date(date: &str) -> DateParts {
    let tokens: Vec<&str> = date.split_whitespace().collect();
    let Some(last) = tokens.last() else {
        return DateParts::default();
    };
    let month = if tokens.len() > 1 {
        Some(tokens[0].trim_end_matches(',').to_string()).filter(|m| !m.is_empty())
    } else {
        None
    };
    DateParts {
        year: Some((*last).to_string()),
        month,
    }
}

/// Returns the text before the first `-` of an ISO-style datestamp.
#[must_use]
pub fn year_from_datestamp(datestamp: &str) -> Option<String> {
    let year = datestamp.trim().split('-').next()?.trim();
    (!year.is_empty()).then(|| year.to_string())
}

/// Returns the first run of four digits.
#[must_use]
pub fn first_year(text: &str) -> Option<String> {
    FOUR_DIGIT_YEAR.find(text).map(|m| m.as_str().to_string())
}
