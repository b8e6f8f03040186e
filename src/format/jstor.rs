//! `JStor` tab-delimited citation export parser.

use tracing::debug;

use super::{FormatPriority, ImportFormat, decode_input};
use crate::error::{FieldError, ImportError};
use crate::model::{Entry, ParseResult};
use crate::normalize::authors::{fix_author_last_first, semicolon_list_to_and};
use crate::normalize::date::split_date;
use crate::normalize::normalize_page_range;

const FORMAT_NAME: &str = "JStor";

/// Token that starts the header line.
const HEADER_TOKEN: &str = "Item Type";

/// Item type of full-length journal articles.
const ARTICLE_ITEM_TYPE: &str = "FLA";

/// Column indices of the export.
mod column {
    pub const ITEM_TYPE: usize = 0;
    pub const TITLE: usize = 2;
    pub const AUTHOR: usize = 4;
    pub const JOURNAL: usize = 7;
    pub const VOLUME: usize = 9;
    pub const NUMBER: usize = 11;
    pub const DATE: usize = 14;
    pub const PAGES: usize = 16;
    pub const URL: usize = 18;
    pub const ISSN: usize = 20;
    pub const ABSTRACT: usize = 22;
    pub const KEYWORDS: usize = 24;
    pub const COPYRIGHT: usize = 26;
}

/// Columns copied verbatim.
const PLAIN_COLUMNS: &[(usize, &str)] = &[
    (column::TITLE, "title"),
    (column::JOURNAL, "journal"),
    (column::VOLUME, "volume"),
    (column::NUMBER, "number"),
    (column::URL, "url"),
    (column::ISSN, "issn"),
    (column::ABSTRACT, "abstract"),
    (column::KEYWORDS, "keywords"),
    (column::COPYRIGHT, "copyright"),
];

fn is_terminator(line: &str) -> bool {
    let line = line.trim();
    !line.is_empty() && line.chars().all(|c| c == '-')
}

fn parse_row(columns: &[&str], row: usize, result: &mut ParseResult) -> Entry {
    let cell = |index: usize| columns.get(index).map(|c| c.trim()).filter(|c| !c.is_empty());

    let entry_type = if cell(column::ITEM_TYPE) == Some(ARTICLE_ITEM_TYPE) {
        "article"
    } else {
        "misc"
    };
    let mut entry = Entry::new(entry_type);

    for (index, field) in PLAIN_COLUMNS {
        if let Some(value) = cell(*index) {
            entry.set_field(field, value);
        }
    }
    if let Some(authors) = cell(column::AUTHOR) {
        entry.set_field("author", fix_author_last_first(&semicolon_list_to_and(authors)));
    }
    if let Some(date) = cell(column::DATE) {
        let parts = split_date(date);
        if let Some(year) = parts.year {
            entry.set_field("year", year);
        }
        if let Some(month) = parts.month {
            entry.set_field("month", month);
        }
    }
    if let Some(pages) = cell(column::PAGES) {
        entry.set_field("pages", normalize_page_range(pages));
    }

    if columns.len() <= column::COPYRIGHT {
        result.add_field_error(&FieldError::new(
            format!("row {row}"),
            format!(
                "only {} of {} columns present",
                columns.len(),
                column::COPYRIGHT + 1
            ),
        ));
    }
    entry
}

/// Import format for `JStor` citation exports.
///
/// The detector accepts any decodable text; this format is tried last.
#[derive(Debug, Default)]
pub struct JstorFormat;

impl JstorFormat {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ImportFormat for JstorFormat {
    fn name(&self) -> &str {
        "jstor"
    }

    fn description(&self) -> &str {
        "JStor tab-delimited citation export"
    }

    fn priority(&self) -> FormatPriority {
        FormatPriority::Permissive
    }

    fn recognizes(&self, input: &[u8]) -> bool {
        !input.is_empty() && decode_input(input, FORMAT_NAME).is_ok()
    }

    #[tracing::instrument(skip(self, input), fields(input_len = input.len()))]
    fn parse(&self, input: &[u8]) -> Result<ParseResult, ImportError> {
        let decoded = decode_input(input, FORMAT_NAME)?;
        let mut result = ParseResult::new();
        result.set_encoding(decoded.encoding.label());

        let mut lines = decoded.text.lines();
        if !lines.any(|line| line.starts_with(HEADER_TOKEN)) {
            result.add_warning(format!("no '{HEADER_TOKEN}' header line found"));
            return Ok(result);
        }

        for (row, line) in lines.enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            if is_terminator(line) {
                break;
            }
            let columns: Vec<&str> = line.split('\t').collect();
            let entry = parse_row(&columns, row + 1, &mut result);
            result.add_entry(entry);
        }
        debug!(entries = result.len(), "JStor export parsed");
        Ok(result)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn row(cells: &[(usize, &str)]) -> String {
        let width = cells.iter().map(|(i, _)| i + 1).max().unwrap_or(0);
        let mut columns = vec![""; width];
        for (index, value) in cells {
            columns[*index] = *value;
        }
        columns.join("\t")
    }

    fn export(rows: &[String]) -> String {
        format!(
            "JSTOR Citation List\n\nItem Type\t\tTitle\t\tAuthor\n{}\n------\ntrailing\tjunk\n",
            rows.join("\n")
        )
    }

    #[test]
    fn test_full_row() {
        let line = "FLA\t\tTitle X\t\tSmith, J.; Doe, A.\t\t\tJournal Y\t\tVol. 3\t\t12\t\t\tJanuary, 1990\t\t1-10\t\thttp://j.example/1\t\t0001-0002\t\tAbs\t\tkw\t\t(c) JSTOR";
        let result = JstorFormat::new()
            .parse(export(&[line.to_string()]).as_bytes())
            .unwrap();
        assert_eq!(result.len(), 1);
        let entry = &result.entries()[0];
        assert_eq!(entry.entry_type(), "article");
        assert_eq!(entry.field("title"), Some("Title X"));
        assert_eq!(entry.field("author"), Some("Smith, J. and Doe, A."));
        assert_eq!(entry.field("journal"), Some("Journal Y"));
        assert_eq!(entry.field("volume"), Some("Vol. 3"));
        assert_eq!(entry.field("number"), Some("12"));
        assert_eq!(entry.field("year"), Some("1990"));
        assert_eq!(entry.field("month"), Some("January"));
        assert_eq!(entry.field("pages"), Some("1--10"));
        assert_eq!(entry.field("copyright"), Some("(c) JSTOR"));
        assert_eq!(result.warning_count(), 0);
    }

    #[test]
    fn test_short_row_keeps_available_fields() {
        let line = row(&[(0, "FLA"), (2, "Short"), (4, "Roe, R."), (14, "1971")]);
        let result = JstorFormat::new().parse(export(&[line]).as_bytes()).unwrap();
        let entry = &result.entries()[0];
        assert_eq!(entry.field("title"), Some("Short"));
        assert_eq!(entry.field("author"), Some("Roe, R."));
        assert_eq!(entry.field("year"), Some("1971"));
        assert!(!entry.has_field("pages"));
        assert_eq!(result.warning_count(), 1);
    }

    #[test]
    fn test_non_article_is_misc_and_terminator_stops() {
        let rows = [row(&[(0, "BR"), (2, "A review")])];
        let result = JstorFormat::new().parse(export(&rows).as_bytes()).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.entries()[0].entry_type(), "misc");
    }

    #[test]
    fn test_missing_header_gives_empty_result() {
        let result = JstorFormat::new().parse(b"FLA\tTitle\n").unwrap();
        assert!(result.is_empty());
        assert!(result.has_warning("no 'Item Type' header line found"));
    }

    #[test]
    fn test_recognizes_any_text() {
        let format = JstorFormat::new();
        assert!(format.recognizes(b"anything"));
        assert!(!format.recognizes(b""));
    }
}
