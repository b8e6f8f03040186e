//! Whitespace and punctuation clean-up for scraped field values.

use std::sync::LazyLock;

use regex::Regex;

use super::{CaseKeeper, compile_static_regex, strip_html};

static LINE_BREAK_RUN: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"\s*\n\s*"));
static SPACE_RUN: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r" {2,}"));
static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"\s+"));
static DASH_RUN: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"\s*-+\s*"));

/// Collapses hard line breaks inside a field value.
///
/// A line break followed by another line break (a paragraph break, possibly
/// with whitespace in between) survives as a single `\n`; any other line
/// break becomes a space. Runs of spaces collapse to one and the result is
/// trimmed.
#[must_use]
pub fn correct_line_breaks(value: &str) -> String {
    let unified = value.replace("\r\n", "\n");
    let joined = join_single_line_breaks(&unified);
    let squeezed = LINE_BREAK_RUN.replace_all(&joined, "\n");
    SPACE_RUN.replace_all(&squeezed, " ").trim().to_string()
}

fn join_single_line_breaks(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    for (index, &ch) in chars.iter().enumerate() {
        if ch != '\n' {
            out.push(ch);
            continue;
        }
        let paragraph_break = chars[index + 1..]
            .iter()
            .take_while(|c| c.is_whitespace())
            .any(|&c| c == '\n');
        out.push(if paragraph_break { '\n' } else { ' ' });
    }
    out
}

/// Collapses every whitespace run (line breaks included) to one space and trims.
#[must_use]
pub fn collapse_whitespace(value: &str) -> String {
    WHITESPACE_RUN.replace_all(value, " ").trim().to_string()
}

/// Rewrites a page range to the BibTeX `--` separator (`"1-10"` becomes `"1--10"`).
#[must_use]
pub fn normalize_page_range(pages: &str) -> String {
    DASH_RUN.replace_all(pages.trim(), "--").into_owned()
}

/// Cleans a title scraped from a web page: BibTeX-escaped `&` and `#` are
/// unescaped, HTML is stripped, then protected terms are braced.
#[must_use]
pub fn clean_scraped_title(title: &str, keeper: Option<&CaseKeeper>) -> String {
    let unescaped = title.replace("\\&", "&").replace("\\#", "#");
    let stripped = strip_html(&unescaped);
    match keeper {
        Some(keeper) => keeper.protect(&stripped),
        None => stripped,
    }
}
