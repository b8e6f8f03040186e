//! BibTeX-syntax parser.
//!
//! Used for `.bib` files and for the BibTeX text returned by DBLP pages and
//! the scraper service. Handles `@string` macros, `@preamble`, JabRef
//! `@comment` metadata and custom type declarations, and `#` concatenation.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::debug;

use super::{FormatPriority, ImportFormat, decode_input};
use crate::error::ImportError;
use crate::model::{DEFAULT_ENTRY_TYPE, Entry, EntryType, EntryTypeRegistry, ParseResult};
use crate::normalize::{compile_static_regex, correct_line_breaks};

const FORMAT_NAME: &str = "BibTeX";

/// First line written by JabRef into saved databases.
const JABREF_SIGNATURE: &str = "This file was created with JabRef";

const META_PREFIX: &str = "jabref-meta:";
const ENTRY_TYPE_PREFIX: &str = "jabref-entrytype:";

/// Fields whose repeated occurrences are joined instead of dropped.
const NAME_LIST_FIELDS: [&str; 2] = ["author", "editor"];

static ENTRY_START: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"@[a-zA-Z]*\s*\{"));

/// Returns true when `text` contains an entry start (`@type{`) or the JabRef
/// signature.
#[must_use]
pub fn looks_like_bibtex(text: &str) -> bool {
    text.contains(JABREF_SIGNATURE) || ENTRY_START.is_match(text)
}

/// One `@...` block located by [`segment_blocks`].
#[derive(Debug, PartialEq, Eq)]
enum Block<'a> {
    /// Balanced block: lower-cased type and the text between the delimiters
    Complete { block_type: String, body: &'a str },
    /// Block whose closing delimiter never came
    Unterminated { raw: &'a str },
}

/// Splits `input` into `@type{...}` / `@type(...)` blocks.
///
/// Text between blocks is ignored. An unterminated block swallows the text up
/// to the next `@` at the start of a line, where scanning resumes.
fn segment_blocks(input: &str) -> Vec<Block<'_>> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let byte_at = |index: usize| chars.get(index).map_or(input.len(), |(byte, _)| *byte);
    let mut blocks = Vec::new();
    let mut i = 0usize;

    while i < chars.len() {
        if chars[i].1 != '@' {
            i += 1;
            continue;
        }

        let mut j = i + 1;
        while j < chars.len() && chars[j].1.is_ascii_alphabetic() {
            j += 1;
        }
        let type_end = j;
        while j < chars.len() && chars[j].1.is_whitespace() {
            j += 1;
        }
        if j >= chars.len() || !matches!(chars[j].1, '{' | '(') {
            i += 1;
            continue;
        }

        let closer = if chars[j].1 == '{' { '}' } else { ')' };
        let mut depth = 0usize;
        let mut in_quotes = false;
        let mut escape = false;
        let mut found_end = None;

        for (k, (_, ch)) in chars.iter().enumerate().skip(j + 1) {
            if escape {
                escape = false;
                continue;
            }
            match *ch {
                '\\' => escape = true,
                '"' if depth == 0 => in_quotes = !in_quotes,
                _ if in_quotes => {}
                '{' => depth += 1,
                '}' if depth > 0 => depth -= 1,
                c if c == closer && depth == 0 => {
                    found_end = Some(k);
                    break;
                }
                _ => {}
            }
        }

        if let Some(end) = found_end {
            blocks.push(Block::Complete {
                block_type: input[byte_at(i + 1)..byte_at(type_end)].to_ascii_lowercase(),
                body: &input[byte_at(j + 1)..byte_at(end)],
            });
            i = end + 1;
        } else {
            let mut recovery = i + 1;
            while recovery < chars.len() {
                if chars[recovery].1 == '@' && matches!(chars[recovery - 1].1, '\n' | '\r') {
                    break;
                }
                recovery += 1;
            }
            blocks.push(Block::Unterminated {
                raw: input[byte_at(i)..byte_at(recovery)].trim(),
            });
            i = recovery;
        }
    }

    blocks
}

/// Splits `input` on `separator` outside braces and quotes.
fn split_top_level(input: &str, separator: char) -> Result<Vec<&str>, String> {
    let mut parts = Vec::new();
    let mut start = 0usize;
    let mut depth = 0usize;
    let mut in_quotes = false;
    let mut escape = false;

    for (index, ch) in input.char_indices() {
        if escape {
            escape = false;
            continue;
        }
        match ch {
            '\\' => escape = true,
            '"' if depth == 0 => in_quotes = !in_quotes,
            _ if in_quotes => {}
            '{' => depth += 1,
            '}' => {
                if depth == 0 {
                    return Err("closing brace without matching opening brace".to_string());
                }
                depth -= 1;
            }
            c if c == separator && depth == 0 => {
                parts.push(&input[start..index]);
                start = index + c.len_utf8();
            }
            _ => {}
        }
    }

    if in_quotes {
        return Err("unterminated quoted value".to_string());
    }
    if depth != 0 {
        return Err("unbalanced braces in field values".to_string());
    }
    parts.push(&input[start..]);
    Ok(parts)
}

fn is_identifier(text: &str) -> bool {
    !text.is_empty()
        && !text.starts_with(|c: char| c.is_ascii_digit())
        && text
            .chars()
            .all(|c| !c.is_whitespace() && !matches!(c, '{' | '}' | '"' | '#' | ',' | '=' | '(' | ')'))
}

/// Evaluates a value expression: braced or quoted strings, numbers and
/// `@string` names joined by `#`. Unknown names are kept as `#name#`.
fn evaluate_value(raw: &str, strings: &HashMap<String, String>) -> Result<String, String> {
    let mut value = String::new();
    for part in split_top_level(raw, '#')? {
        let part = part.trim();
        if let Some(inner) = part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
            value.push_str(inner);
        } else if let Some(inner) = part.strip_prefix('"').and_then(|p| p.strip_suffix('"')) {
            value.push_str(inner);
        } else if !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()) {
            value.push_str(part);
        } else if is_identifier(part) {
            match strings.get(&part.to_ascii_lowercase()) {
                Some(expansion) => value.push_str(expansion),
                None => {
                    value.push('#');
                    value.push_str(part);
                    value.push('#');
                }
            }
        } else if part.is_empty() {
            return Err("empty value".to_string());
        } else {
            return Err(format!("invalid value `{}`", preview(part)));
        }
    }
    Ok(value)
}

/// Parses one `name = value` assignment.
fn parse_assignment(
    assignment: &str,
    strings: &HashMap<String, String>,
) -> Result<(String, String), String> {
    let Some((name, raw_value)) = assignment.split_once('=') else {
        return Err(format!("missing '=' in field segment `{}`", preview(assignment.trim())));
    };
    let name = name.trim().to_ascii_lowercase();
    if name.is_empty() {
        return Err("empty field name".to_string());
    }
    let value = evaluate_value(raw_value, strings)
        .map_err(|reason| format!("invalid value in field `{name}`: {reason}"))?;
    Ok((name, correct_line_breaks(&value)))
}

fn preview(input: &str) -> String {
    const MAX: usize = 60;
    if input.chars().count() <= MAX {
        return input.to_string();
    }
    let shortened: String = input.chars().take(MAX).collect();
    format!("{shortened}...")
}

fn malformed(raw: &str, reason: &str) -> String {
    format!(
        "What: malformed BibTeX entry `{}`. Why: {reason}. Fix: use `@type{{key, field = {{value}}}}`.",
        preview(raw.trim())
    )
}

/// Mutable state while walking the blocks of one input.
#[derive(Default)]
struct BibtexState {
    result: ParseResult,
    strings: HashMap<String, String>,
    keys: HashSet<String>,
}

impl BibtexState {
    fn string_definition(&mut self, body: &str) {
        match parse_assignment(body, &self.strings) {
            Ok((name, value)) => {
                if self.strings.contains_key(&name) {
                    self.result
                        .add_warning(format!("Duplicate string name: {name}"));
                } else {
                    self.strings.insert(name, value);
                }
            }
            Err(reason) => self.result.add_warning(malformed(body, &reason)),
        }
    }

    fn preamble(&mut self, body: &str) {
        match evaluate_value(body, &self.strings) {
            Ok(value) => {
                let preamble = match self.result.preamble() {
                    Some(existing) => format!("{existing}\n{value}"),
                    None => value,
                };
                self.result.set_preamble(preamble);
            }
            Err(reason) => self.result.add_warning(malformed(body, &reason)),
        }
    }

    fn comment(&mut self, body: &str) {
        let body = body.trim();
        if let Some(meta) = body.strip_prefix(META_PREFIX) {
            if let Some((key, value)) = meta.split_once(':') {
                self.result.insert_metadata(key.trim(), value.trim());
            }
        } else if let Some(declaration) = body.strip_prefix(ENTRY_TYPE_PREFIX) {
            match EntryType::parse_declaration(declaration) {
                Some(entry_type) => self.result.add_custom_type(entry_type),
                None => self.result.add_warning(format!(
                    "ignored malformed entry type declaration: {}",
                    preview(declaration.trim())
                )),
            }
        }
    }

    fn entry(&mut self, entry_type: &str, body: &str) {
        let parts = match split_top_level(body, ',') {
            Ok(parts) => parts,
            Err(reason) => {
                self.result.add_warning(malformed(body, &reason));
                return;
            }
        };
        let mut parts = parts.into_iter();
        let key = parts.next().unwrap_or("").trim();
        if key.contains('=') {
            self.result
                .add_warning(malformed(body, "missing citation key before the first field"));
            return;
        }

        let mut entry = Entry::new(entry_type);
        for assignment in parts.filter(|part| !part.trim().is_empty()) {
            let (name, value) = match parse_assignment(assignment, &self.strings) {
                Ok(pair) => pair,
                Err(reason) => {
                    self.result.add_warning(malformed(body, &reason));
                    return;
                }
            };
            match entry.field(&name) {
                Some(existing) if NAME_LIST_FIELDS.contains(&name.as_str()) => {
                    let joined = format!("{existing} and {value}");
                    entry.set_field(&name, joined);
                }
                Some(_) => {}
                None => {
                    entry.set_field(&name, value);
                }
            }
        }

        if key.is_empty() {
            self.result.add_warning("empty BibTeX key");
        } else {
            if !self.keys.insert(key.to_string()) {
                self.result
                    .add_warning(format!("duplicate BibTeX key: {key}"));
            }
            entry.set_key(key);
        }
        self.result.add_entry(entry);
    }
}

/// Import format for BibTeX text.
#[derive(Debug)]
pub struct BibtexFormat {
    entry_types: Arc<EntryTypeRegistry>,
}

impl BibtexFormat {
    /// Creates the parser; entry type names resolve against `entry_types`.
    #[must_use]
    pub fn new(entry_types: Arc<EntryTypeRegistry>) -> Self {
        Self { entry_types }
    }

    /// Parses already decoded BibTeX text.
    ///
    /// Never fails: malformed blocks become warnings on the result.
    #[must_use]
    #[tracing::instrument(skip(self, text), fields(input_len = text.len()))]
    pub fn parse_text(&self, text: &str) -> ParseResult {
        let mut state = BibtexState::default();
        for block in segment_blocks(text) {
            match block {
                Block::Complete { block_type, body } => match block_type.as_str() {
                    "string" => state.string_definition(body),
                    "preamble" => state.preamble(body),
                    "comment" => state.comment(body),
                    "" => state
                        .result
                        .add_warning(malformed(body, "missing entry type after '@'")),
                    entry_type => state.entry(entry_type, body),
                },
                Block::Unterminated { raw } => state.result.add_warning(malformed(
                    raw,
                    "unbalanced braces (entry never closed)",
                )),
            }
        }

        let mut result = state.result;
        self.resolve_entry_types(&mut result);
        debug!(
            entries = result.len(),
            warnings = result.warning_count(),
            "BibTeX text parsed"
        );
        result
    }

    fn resolve_entry_types(&self, result: &mut ParseResult) {
        let declared: HashSet<String> = result
            .custom_types()
            .iter()
            .map(|t| t.name().to_string())
            .collect();
        let mut unknown = Vec::new();
        for entry in result.entries_mut() {
            let name = entry.entry_type().to_string();
            if !self.entry_types.contains(&name) && !declared.contains(&name) {
                entry.set_entry_type(DEFAULT_ENTRY_TYPE);
                unknown.push(name);
            }
        }
        for name in unknown {
            result.add_warning(format!(
                "unknown entry type: {name}. Type set to '{DEFAULT_ENTRY_TYPE}'."
            ));
        }
    }
}

impl ImportFormat for BibtexFormat {
    fn name(&self) -> &str {
        "bibtex"
    }

    fn description(&self) -> &str {
        "BibTeX database (.bib)"
    }

    fn priority(&self) -> FormatPriority {
        FormatPriority::General
    }

    fn recognizes(&self, input: &[u8]) -> bool {
        decode_input(input, FORMAT_NAME).is_ok_and(|decoded| looks_like_bibtex(&decoded.text))
    }

    fn parse(&self, input: &[u8]) -> Result<ParseResult, ImportError> {
        let decoded = decode_input(input, FORMAT_NAME)?;
        let mut result = self.parse_text(&decoded.text);
        result.set_encoding(decoded.encoding.label());
        Ok(result)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(input: &str) -> ParseResult {
        BibtexFormat::new(Arc::new(EntryTypeRegistry::with_builtins())).parse_text(input)
    }

    // ==================== Segmentation ====================

    #[test]
    fn test_segment_blocks_braces_and_parens() {
        let blocks = segment_blocks("junk @article{a, t={x}}\n@book(b, t = \"y)\")");
        assert_eq!(
            blocks,
            vec![
                Block::Complete {
                    block_type: "article".to_string(),
                    body: "a, t={x}"
                },
                Block::Complete {
                    block_type: "book".to_string(),
                    body: "b, t = \"y)\""
                },
            ]
        );
    }

    #[test]
    fn test_segment_unterminated_recovers_at_next_line_start() {
        let blocks = segment_blocks("@article{bad, title={Broken}\n@article{ok, title={Good}}");
        assert!(matches!(blocks[0], Block::Unterminated { .. }));
        assert!(matches!(blocks[1], Block::Complete { .. }));
    }

    // ==================== Entries ====================

    #[test]
    fn test_parse_basic_entries() {
        let result = parse(
            r"
@article{a1, title={A}, author={Smith, J.}, year={2024}}
@book{b1, title={B}, author={Jones, K.}, year=2023}
",
        );
        assert_eq!(result.len(), 2);
        assert_eq!(result.warning_count(), 0);
        let book = &result.entries()[1];
        assert_eq!(book.entry_type(), "book");
        assert_eq!(book.key(), Some("b1"));
        assert_eq!(book.field("year"), Some("2023"));
    }

    #[test]
    fn test_nested_braces_kept_verbatim() {
        let result = parse(r"@article{k, title={A {DNA} Study}}");
        assert_eq!(result.entries()[0].field("title"), Some("A {DNA} Study"));
    }

    #[test]
    fn test_multiline_value_collapses() {
        let result = parse("@article{k,\n  title = {A very long\n           multiline title},\n}");
        assert_eq!(
            result.entries()[0].field("title"),
            Some("A very long multiline title")
        );
    }

    #[test]
    fn test_field_names_lowercased_first_value_wins() {
        let result = parse("@article{k, TITLE={First}, title={Second}}");
        assert_eq!(result.entries()[0].field("title"), Some("First"));
    }

    #[test]
    fn test_repeated_author_fields_joined() {
        let result = parse("@article{k, author={A. One}, Author={B. Two}}");
        assert_eq!(result.entries()[0].field("author"), Some("A. One and B. Two"));
    }

    #[test]
    fn test_string_macros_and_concatenation() {
        let result = parse(
            r#"@string{ieee = "IEEE Trans."}
@article{k, journal = ieee # { on Widgets}, month = jan, pages = 12}"#,
        );
        let entry = &result.entries()[0];
        assert_eq!(entry.field("journal"), Some("IEEE Trans. on Widgets"));
        assert_eq!(entry.field("month"), Some("#jan#"));
        assert_eq!(entry.field("pages"), Some("12"));
    }

    #[test]
    fn test_duplicate_string_name_warning() {
        let result = parse("@string{a = {x}}\n@STRING{A = {y}}");
        assert!(result.has_warning("Duplicate string name: a"));
    }

    #[test]
    fn test_preamble_captured() {
        let result = parse(r#"@preamble{"\newcommand{\noop}[1]{}"}"#);
        assert_eq!(result.preamble(), Some(r"\newcommand{\noop}[1]{}"));
    }

    #[test]
    fn test_jabref_comments() {
        let result = parse(
            "@comment{jabref-meta: databaseType:bibtex;}\n\
             @comment{jabref-entrytype: Dataset: req[title;year] opt[url]}\n\
             @dataset{d1, title={Data}}",
        );
        assert_eq!(
            result.metadata().get("databaseType").map(String::as_str),
            Some("bibtex;")
        );
        assert_eq!(result.custom_types()[0].name(), "dataset");
        assert_eq!(result.entries()[0].entry_type(), "dataset");
        assert_eq!(result.warning_count(), 0);
    }

    #[test]
    fn test_unknown_type_becomes_other() {
        let result = parse("@gizmo{g1, title={G}}");
        assert_eq!(result.entries()[0].entry_type(), "other");
        assert!(result.has_warning("unknown entry type: gizmo. Type set to 'other'."));
    }

    #[test]
    fn test_duplicate_and_empty_keys() {
        let result = parse("@misc{k, title={A}}\n@misc{k, title={B}}\n@misc{, title={C}}");
        assert_eq!(result.len(), 3);
        assert!(result.has_warning("duplicate BibTeX key: k"));
        assert!(result.has_warning("empty BibTeX key"));
        assert!(result.entries()[2].key().is_none());
    }

    #[test]
    fn test_malformed_entry_skipped_with_diagnostic() {
        let result = parse(
            "@article{ok, title={Good}}\n@article{bad, title {Missing equals}}\n@book{ok2, title={B}}",
        );
        assert_eq!(result.len(), 2);
        assert!(result.warnings().any(|w| w.contains("missing '='")));
    }

    #[test]
    fn test_unbalanced_entry_does_not_swallow_next() {
        let result = parse("@article{bad, title={Broken}, year={2024}\n@article{ok, title={Good}}");
        assert_eq!(result.len(), 1);
        assert_eq!(result.entries()[0].key(), Some("ok"));
        assert!(result.warnings().any(|w| w.contains("unbalanced braces")));
    }

    // ==================== Detection ====================

    #[test]
    fn test_looks_like_bibtex() {
        assert!(looks_like_bibtex("text\n@Article {x,"));
        assert!(looks_like_bibtex("% This file was created with JabRef 2.10.\n"));
        assert!(!looks_like_bibtex("mail me at a@b.org"));
    }

    #[test]
    fn test_parse_records_encoding() {
        let format = BibtexFormat::new(Arc::new(EntryTypeRegistry::with_builtins()));
        let result = format.parse(b"@misc{k, title={G\xF6del}}").unwrap();
        assert_eq!(result.encoding(), Some("ISO-8859-1"));
        assert_eq!(result.entries()[0].field("title"), Some("Gödel"));
    }
}
