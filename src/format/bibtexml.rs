//! `BibTeXML` parser.
//!
//! Layout: `file > entry[id] > <type> > <field>`, where `author` and `editor`
//! may hold `person` children. The `bibtex:` prefix is optional.

use std::sync::Arc;

use tracing::debug;

use super::{FormatPriority, ImportFormat, XmlEvent, XmlEvents, decode_input, head_lines, local_name};
use crate::error::ImportError;
use crate::model::{DEFAULT_ENTRY_TYPE, Entry, EntryTypeRegistry, ParseResult};
use crate::normalize::authors::join_authors;

const FORMAT_NAME: &str = "BibTeXML";

/// Lines inspected by the detector.
const DETECTION_LINES: usize = 20;

struct BibtexmlState<'a> {
    entry_types: &'a EntryTypeRegistry,
    result: ParseResult,
    entry: Option<Entry>,
    // Element names below the current `entry`
    path: Vec<String>,
    persons: Vec<String>,
    text: String,
}

impl<'a> BibtexmlState<'a> {
    fn new(entry_types: &'a EntryTypeRegistry) -> Self {
        Self {
            entry_types,
            result: ParseResult::new(),
            entry: None,
            path: Vec::new(),
            persons: Vec::new(),
            text: String::new(),
        }
    }

    fn finish_entry(&mut self) {
        if let Some(entry) = self.entry.take() {
            debug!(fields = entry.field_count(), "BibTeXML entry finished");
            self.result.add_entry(entry);
        }
        self.path.clear();
    }

    fn start(&mut self, local: &str, key: Option<&str>) {
        if self.entry.is_none() {
            if local == "entry" {
                let mut entry = Entry::new(DEFAULT_ENTRY_TYPE);
                if let Some(key) = key {
                    entry.set_key(key);
                }
                self.entry = Some(entry);
                self.path.clear();
            }
            return;
        }

        self.path.push(local.to_string());
        match self.path.len() {
            1 => self.set_type(local),
            2 => {
                self.text.clear();
                self.persons.clear();
            }
            3 if local == "person" => self.text.clear(),
            _ => {}
        }
    }

    fn set_type(&mut self, local: &str) {
        let resolved = self.entry_types.resolve_or_default(local);
        if !local.eq_ignore_ascii_case(&resolved) {
            self.result.add_warning(format!(
                "unknown entry type: {local}. Type set to '{DEFAULT_ENTRY_TYPE}'."
            ));
        }
        if let Some(entry) = self.entry.as_mut() {
            entry.set_entry_type(&resolved);
        }
    }

    fn end(&mut self, local: &str) {
        if self.entry.is_none() {
            return;
        }
        match self.path.len() {
            0 => {
                if local == "entry" {
                    self.finish_entry();
                }
                return;
            }
            2 => self.commit_field(local),
            3 if local == "person" => {
                let person = std::mem::take(&mut self.text);
                self.persons.push(person.trim().to_string());
            }
            _ => {}
        }
        self.path.pop();
    }

    fn commit_field(&mut self, local: &str) {
        let value = if self.persons.is_empty() {
            std::mem::take(&mut self.text).trim().to_string()
        } else {
            join_authors(std::mem::take(&mut self.persons))
        };
        if let Some(entry) = self.entry.as_mut() {
            entry.set_field(local, value);
        }
    }
}

/// Import format for `BibTeXML` files.
#[derive(Debug)]
pub struct BibtexmlFormat {
    entry_types: Arc<EntryTypeRegistry>,
}

impl BibtexmlFormat {
    /// Creates the format; entry types resolve against `entry_types`.
    #[must_use]
    pub fn new(entry_types: Arc<EntryTypeRegistry>) -> Self {
        Self { entry_types }
    }
}

impl Default for BibtexmlFormat {
    fn default() -> Self {
        Self::new(Arc::new(EntryTypeRegistry::with_builtins()))
    }
}

impl ImportFormat for BibtexmlFormat {
    fn name(&self) -> &str {
        "bibtexml"
    }

    fn description(&self) -> &str {
        "BibTeXML (XML rendition of BibTeX)"
    }

    fn priority(&self) -> FormatPriority {
        FormatPriority::Specialized
    }

    fn recognizes(&self, input: &[u8]) -> bool {
        head_lines(input, DETECTION_LINES).contains("<bibtex:file")
    }

    #[tracing::instrument(skip(self, input), fields(input_len = input.len()))]
    fn parse(&self, input: &[u8]) -> Result<ParseResult, ImportError> {
        let decoded = decode_input(input, FORMAT_NAME)?;
        let mut state = BibtexmlState::new(&self.entry_types);
        for event in XmlEvents::new(&decoded.text) {
            match event.map_err(|e| ImportError::format(FORMAT_NAME, &e.to_string()))? {
                XmlEvent::Start { ref name, ref attributes } => {
                    let key = attributes
                        .iter()
                        .find(|(attr, _)| attr == "id")
                        .map(|(_, value)| value.as_str());
                    state.start(local_name(name), key);
                }
                XmlEvent::Text(text) => {
                    if state.path.len() >= 2 {
                        state.text.push_str(&text);
                    }
                }
                XmlEvent::End { name } => state.end(local_name(&name)),
            }
        }
        state.finish_entry();
        let mut result = state.result;
        result.set_encoding(decoded.encoding.label());
        Ok(result)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const FILE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<bibtex:file xmlns:bibtex="http://bibtexml.sf.net/">
  <bibtex:entry id="knuth84">
    <bibtex:book>
      <bibtex:author>
        <bibtex:person>Donald E. Knuth</bibtex:person>
      </bibtex:author>
      <bibtex:title>The TeXbook</bibtex:title>
      <bibtex:year>1984</bibtex:year>
    </bibtex:book>
  </bibtex:entry>
  <bibtex:entry id="pair">
    <bibtex:article>
      <bibtex:author>
        <bibtex:person>A. One</bibtex:person>
        <bibtex:person>B. Two</bibtex:person>
      </bibtex:author>
      <bibtex:editor>Plain Editor</bibtex:editor>
    </bibtex:article>
  </bibtex:entry>
  <bibtex:entry id="odd">
    <bibtex:gizmo><bibtex:title>X</bibtex:title></bibtex:gizmo>
  </bibtex:entry>
</bibtex:file>"#;

    #[test]
    fn test_parse_entries() {
        let result = BibtexmlFormat::default().parse(FILE.as_bytes()).unwrap();
        assert_eq!(result.len(), 3);
        let book = &result.entries()[0];
        assert_eq!(book.entry_type(), "book");
        assert_eq!(book.key(), Some("knuth84"));
        assert_eq!(book.field("author"), Some("Donald E. Knuth"));
        assert_eq!(book.field("title"), Some("The TeXbook"));
        assert_eq!(book.field("year"), Some("1984"));
    }

    #[test]
    fn test_persons_joined() {
        let result = BibtexmlFormat::default().parse(FILE.as_bytes()).unwrap();
        let article = &result.entries()[1];
        assert_eq!(article.field("author"), Some("A. One and B. Two"));
        assert_eq!(article.field("editor"), Some("Plain Editor"));
    }

    #[test]
    fn test_unknown_type_falls_back() {
        let result = BibtexmlFormat::default().parse(FILE.as_bytes()).unwrap();
        assert_eq!(result.entries()[2].entry_type(), "other");
        assert!(result.has_warning("unknown entry type: gizmo. Type set to 'other'."));
    }

    #[test]
    fn test_recognizes() {
        let format = BibtexmlFormat::default();
        assert!(format.recognizes(FILE.as_bytes()));
        assert!(!format.recognizes(b"<file/>"));
    }
}
