//! arXiv OAI2 metadata parser.

use tracing::debug;

use super::{FormatPriority, ImportFormat, XmlEvent, XmlEvents, decode_input, local_name};
use crate::error::ImportError;
use crate::model::{Entry, ParseResult};
use crate::normalize::authors::join_authors;
use crate::normalize::date::year_from_datestamp;

const FORMAT_NAME: &str = "OAI2";

/// Pieces of an arXiv `journal-ref` value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JournalRef {
    /// Text before the first digit, untrimmed
    pub journal: String,
    /// First word after the journal
    pub volume: String,
    /// Text between the first `(` and the following `)`
    pub year: Option<String>,
    /// What remains after removing journal, volume and `(year)`, without spaces
    pub pages: String,
}

/// Decomposes a journal reference such as `"Phys. Rev. 12 (1999) 34-56"`.
///
/// Each step removes the previously extracted text literally, so the parts
/// must be derived journal, volume, year, pages in that order. Repeated text
/// is only removed at its first occurrence.
#[must_use]
pub fn split_journal_ref(content: &str) -> JournalRef {
    let journal = content
        .find(|c: char| c.is_ascii_digit())
        .map_or(content, |digit| &content[..digit])
        .to_string();

    let after_journal = remove_first(content, &journal);
    let volume = after_journal
        .split_once(' ')
        .map_or(after_journal.as_str(), |(head, _)| head)
        .to_string();

    let year = content.split_once('(').and_then(|(_, rest)| {
        rest.split_once(')').map(|(year, _)| year.to_string())
    });

    let mut pages = remove_first(&after_journal, &volume);
    if let Some(year) = &year {
        pages = remove_first(&pages, &format!("({year})"));
    }
    pages.retain(|c| c != ' ');

    JournalRef {
        journal,
        volume,
        year,
        pages,
    }
}

fn remove_first(text: &str, needle: &str) -> String {
    if needle.is_empty() {
        text.to_string()
    } else {
        text.replacen(needle, "", 1)
    }
}

/// Elements whose text the parser collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Oai2Field {
    Id,
    Title,
    Abstract,
    Comments,
    ReportNo,
    Doi,
    JournalRef,
    Datestamp,
    Keyname,
    Forenames,
    Error,
}

impl Oai2Field {
    fn from_element(local: &str) -> Option<Self> {
        Some(match local {
            "id" => Self::Id,
            "title" => Self::Title,
            "abstract" => Self::Abstract,
            "comments" => Self::Comments,
            "report-no" => Self::ReportNo,
            "doi" => Self::Doi,
            "journal-ref" => Self::JournalRef,
            "datestamp" => Self::Datestamp,
            "keyname" => Self::Keyname,
            "forenames" => Self::Forenames,
            "error" => Self::Error,
            _ => return None,
        })
    }
}

/// Parser state for one document.
#[derive(Default)]
struct Oai2State {
    result: ParseResult,
    entry: Option<Entry>,
    authors: Vec<String>,
    keyname: String,
    forenames: String,
    datestamp: Option<String>,
    error_code: Option<String>,
    active: Option<(Oai2Field, String)>,
    text: String,
}

impl Oai2State {
    fn entry_mut(&mut self) -> &mut Entry {
        self.entry.get_or_insert_with(|| Entry::new("article"))
    }

    fn finish_record(&mut self) {
        let authors = std::mem::take(&mut self.authors);
        let datestamp = self.datestamp.take();
        let Some(mut entry) = self.entry.take() else {
            return;
        };
        if !authors.is_empty() {
            entry.set_field("author", join_authors(&authors));
        }
        if let Some(year) = datestamp.as_deref().and_then(year_from_datestamp) {
            entry.set_field_if_absent("year", year);
        }
        debug!(fields = entry.field_count(), "OAI2 record finished");
        self.result.add_entry(entry);
    }

    fn commit(&mut self, field: Oai2Field) -> Result<(), ImportError> {
        let content = std::mem::take(&mut self.text);
        let value = content.trim();
        match field {
            Oai2Field::Id => set(self.entry_mut(), "eprint", value),
            Oai2Field::Title => set(self.entry_mut(), "title", value),
            Oai2Field::Abstract => set(self.entry_mut(), "abstract", value),
            Oai2Field::Comments => set(self.entry_mut(), "comments", value),
            Oai2Field::ReportNo => set(self.entry_mut(), "reportno", value),
            Oai2Field::Doi => set(self.entry_mut(), "doi", value),
            Oai2Field::JournalRef => {
                let parts = split_journal_ref(value);
                let entry = self.entry_mut();
                entry.set_field("journal", parts.journal);
                entry.set_field("volume", parts.volume);
                if let Some(year) = parts.year {
                    entry.set_field("year", year);
                }
                entry.set_field("pages", parts.pages);
            }
            Oai2Field::Datestamp => self.datestamp = Some(value.to_string()),
            Oai2Field::Keyname => self.keyname = value.to_string(),
            Oai2Field::Forenames => self.forenames = value.to_string(),
            Oai2Field::Error => {
                let message = match self.error_code.take() {
                    Some(code) => format!("{code}: {value}"),
                    None => value.to_string(),
                };
                return Err(ImportError::protocol("arXiv OAI2", &message));
            }
        }
        Ok(())
    }

    fn handle(&mut self, event: XmlEvent) -> Result<(), ImportError> {
        match event {
            XmlEvent::Start { ref name, .. } => {
                let local = local_name(name);
                if local == "record" {
                    self.finish_record();
                    self.entry = Some(Entry::new("article"));
                } else if local == "author" {
                    self.keyname.clear();
                    self.forenames.clear();
                }
                if let Some(field) = Oai2Field::from_element(local) {
                    if field == Oai2Field::Error {
                        self.error_code = event.attribute("code").map(str::to_string);
                    }
                    self.active = Some((field, local.to_string()));
                    self.text.clear();
                }
            }
            XmlEvent::Text(text) => {
                if self.active.is_some() {
                    self.text.push_str(&text);
                }
            }
            XmlEvent::End { name } => {
                let local = local_name(&name);
                if let Some((field, _)) = self
                    .active
                    .take_if(|(_, element)| element.as_str() == local)
                {
                    self.commit(field)?;
                } else if local == "author" {
                    let author = format!("{} {}", self.forenames, self.keyname);
                    self.authors.push(author.trim().to_string());
                } else if local == "record" {
                    self.finish_record();
                }
            }
        }
        Ok(())
    }
}

fn set(entry: &mut Entry, name: &str, value: &str) {
    entry.set_field(name, value);
}

/// Parses an OAI2 `GetRecord` or `ListRecords` document.
///
/// # Errors
///
/// Returns [`ImportError::Protocol`] when the document carries an OAI
/// `error` element and [`ImportError::Format`] for malformed XML.
#[tracing::instrument(skip(text), fields(input_len = text.len()))]
pub fn parse_oai2(text: &str) -> Result<ParseResult, ImportError> {
    let mut state = Oai2State::default();
    for event in XmlEvents::new(text) {
        let event = event.map_err(|e| ImportError::format(FORMAT_NAME, &e.to_string()))?;
        state.handle(event)?;
    }
    state.finish_record();
    Ok(state.result)
}

/// Import format for arXiv OAI2 documents.
#[derive(Debug, Default)]
pub struct Oai2Format;

impl Oai2Format {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ImportFormat for Oai2Format {
    fn name(&self) -> &str {
        "oai2"
    }

    fn description(&self) -> &str {
        "arXiv OAI2 metadata (OAI-PMH, arXiv prefix)"
    }

    fn priority(&self) -> FormatPriority {
        FormatPriority::Specialized
    }

    fn recognizes(&self, input: &[u8]) -> bool {
        let text = String::from_utf8_lossy(input);
        text.contains("OAI-PMH") && text.contains("arXiv") && !text.contains("oai_citeseer")
    }

    fn parse(&self, input: &[u8]) -> Result<ParseResult, ImportError> {
        let decoded = decode_input(input, FORMAT_NAME)?;
        let mut result = parse_oai2(&decoded.text)?;
        result.set_encoding(decoded.encoding.label());
        Ok(result)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const RECORD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<OAI-PMH xmlns="http://www.openarchives.org/OAI/2.0/">
  <GetRecord>
    <record>
      <header>
        <identifier>oai:arXiv.org:cond-mat/0001001</identifier>
        <datestamp>2001-03-04</datestamp>
      </header>
      <metadata>
        <arXiv xmlns="http://arxiv.org/OAI/arXiv/">
          <id>cond-mat/0001001</id>
          <authors>
            <author><keyname>Smith</keyname><forenames>J.</forenames></author>
            <author><keyname>Doe</keyname><forenames>A.</forenames></author>
          </authors>
          <title>Spin <unknown/>chains</title>
          <journal-ref>Phys. Rev. 12 (1999) 34-56</journal-ref>
          <doi>10.1103/PhysRev.12.34</doi>
          <abstract>  We study spins.  </abstract>
        </arXiv>
      </metadata>
    </record>
  </GetRecord>
</OAI-PMH>"#;

    // ==================== Journal reference ====================

    #[test]
    fn test_split_journal_ref() {
        let parts = split_journal_ref("Phys. Rev. 12 (1999) 34-56");
        assert_eq!(parts.journal, "Phys. Rev. ");
        assert_eq!(parts.volume, "12");
        assert_eq!(parts.year.as_deref(), Some("1999"));
        assert_eq!(parts.pages, "34-56");
    }

    #[test]
    fn test_split_journal_ref_without_year() {
        let parts = split_journal_ref("Nature 401 12-15");
        assert_eq!(parts.journal, "Nature ");
        assert_eq!(parts.volume, "401");
        assert!(parts.year.is_none());
        assert_eq!(parts.pages, "12-15");
    }

    #[test]
    fn test_split_journal_ref_volume_recurs_in_year() {
        let parts = split_journal_ref("J. Math. 19 (1919) 1-2");
        assert_eq!(parts.volume, "19");
        assert_eq!(parts.year.as_deref(), Some("1919"));
        assert_eq!(parts.pages, "1-2");
    }

    // ==================== Parser ====================

    #[test]
    fn test_parse_record() {
        let result = parse_oai2(RECORD).unwrap();
        assert_eq!(result.len(), 1);
        let entry = &result.entries()[0];
        assert_eq!(entry.entry_type(), "article");
        assert_eq!(entry.field("author"), Some("J. Smith and A. Doe"));
        assert_eq!(entry.field("journal"), Some("Phys. Rev. "));
        assert_eq!(entry.field("volume"), Some("12"));
        assert_eq!(entry.field("year"), Some("1999"));
        assert_eq!(entry.field("pages"), Some("34-56"));
        assert_eq!(entry.field("eprint"), Some("cond-mat/0001001"));
        assert_eq!(entry.field("abstract"), Some("We study spins."));
        assert_eq!(entry.field("doi"), Some("10.1103/PhysRev.12.34"));
    }

    #[test]
    fn test_unknown_child_does_not_reset_accumulator() {
        let result = parse_oai2(RECORD).unwrap();
        assert_eq!(result.entries()[0].field("title"), Some("Spin chains"));
    }

    #[test]
    fn test_datestamp_year_fallback() {
        let xml = "<OAI-PMH><record><header><datestamp>2007-05-23</datestamp></header>\
                   <metadata><arXiv><title>T</title></arXiv></metadata></record></OAI-PMH>";
        let result = parse_oai2(xml).unwrap();
        assert_eq!(result.entries()[0].field("year"), Some("2007"));
    }

    #[test]
    fn test_error_element_is_protocol_error() {
        let xml = r#"<OAI-PMH><error code="idDoesNotExist">No matching identifier</error></OAI-PMH>"#;
        let err = parse_oai2(xml).unwrap_err();
        assert!(err.is_protocol());
        assert!(err.to_string().contains("idDoesNotExist: No matching identifier"));
    }

    #[test]
    fn test_two_records() {
        let xml = "<OAI-PMH><ListRecords>\
                   <record><metadata><arXiv><id>a</id></arXiv></metadata></record>\
                   <record><metadata><arXiv><id>b</id></arXiv></metadata></record>\
                   </ListRecords></OAI-PMH>";
        let result = parse_oai2(xml).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result.entries()[1].field("eprint"), Some("b"));
    }

    #[test]
    fn test_malformed_xml_is_format_error() {
        let err = parse_oai2("<OAI-PMH><record></OAI-PMH>").unwrap_err();
        assert!(matches!(err, ImportError::Format { .. }));
    }

    #[test]
    fn test_recognizes() {
        let format = Oai2Format::new();
        assert!(format.recognizes(RECORD.as_bytes()));
        assert!(!format.recognizes(b"@article{a,}"));
    }
}
