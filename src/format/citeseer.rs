//! `CiteSeer` OAI (`oai_citeseer` metadata prefix) parser.

use tracing::debug;

use super::{FormatPriority, ImportFormat, XmlEvent, XmlEvents, decode_input};
use crate::error::{FieldError, ImportError};
use crate::model::{Entry, ParseResult};
use crate::normalize::authors::join_authors;
use crate::normalize::date::first_year;

const FORMAT_NAME: &str = "CiteSeer";

/// Parsed records plus the identifiers they cite, in discovery order.
#[derive(Debug, Default)]
pub struct CiteSeerRecords {
    pub result: ParseResult,
    /// Cited record identifiers, deduplicated
    pub cited: Vec<String>,
}

/// Maps a Dublin Core element to its entry field.
fn dublin_core_field(name: &str) -> Option<&'static str> {
    Some(match name {
        "dc:title" => "title",
        "dc:subject" => "keywords",
        "dc:description" => "abstract",
        "dc:publisher" => "publisher",
        "dc:date" => "year",
        "dc:identifier" => "url",
        "dc:language" => "language",
        "dc:rights" => "copyright",
        _ => return None,
    })
}

#[derive(Default)]
struct CiteSeerState {
    records: CiteSeerRecords,
    entry: Option<Entry>,
    authors: Vec<String>,
    active: Option<(&'static str, String)>,
    text: String,
    in_references: bool,
    in_uri: bool,
    error_code: Option<String>,
    in_error: bool,
}

impl CiteSeerState {
    fn entry_mut(&mut self) -> &mut Entry {
        self.entry.get_or_insert_with(|| Entry::new("misc"))
    }

    fn finish_record(&mut self) {
        let authors = std::mem::take(&mut self.authors);
        let Some(mut entry) = self.entry.take() else {
            return;
        };
        if !authors.is_empty() {
            entry.set_field("author", join_authors(&authors));
        }
        debug!(fields = entry.field_count(), "CiteSeer record finished");
        self.records.result.add_entry(entry);
    }

    fn commit(&mut self, field: &'static str) {
        let content = std::mem::take(&mut self.text);
        let value = content.trim();
        if field == "year" {
            match first_year(value) {
                Some(year) => {
                    self.entry_mut().set_field("year", year);
                }
                None if !value.is_empty() => {
                    let error = FieldError::new("year", format!("no year in date '{value}'"));
                    self.records.result.add_field_error(&error);
                }
                None => {}
            }
        } else {
            self.entry_mut().set_field(field, value);
        }
    }

    fn handle(&mut self, event: XmlEvent) -> Result<(), ImportError> {
        match event {
            XmlEvent::Start { ref name, .. } => match name.as_str() {
                "record" => {
                    self.finish_record();
                    self.entry = Some(Entry::new("misc"));
                }
                "oai_citeseer:author" => match event.attribute("name") {
                    Some(author) => self.authors.push(author.trim().to_string()),
                    None => self
                        .records
                        .result
                        .add_field_error(&FieldError::missing_attribute(name, "name")),
                },
                "oai_citeseer:relation" => {
                    self.in_references = event.attribute("type") == Some("References");
                }
                "oai_citeseer:uri" if self.in_references => {
                    self.in_uri = true;
                    self.text.clear();
                }
                "error" => {
                    self.in_error = true;
                    self.error_code = event.attribute("code").map(str::to_string);
                    self.text.clear();
                }
                other => {
                    if let Some(field) = dublin_core_field(other) {
                        self.active = Some((field, other.to_string()));
                        self.text.clear();
                    }
                }
            },
            XmlEvent::Text(text) => {
                if self.active.is_some() || self.in_uri || self.in_error {
                    self.text.push_str(&text);
                }
            }
            XmlEvent::End { name } => match name.as_str() {
                "record" => self.finish_record(),
                "oai_citeseer:relation" => self.in_references = false,
                "oai_citeseer:uri" if self.in_uri => {
                    self.in_uri = false;
                    let cited = std::mem::take(&mut self.text).trim().to_string();
                    if !cited.is_empty() && !self.records.cited.contains(&cited) {
                        self.records.cited.push(cited);
                    }
                }
                "error" if self.in_error => {
                    let text = std::mem::take(&mut self.text);
                    let message = match self.error_code.take() {
                        Some(code) => format!("{code}: {}", text.trim()),
                        None => text.trim().to_string(),
                    };
                    return Err(ImportError::protocol("CiteSeer OAI", &message));
                }
                other => {
                    if let Some((field, _)) =
                        self.active.take_if(|(_, element)| element.as_str() == other)
                    {
                        self.commit(field);
                    }
                }
            },
        }
        Ok(())
    }
}

/// Parses a `CiteSeer` OAI document, also collecting cited identifiers.
///
/// # Errors
///
/// Returns [`ImportError::Protocol`] for an OAI `error` payload and
/// [`ImportError::Format`] for malformed XML.
#[tracing::instrument(skip(text), fields(input_len = text.len()))]
pub fn parse_citeseer(text: &str) -> Result<CiteSeerRecords, ImportError> {
    let mut state = CiteSeerState::default();
    for event in XmlEvents::new(text) {
        let event = event.map_err(|e| ImportError::format(FORMAT_NAME, &e.to_string()))?;
        state.handle(event)?;
    }
    state.finish_record();
    Ok(state.records)
}

/// Import format for `CiteSeer` OAI documents.
#[derive(Debug, Default)]
pub struct CiteSeerFormat;

impl CiteSeerFormat {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ImportFormat for CiteSeerFormat {
    fn name(&self) -> &str {
        "citeseer"
    }

    fn description(&self) -> &str {
        "CiteSeer OAI records (oai_citeseer metadata prefix)"
    }

    fn priority(&self) -> FormatPriority {
        FormatPriority::Specialized
    }

    fn recognizes(&self, input: &[u8]) -> bool {
        String::from_utf8_lossy(input).contains("oai_citeseer")
    }

    fn parse(&self, input: &[u8]) -> Result<ParseResult, ImportError> {
        let decoded = decode_input(input, FORMAT_NAME)?;
        let mut result = parse_citeseer(&decoded.text)?.result;
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
   <header><identifier>oai:CiteSeerPSU:12345</identifier></header>
   <metadata>
    <oai_citeseer:oai_citeseer xmlns:oai_citeseer="http://copper.ist.psu.edu/oai/oai_citeseer/"
        xmlns:dc="http://purl.org/dc/elements/1.1/">
     <dc:title>Learning to Rank</dc:title>
     <oai_citeseer:author name="Ada Lovelace"><address>London</address></oai_citeseer:author>
     <oai_citeseer:author name="Alan Turing"/>
     <oai_citeseer:author/>
     <dc:subject>ranking; retrieval</dc:subject>
     <dc:description>An abstract.</dc:description>
     <dc:date>1998-01-01</dc:date>
     <dc:identifier>http://example.org/paper.pdf</dc:identifier>
     <oai_citeseer:relation type="References">
      <oai_citeseer:uri>oai:CiteSeerPSU:111</oai_citeseer:uri>
      <oai_citeseer:uri>oai:CiteSeerPSU:222</oai_citeseer:uri>
      <oai_citeseer:uri>oai:CiteSeerPSU:111</oai_citeseer:uri>
     </oai_citeseer:relation>
     <oai_citeseer:relation type="Is Referenced By">
      <oai_citeseer:uri>oai:CiteSeerPSU:999</oai_citeseer:uri>
     </oai_citeseer:relation>
    </oai_citeseer:oai_citeseer>
   </metadata>
  </record>
 </GetRecord>
</OAI-PMH>"#;

    #[test]
    fn test_parse_record_fields() {
        let records = parse_citeseer(RECORD).unwrap();
        assert_eq!(records.result.len(), 1);
        let entry = &records.result.entries()[0];
        assert_eq!(entry.entry_type(), "misc");
        assert_eq!(entry.field("title"), Some("Learning to Rank"));
        assert_eq!(entry.field("author"), Some("Ada Lovelace and Alan Turing"));
        assert_eq!(entry.field("keywords"), Some("ranking; retrieval"));
        assert_eq!(entry.field("abstract"), Some("An abstract."));
        assert_eq!(entry.field("year"), Some("1998"));
        assert_eq!(entry.field("url"), Some("http://example.org/paper.pdf"));
    }

    #[test]
    fn test_missing_author_name_is_warning() {
        let records = parse_citeseer(RECORD).unwrap();
        assert!(
            records
                .result
                .has_warning("skipped oai_citeseer:author: missing 'name' attribute")
        );
    }

    #[test]
    fn test_collects_references_only() {
        let records = parse_citeseer(RECORD).unwrap();
        assert_eq!(records.cited, ["oai:CiteSeerPSU:111", "oai:CiteSeerPSU:222"]);
    }

    #[test]
    fn test_error_payload() {
        let xml = r#"<OAI-PMH><error code="badArgument">Illegal identifier</error></OAI-PMH>"#;
        let err = parse_citeseer(xml).unwrap_err();
        assert!(err.is_protocol());
    }

    #[test]
    fn test_recognizes() {
        let format = CiteSeerFormat::new();
        assert!(format.recognizes(RECORD.as_bytes()));
        assert!(!format.recognizes(b"<OAI-PMH/>"));
    }
}
