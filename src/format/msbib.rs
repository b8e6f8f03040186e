//! MS-Office 2007 bibliography XML (`MsBib`) parser.
//!
//! Each `b:Source` element becomes one entry. The `b:` prefix is optional.
//! Names live under `b:Author/<Role>/b:NameList/b:Person` or
//! `b:Author/<Role>/b:Corporate`.

use std::collections::BTreeMap;

use tracing::debug;

use super::{FormatPriority, ImportFormat, XmlEvent, XmlEvents, decode_input, local_name};
use crate::error::{FieldError, ImportError};
use crate::model::{Entry, ParseResult};
use crate::normalize::authors::join_authors;
use crate::normalize::normalize_page_range;

const FORMAT_NAME: &str = "MsBib";

/// Elements copied to an entry field of a different name.
const FIELD_MAP: &[(&str, &str)] = &[
    ("Title", "title"),
    ("Year", "year"),
    ("Month", "month"),
    ("Day", "day"),
    ("ShortTitle", "msbib-shorttitle"),
    ("Comments", "note"),
    ("Volume", "volume"),
    ("NumberVolumes", "msbib-numberofvolume"),
    ("Edition", "edition"),
    ("Publisher", "publisher"),
    ("BookTitle", "booktitle"),
    ("ChapterNumber", "chapter"),
    ("JournalName", "journal"),
    ("Issue", "number"),
    ("PeriodicalTitle", "organization"),
    ("ConferenceName", "organization"),
    ("Department", "school"),
    ("Institution", "institution"),
    ("URL", "url"),
    ("BIBTEX_Series", "series"),
    ("BIBTEX_Abstract", "abstract"),
    ("BIBTEX_KeyWords", "keywords"),
    ("BIBTEX_CrossRef", "crossref"),
    ("BIBTEX_HowPublished", "howpublished"),
    ("BIBTEX_Affiliation", "affiliation"),
    ("BIBTEX_Contents", "contents"),
    ("BIBTEX_Copyright", "copyright"),
    ("BIBTEX_Price", "price"),
    ("BIBTEX_Size", "size"),
];

/// Elements stored as `msbib-<lower-case name>`.
const PREFIXED_FIELDS: &[&str] = &[
    "ProductionCompany",
    "Medium",
    "RecordingNumber",
    "Theater",
    "Distributor",
    "Broadcaster",
    "Station",
    "Type",
    "PatentNumber",
    "Court",
    "Reporter",
    "CaseNumber",
    "AbbreviatedCaseNumber",
];

/// Windows locale identifiers mapped to language names.
const LANGUAGES: &[(u32, &str)] = &[
    (1033, "english"),
    (2057, "english"),
    (1031, "german"),
    (1036, "french"),
    (1034, "spanish"),
    (3082, "spanish"),
    (1040, "italian"),
    (1043, "dutch"),
    (1049, "russian"),
    (2052, "chinese"),
    (1041, "japanese"),
];

fn entry_type_for(source_type: &str) -> &'static str {
    match source_type {
        "Book" => "book",
        "BookSection" => "inbook",
        "JournalArticle" | "ArticleInAPeriodical" => "article",
        "ConferenceProceedings" => "conference",
        "Report" => "techreport",
        "InternetSite" | "DocumentFromInternetSite" | "ElectronicSource" | "Art"
        | "SoundRecording" | "Performance" | "Film" | "Interview" | "Patent" | "Case" => "other",
        _ => "misc",
    }
}

fn role_field(role: &str) -> String {
    match role {
        "Author" => "author".to_string(),
        "Editor" => "editor".to_string(),
        other => format!("msbib-{}", other.to_ascii_lowercase()),
    }
}

/// Raw values collected for one `b:Source`.
#[derive(Default)]
struct SourceRecord {
    values: BTreeMap<String, String>,
    // (field, names) in first-seen role order
    names: Vec<(String, Vec<String>)>,
}

impl SourceRecord {
    fn add_name(&mut self, role: &str, name: String) {
        if name.is_empty() {
            return;
        }
        let field = role_field(role);
        match self.names.iter_mut().find(|(f, _)| *f == field) {
            Some((_, names)) => names.push(name),
            None => self.names.push((field, vec![name])),
        }
    }

    fn value(&self, local: &str) -> Option<&str> {
        self.values
            .get(local)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    fn into_entry(self, result: &mut ParseResult) -> Entry {
        let mut entry = Entry::new(entry_type_for(self.value("SourceType").unwrap_or("")));
        if let Some(tag) = self.value("Tag") {
            entry.set_key(tag);
        }
        for (element, field) in FIELD_MAP {
            if let Some(value) = self.value(element) {
                entry.set_field_if_absent(field, value);
            }
        }
        for element in PREFIXED_FIELDS {
            if let Some(value) = self.value(element) {
                entry.set_field(&format!("msbib-{}", element.to_ascii_lowercase()), value);
            }
        }
        if let Some(pages) = self.value("PageNumbers").or_else(|| self.value("Pages")) {
            entry.set_field("pages", normalize_page_range(pages));
        }
        if let Some(numbers) = self.value("StandardNumber") {
            apply_standard_number(&mut entry, numbers);
        }
        if let Some(address) = self.address() {
            entry.set_field("address", address);
        }
        if let Some(lcid) = self.value("LCID") {
            match language_for(lcid) {
                Some(language) => {
                    entry.set_field("language", language);
                }
                None => result.add_field_error(&FieldError::new(
                    "language",
                    format!("unknown LCID '{lcid}'"),
                )),
            }
        }
        for (field, names) in &self.names {
            entry.set_field(field, join_authors(names));
        }
        entry
    }

    fn address(&self) -> Option<String> {
        let address = format!(
            "{}, {} {}",
            self.value("City").unwrap_or(""),
            self.value("StateProvince").unwrap_or(""),
            self.value("CountryRegion").unwrap_or("")
        );
        let address = address.trim().trim_end_matches(',').trim();
        (!address.is_empty()).then(|| address.to_string())
    }
}

fn language_for(lcid: &str) -> Option<&'static str> {
    let code: u32 = lcid.trim().parse().ok()?;
    LANGUAGES
        .iter()
        .find(|(id, _)| *id == code)
        .map(|(_, language)| *language)
}

/// Splits `:ISBN:..:ISSN:..:LCCN:..:MRN:..` into separate fields.
fn apply_standard_number(entry: &mut Entry, numbers: &str) {
    let parts: Vec<&str> = numbers.split(':').collect();
    let mut i = 0;
    while i < parts.len() {
        let field = match parts[i].trim().to_ascii_uppercase().as_str() {
            "ISBN" => Some("isbn"),
            "ISSN" => Some("issn"),
            "LCCN" => Some("lccn"),
            "MRN" => Some("mrnumber"),
            _ => None,
        };
        match (field, parts.get(i + 1)) {
            (Some(field), Some(value)) => {
                entry.set_field(field, value.trim());
                i += 2;
            }
            _ => i += 1,
        }
    }
}

#[derive(Default)]
struct MsBibState {
    result: ParseResult,
    source: Option<SourceRecord>,
    // Element names below the current `Source`
    path: Vec<String>,
    person: BTreeMap<String, String>,
    text: String,
}

impl MsBibState {
    fn start(&mut self, local: &str) {
        if self.source.is_none() {
            if local == "Source" {
                self.source = Some(SourceRecord::default());
                self.path.clear();
            }
            return;
        }
        if local == "Person" {
            self.person.clear();
        }
        self.path.push(local.to_string());
        if self.in_field() {
            self.text.clear();
        }
    }

    /// True when the innermost open element carries a value.
    fn in_field(&self) -> bool {
        let path: Vec<&str> = self.path.iter().map(String::as_str).collect();
        matches!(
            path.as_slice(),
            [element] if *element != "Author"
        ) || matches!(
            path.as_slice(),
            ["Author", _, "NameList", "Person", _] | ["Author", _, "Corporate"]
        )
    }

    fn end(&mut self, local: &str) {
        if self.source.is_none() {
            return;
        }
        if self.path.is_empty() {
            if local == "Source" {
                self.finish_source();
            }
            return;
        }
        // Markup nested inside a value keeps accumulating into it
        let text = if self.in_field() {
            std::mem::take(&mut self.text)
        } else {
            String::new()
        };
        let text = text.trim();
        let Some(source) = self.source.as_mut() else {
            return;
        };
        let path: Vec<&str> = self.path.iter().map(String::as_str).collect();
        match path.as_slice() {
            ["Author"] => {}
            [element] => {
                source
                    .values
                    .insert((*element).to_string(), text.to_string());
            }
            ["Author", _, "NameList", "Person", part] => {
                self.person.insert((*part).to_string(), text.to_string());
            }
            ["Author", role, "NameList", "Person"] => {
                let name = ["First", "Middle", "Last"]
                    .iter()
                    .filter_map(|part| self.person.get(*part))
                    .map(|part| part.trim())
                    .filter(|part| !part.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ");
                source.add_name(role, name);
            }
            ["Author", role, "Corporate"] if !text.is_empty() => {
                source.add_name(role, format!("{{{text}}}"));
            }
            _ => {}
        }
        self.path.pop();
    }

    fn finish_source(&mut self) {
        if let Some(source) = self.source.take() {
            let entry = source.into_entry(&mut self.result);
            debug!(fields = entry.field_count(), "MsBib source finished");
            self.result.add_entry(entry);
        }
        self.path.clear();
    }
}

/// Import format for MS-Office bibliography XML.
#[derive(Debug, Default)]
pub struct MsBibFormat;

impl MsBibFormat {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ImportFormat for MsBibFormat {
    fn name(&self) -> &str {
        "msbib"
    }

    fn description(&self) -> &str {
        "MS-Office 2007 bibliography XML"
    }

    fn priority(&self) -> FormatPriority {
        FormatPriority::Permissive
    }

    fn recognizes(&self, input: &[u8]) -> bool {
        let Ok(decoded) = decode_input(input, FORMAT_NAME) else {
            return false;
        };
        let mut root = None;
        for event in XmlEvents::new(&decoded.text) {
            match event {
                Err(_) => return false,
                Ok(XmlEvent::Start { name, .. }) if root.is_none() => root = Some(name),
                Ok(_) => {}
            }
        }
        root.is_some_and(|name| local_name(&name).contains("Sources"))
    }

    #[tracing::instrument(skip(self, input), fields(input_len = input.len()))]
    fn parse(&self, input: &[u8]) -> Result<ParseResult, ImportError> {
        let decoded = decode_input(input, FORMAT_NAME)?;
        let mut state = MsBibState::default();
        for event in XmlEvents::new(&decoded.text) {
            match event.map_err(|e| ImportError::format(FORMAT_NAME, &e.to_string()))? {
                XmlEvent::Start { name, .. } => state.start(local_name(&name)),
                XmlEvent::Text(text) => {
                    if state.source.is_some() {
                        state.text.push_str(&text);
                    }
                }
                XmlEvent::End { name } => state.end(local_name(&name)),
            }
        }
        state.finish_source();
        let mut result = state.result;
        result.set_encoding(decoded.encoding.label());
        Ok(result)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SOURCES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<b:Sources xmlns:b="http://schemas.openxmlformats.org/officeDocument/2006/bibliography">
  <b:Source>
    <b:Tag>Knu84</b:Tag>
    <b:SourceType>Book</b:SourceType>
    <b:Title>The TeXbook</b:Title>
    <b:Year>1984</b:Year>
    <b:Author>
      <b:Author><b:NameList>
        <b:Person><b:Last>Knuth</b:Last><b:First>Donald</b:First><b:Middle>E.</b:Middle></b:Person>
      </b:NameList></b:Author>
      <b:Editor><b:NameList>
        <b:Person><b:Last>Doe</b:Last><b:First>Jane</b:First></b:Person>
      </b:NameList></b:Editor>
      <b:Translator><b:Corporate>ACME Translations</b:Corporate></b:Translator>
    </b:Author>
    <b:City>Reading</b:City>
    <b:StateProvince>MA</b:StateProvince>
    <b:CountryRegion>USA</b:CountryRegion>
    <b:StandardNumber>:ISBN:0-201-13447-0:LCCN:83-12345</b:StandardNumber>
    <b:LCID>1033</b:LCID>
    <b:Pages>1 - 483</b:Pages>
    <b:Medium>Print</b:Medium>
  </b:Source>
  <b:Source>
    <b:SourceType>Film</b:SourceType>
    <b:Title>Metropolis</b:Title>
    <b:City></b:City>
    <b:LCID>9999</b:LCID>
  </b:Source>
</b:Sources>"#;

    #[test]
    fn test_parse_book() {
        let result = MsBibFormat::new().parse(SOURCES.as_bytes()).unwrap();
        assert_eq!(result.len(), 2);
        let book = &result.entries()[0];
        assert_eq!(book.entry_type(), "book");
        assert_eq!(book.key(), Some("Knu84"));
        assert_eq!(book.field("title"), Some("The TeXbook"));
        assert_eq!(book.field("author"), Some("Donald E. Knuth"));
        assert_eq!(book.field("editor"), Some("Jane Doe"));
        assert_eq!(book.field("msbib-translator"), Some("{ACME Translations}"));
        assert_eq!(book.field("address"), Some("Reading, MA USA"));
        assert_eq!(book.field("isbn"), Some("0-201-13447-0"));
        assert_eq!(book.field("lccn"), Some("83-12345"));
        assert_eq!(book.field("language"), Some("english"));
        assert_eq!(book.field("pages"), Some("1--483"));
        assert_eq!(book.field("msbib-medium"), Some("Print"));
    }

    #[test]
    fn test_film_maps_to_other_without_address() {
        let result = MsBibFormat::new().parse(SOURCES.as_bytes()).unwrap();
        let film = &result.entries()[1];
        assert_eq!(film.entry_type(), "other");
        assert!(!film.has_field("address"));
        assert!(result.has_warning("skipped language: unknown LCID '9999'"));
    }

    #[test]
    fn test_unprefixed_elements() {
        let xml = "<Sources><Source><SourceType>JournalArticle</SourceType>\
                   <JournalName>Nature</JournalName><Issue>7</Issue></Source></Sources>";
        let result = MsBibFormat::new().parse(xml.as_bytes()).unwrap();
        let article = &result.entries()[0];
        assert_eq!(article.entry_type(), "article");
        assert_eq!(article.field("journal"), Some("Nature"));
        assert_eq!(article.field("number"), Some("7"));
    }

    #[test]
    fn test_mixed_content_keeps_text_before_nested_markup() {
        let xml = "<Sources><Source><Title>Deep <i>and</i> wide</Title>\
                   <Author><Author><NameList><Person><Last>Roe</Last></Person>\
                   </NameList></Author></Author></Source></Sources>";
        let result = MsBibFormat::new().parse(xml.as_bytes()).unwrap();
        let entry = &result.entries()[0];
        assert_eq!(entry.field("title"), Some("Deep and wide"));
        assert_eq!(entry.field("author"), Some("Roe"));
    }

    #[test]
    fn test_address_of_city_only() {
        let xml = "<Sources><Source><City>Berlin</City></Source></Sources>";
        let result = MsBibFormat::new().parse(xml.as_bytes()).unwrap();
        assert_eq!(result.entries()[0].field("address"), Some("Berlin"));
        assert_eq!(result.entries()[0].entry_type(), "misc");
    }

    #[test]
    fn test_recognizes_only_well_formed_sources() {
        let format = MsBibFormat::new();
        assert!(format.recognizes(SOURCES.as_bytes()));
        assert!(!format.recognizes(b"<Other><a/></Other>"));
        assert!(!format.recognizes(b"<b:Sources><b:Source></b:Sources>"));
        assert!(!format.recognizes(b"@article{a,}"));
    }
}
