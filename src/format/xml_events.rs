//! Pull-style XML event iterator shared by the XML formats.
//!
//! Wraps [`quick_xml::Reader`] and flattens its events to owned start, end and
//! text items. Empty elements are reported as a start followed by an end, and
//! an input that ends with open elements is reported as an error.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use thiserror::Error;

/// Parse failure with the byte offset where it was detected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("malformed XML at byte {position}: {message}")]
pub struct XmlError {
    pub position: u64,
    pub message: String,
}

/// One flattened XML event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlEvent {
    /// Element start with its unescaped attributes, in document order
    Start {
        name: String,
        attributes: Vec<(String, String)>,
    },
    /// Element end
    End { name: String },
    /// Character data, unescaped (CDATA included)
    Text(String),
}

impl XmlEvent {
    /// Returns the value of attribute `key` on a start event.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        match self {
            Self::Start { attributes, .. } => attributes
                .iter()
                .find(|(name, _)| name == key || local_name(name) == key)
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }
}

/// Returns the part of a qualified name after the namespace prefix.
#[must_use]
pub fn local_name(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, local)| local)
}

/// Iterator over the events of an in-memory XML document.
pub struct XmlEvents<'a> {
    reader: Reader<&'a [u8]>,
    open: Vec<String>,
    pending_end: Option<String>,
    finished: bool,
}

impl<'a> XmlEvents<'a> {
    #[must_use]
    pub fn new(text: &'a str) -> Self {
        Self {
            reader: Reader::from_str(text),
            open: Vec::new(),
            pending_end: None,
            finished: false,
        }
    }

    /// Returns the name of the current root element, if one has started.
    #[must_use]
    pub fn root(&self) -> Option<&str> {
        self.open.first().map(String::as_str)
    }

    fn error(&self, message: impl Into<String>) -> XmlError {
        XmlError {
            position: self.reader.buffer_position(),
            message: message.into(),
        }
    }

    fn start_event(&self, start: &BytesStart<'_>) -> Result<XmlEvent, XmlError> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| self.error(e.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value().map_or_else(
                |_| String::from_utf8_lossy(&attr.value).into_owned(),
                std::borrow::Cow::into_owned,
            );
            attributes.push((key, value));
        }
        Ok(XmlEvent::Start { name, attributes })
    }
}

impl Iterator for XmlEvents<'_> {
    type Item = Result<XmlEvent, XmlError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(name) = self.pending_end.take() {
            self.open.pop();
            return Some(Ok(XmlEvent::End { name }));
        }
        if self.finished {
            return None;
        }
        loop {
            let event = match self.reader.read_event() {
                Ok(event) => event,
                Err(e) => {
                    self.finished = true;
                    return Some(Err(self.error(e.to_string())));
                }
            };
            match event {
                Event::Start(start) => {
                    let event = self.start_event(&start);
                    if let Ok(XmlEvent::Start { name, .. }) = &event {
                        self.open.push(name.clone());
                    }
                    return Some(event);
                }
                Event::Empty(start) => {
                    let event = self.start_event(&start);
                    if let Ok(XmlEvent::Start { name, .. }) = &event {
                        self.open.push(name.clone());
                        self.pending_end = Some(name.clone());
                    }
                    return Some(event);
                }
                Event::End(end) => {
                    self.open.pop();
                    let name = String::from_utf8_lossy(end.name().as_ref()).into_owned();
                    return Some(Ok(XmlEvent::End { name }));
                }
                Event::Text(text) => {
                    let text = text.unescape().map_or_else(
                        |_| String::from_utf8_lossy(&text).into_owned(),
                        std::borrow::Cow::into_owned,
                    );
                    if !text.is_empty() {
                        return Some(Ok(XmlEvent::Text(text)));
                    }
                }
                Event::CData(data) => {
                    let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    return Some(Ok(XmlEvent::Text(text)));
                }
                Event::Eof => {
                    self.finished = true;
                    if let Some(open) = self.open.last() {
                        let message = format!("unexpected end of input inside <{open}>");
                        return Some(Err(self.error(message)));
                    }
                    return None;
                }
                Event::Decl(_) | Event::PI(_) | Event::Comment(_) | Event::DocType(_) => {}
            }
        }
    }
}
