//! Byte-to-text decoding with encoding detection.
//!
//! Order of precedence: byte-order mark, UTF-16 null-byte pattern, an encoding
//! declared in an XML prolog or a JabRef file header, then UTF-8 with an
//! ISO-8859-1 fallback.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ImportError;
use crate::normalize::compile_static_regex;

/// How many leading bytes are inspected for an encoding declaration.
const DECLARATION_SCAN_BYTES: usize = 1024;

/// Signature written at the top of files saved by JabRef.
const JABREF_SIGNATURE: &str = "This file was created with JabRef";

static XML_DECLARED_ENCODING: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"<\?xml[^>]*encoding\s*=\s*["']([A-Za-z0-9._:-]+)["']"#)
});
static HEADER_DECLARED_ENCODING: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"(?m)^%\s*Encoding:\s*(\S+)"));

/// Text encodings the importer can decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Utf16Le,
    Utf16Be,
    Latin1,
    Ascii,
}

impl TextEncoding {
    /// Returns the canonical label stored on parse results.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Utf8 => "UTF-8",
            Self::Utf16Le => "UTF-16LE",
            Self::Utf16Be => "UTF-16BE",
            Self::Latin1 => "ISO-8859-1",
            Self::Ascii => "US-ASCII",
        }
    }

    /// Maps a declared encoding name to an encoding.
    ///
    /// Plain `UTF-16` is not accepted here: a declaration readable as ASCII
    /// means the bytes are not UTF-16.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized: String = label
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_ascii_uppercase();
        match normalized.as_str() {
            "UTF8" | "UTF8N" => Some(Self::Utf8),
            "ISO88591" | "LATIN1" | "L1" | "ISOLATIN1" | "8859_1" => Some(Self::Latin1),
            "USASCII" | "ASCII" => Some(Self::Ascii),
            _ => None,
        }
    }
}

/// Decoded text together with the encoding that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    /// Decoded text, without byte-order mark
    pub text: String,
    /// Encoding used
    pub encoding: TextEncoding,
}

/// Decodes `input` for the named format.
///
/// # Errors
///
/// Returns [`ImportError::Format`] when the bytes are invalid for a declared
/// or byte-order-marked encoding, or when the declared encoding is unsupported.
pub fn decode_input(input: &[u8], format: &str) -> Result<DecodedText, ImportError> {
    if let Some(rest) = input.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return decode_as(rest, TextEncoding::Utf8, format);
    }
    if let Some(rest) = input.strip_prefix(&[0xFF, 0xFE]) {
        return decode_as(rest, TextEncoding::Utf16Le, format);
    }
    if let Some(rest) = input.strip_prefix(&[0xFE, 0xFF]) {
        return decode_as(rest, TextEncoding::Utf16Be, format);
    }
    if let [first, second, ..] = input {
        if *first != 0 && *second == 0 {
            return decode_as(input, TextEncoding::Utf16Le, format);
        }
        if *first == 0 && *second != 0 {
            return decode_as(input, TextEncoding::Utf16Be, format);
        }
    }

    if let Some(label) = declared_encoding(input) {
        if let Some(encoding) = TextEncoding::from_label(&label) {
            return decode_as(input, encoding, format);
        }
        if !label.to_ascii_uppercase().starts_with("UTF") {
            return Err(ImportError::undecodable(
                format,
                &format!("unsupported declared encoding '{label}'"),
            ));
        }
    }

    match std::str::from_utf8(input) {
        Ok(text) => Ok(DecodedText {
            text: text.to_string(),
            encoding: TextEncoding::Utf8,
        }),
        Err(_) => decode_as(input, TextEncoding::Latin1, format),
    }
}

fn declared_encoding(input: &[u8]) -> Option<String> {
    let head = &input[..input.len().min(DECLARATION_SCAN_BYTES)];
    let head = String::from_utf8_lossy(head);
    if let Some(caps) = XML_DECLARED_ENCODING.captures(&head) {
        return Some(caps[1].to_string());
    }
    if head.contains(JABREF_SIGNATURE) {
        return HEADER_DECLARED_ENCODING
            .captures(&head)
            .map(|caps| caps[1].to_string());
    }
    None
}

fn decode_as(
    input: &[u8],
    encoding: TextEncoding,
    format: &str,
) -> Result<DecodedText, ImportError> {
    let text = match encoding {
        TextEncoding::Utf8 => std::str::from_utf8(input)
            .map_err(|e| ImportError::undecodable(format, &format!("invalid UTF-8: {e}")))?
            .to_string(),
        TextEncoding::Latin1 => input.iter().map(|&b| char::from(b)).collect(),
        TextEncoding::Ascii => {
            if let Some(offset) = input.iter().position(|b| !b.is_ascii()) {
                return Err(ImportError::undecodable(
                    format,
                    &format!("byte 0x{:02X} at offset {offset} is not ASCII", input[offset]),
                ));
            }
            input.iter().map(|&b| char::from(b)).collect()
        }
        TextEncoding::Utf16Le | TextEncoding::Utf16Be => decode_utf16(input, encoding, format)?,
    };
    Ok(DecodedText {
        text: text.strip_prefix('\u{FEFF}').map(str::to_string).unwrap_or(text),
        encoding,
    })
}

fn decode_utf16(input: &[u8], encoding: TextEncoding, format: &str) -> Result<String, ImportError> {
    let chunks = input.chunks_exact(2);
    if !chunks.remainder().is_empty() {
        return Err(ImportError::undecodable(
            format,
            "odd number of bytes in UTF-16 input",
        ));
    }
    let units = chunks.map(|pair| {
        let bytes = [pair[0], pair[1]];
        if encoding == TextEncoding::Utf16Le {
            u16::from_le_bytes(bytes)
        } else {
            u16::from_be_bytes(bytes)
        }
    });
    char::decode_utf16(units)
        .collect::<Result<String, _>>()
        .map_err(|e| ImportError::undecodable(format, &format!("invalid UTF-16: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_utf8() {
        let decoded = decode_input("Gödel".as_bytes(), "test").unwrap();
        assert_eq!(decoded.text, "Gödel");
        assert_eq!(decoded.encoding, TextEncoding::Utf8);
    }

    #[test]
    fn test_utf8_bom_stripped() {
        let decoded = decode_input(b"\xEF\xBB\xBF@article{a,}", "test").unwrap();
        assert_eq!(decoded.text, "@article{a,}");
    }

    #[test]
    fn test_latin1_fallback() {
        let decoded = decode_input(b"G\xF6del", "test").unwrap();
        assert_eq!(decoded.text, "Gödel");
        assert_eq!(decoded.encoding, TextEncoding::Latin1);
    }

    #[test]
    fn test_utf16le_with_bom() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "<a/>".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let decoded = decode_input(&bytes, "test").unwrap();
        assert_eq!(decoded.text, "<a/>");
        assert_eq!(decoded.encoding, TextEncoding::Utf16Le);
    }

    #[test]
    fn test_utf16be_without_bom_detected() {
        let bytes: Vec<u8> = "<a/>".encode_utf16().flat_map(u16::to_be_bytes).collect();
        let decoded = decode_input(&bytes, "test").unwrap();
        assert_eq!(decoded.text, "<a/>");
        assert_eq!(decoded.encoding, TextEncoding::Utf16Be);
    }

    #[test]
    fn test_odd_utf16_is_format_error() {
        let err = decode_input(&[0xFF, 0xFE, 0x41], "MsBib").unwrap_err();
        assert!(err.to_string().contains("MsBib"));
    }

    #[test]
    fn test_xml_declared_latin1() {
        let decoded = decode_input(
            b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><t>\xE9</t>",
            "test",
        )
        .unwrap();
        assert_eq!(decoded.encoding, TextEncoding::Latin1);
        assert!(decoded.text.contains('é'));
    }

    #[test]
    fn test_declared_utf8_but_invalid_is_error() {
        let result = decode_input(b"<?xml version=\"1.0\" encoding=\"UTF-8\"?><t>\xE9</t>", "x");
        assert!(result.is_err());
    }

    #[test]
    fn test_unsupported_declared_encoding_is_error() {
        let err = decode_input(b"<?xml version=\"1.0\" encoding=\"Shift_JIS\"?><t/>", "x")
            .unwrap_err();
        assert!(err.to_string().contains("Shift_JIS"));
    }

    #[test]
    fn test_jabref_header_encoding() {
        let input = b"% This file was created with JabRef 2.3.\n% Encoding: ISO8859_1\n\n@misc{a, title={\xE9}}";
        let decoded = decode_input(input, "BibTeX").unwrap();
        assert_eq!(decoded.encoding, TextEncoding::Latin1);
    }

    #[test]
    fn test_ascii_rejects_high_bytes() {
        let err = decode_input(b"<?xml version=\"1.0\" encoding=\"US-ASCII\"?>\xE9", "x")
            .unwrap_err();
        assert!(err.to_string().contains("not ASCII"));
    }
}
