//! Heuristic HTML stripping for scraped text.
//!
//! This is not an HTML parser. Entities and tags are recognized only when
//! they close within a small window; anything longer passes through verbatim.

/// `;` must appear within this many characters after `&`.
const MAX_ENTITY_LENGTH: usize = 10;
/// `>` must appear within this many characters after `<`.
const MAX_TAG_LENGTH: usize = 20;

/// Quote entities rewritten before the generic pass drops the rest.
const QUOTE_ENTITIES: [(&str, &str); 8] = [
    ("&ldquo;", "\u{201C}"),
    ("&rdquo;", "\u{201D}"),
    ("&lsquo;", "\u{2018}"),
    ("&rsquo;", "\u{2019}"),
    ("&quot;", "\""),
    ("&#34;", "\""),
    ("&apos;", "'"),
    ("&#39;", "'"),
];

/// Drops HTML entities and tags in one left-to-right scan.
///
/// On `&` the whole entity up to `;` is dropped when `;` follows within the
/// entity window; on `<` the whole tag up to `>` is dropped when `>` follows
/// within the tag window. Everything else, including an `&` or `<` that does
/// not close in time, is copied unchanged.
#[must_use]
pub fn strip_html(text: &str) -> String {
    let mut prepared = text.to_string();
    for (entity, replacement) in QUOTE_ENTITIES {
        if prepared.contains(entity) {
            prepared = prepared.replace(entity, replacement);
        }
    }

    let chars: Vec<char> = prepared.chars().collect();
    let mut out = String::with_capacity(prepared.len());
    let mut index = 0;
    while index < chars.len() {
        let ch = chars[index];
        let close = match ch {
            '&' => closing_within(&chars, index, ';', MAX_ENTITY_LENGTH),
            '<' => closing_within(&chars, index, '>', MAX_TAG_LENGTH),
            _ => None,
        };
        if let Some(end) = close {
            index = end + 1;
        } else {
            out.push(ch);
            index += 1;
        }
    }
    out
}

fn closing_within(chars: &[char], open: usize, close: char, window: usize) -> Option<usize> {
    chars[open + 1..]
        .iter()
        .take(window - 1)
        .position(|&c| c == close)
        .map(|offset| open + 1 + offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_short_tags() {
        assert_eq!(strip_html("<b>Bold</b> and <i>italic</i>"), "Bold and italic");
    }

    #[test]
    fn test_drops_entities() {
        assert_eq!(strip_html("caf&eacute; &amp; bar"), "caf  bar");
    }

    #[test]
    fn test_quote_entities_are_mapped() {
        assert_eq!(
            strip_html("&ldquo;quoted&rdquo; and &quot;plain&quot;"),
            "\u{201C}quoted\u{201D} and \"plain\""
        );
    }

    #[test]
    fn test_unterminated_ampersand_left_untouched() {
        let text = "AT&T merged with a company; shares rose";
        assert_eq!(strip_html(text), text);
        assert_eq!(strip_html("trailing &"), "trailing &");
    }

    #[test]
    fn test_unterminated_angle_left_untouched() {
        assert_eq!(strip_html("x < y"), "x < y");
        assert_eq!(strip_html("ends with <"), "ends with <");
    }

    #[test]
    fn test_tag_beyond_window_left_verbatim() {
        let text = r#"<span class="a-very-long-class">x"#;
        assert_eq!(strip_html(text), text);
    }

    #[test]
    fn test_entity_window_boundary() {
        // ';' nine characters after '&' is inside the window, ten is not.
        assert_eq!(strip_html("a&12345678;b"), "ab");
        assert_eq!(strip_html("a&123456789;b"), "a&123456789;b");
    }

    #[test]
    fn test_tag_window_boundary() {
        let inside = format!("<{}>", "x".repeat(18));
        assert_eq!(strip_html(&inside), "");
        let outside = format!("<{}>", "x".repeat(19));
        assert_eq!(strip_html(&outside), outside);
    }

    #[test]
    fn test_non_ascii_text_passes_through() {
        assert_eq!(strip_html("Gödel <sup>2</sup>"), "Gödel 2");
    }
}
