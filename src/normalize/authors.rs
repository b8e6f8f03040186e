//! Author-list helpers.

use std::sync::LazyLock;

use regex::Regex;

use super::compile_static_regex;

/// Separator between names in a BibTeX author list.
pub const AUTHOR_SEPARATOR: &str = " and ";

static AND_SPLIT: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"(?i)\s+and\s+"));

/// Joins names with `" and "`, skipping blank ones.
#[must_use]
pub fn join_authors<I, S>(names: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .map(|name| name.as_ref().trim().to_string())
        .filter(|name| !name.is_empty())
        .collect::<Vec<_>>()
        .join(AUTHOR_SEPARATOR)
}

/// Splits an author list on `and` (any case) into trimmed names.
#[must_use]
pub fn split_authors(list: &str) -> Vec<String> {
    AND_SPLIT
        .split(list.trim())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Rewrites a `;`-separated name list as a BibTeX `and` list.
#[must_use]
pub fn semicolon_list_to_and(list: &str) -> String {
    join_authors(list.split(';'))
}

/// Rewrites every name of an `and` list to the "Last, First" convention.
///
/// Names that already contain a comma are kept (whitespace tidied). Otherwise
/// the final word is the last name, together with any lower-case particles
/// just before it ("van", "de", "von"); single-word names stay as they are.
#[must_use]
pub fn fix_author_last_first(list: &str) -> String {
    join_authors(split_authors(list).iter().map(|name| last_first(name)))
}

fn last_first(name: &str) -> String {
    if let Some((last, first)) = name.split_once(',') {
        let last = last.split_whitespace().collect::<Vec<_>>().join(" ");
        let first = first.split_whitespace().collect::<Vec<_>>().join(" ");
        return if first.is_empty() {
            last
        } else {
            format!("{last}, {first}")
        };
    }

    let words: Vec<&str> = name.split_whitespace().collect();
    if words.len() < 2 {
        return words.join(" ");
    }
    let mut last_start = words.len() - 1;
    while last_start > 1 && is_particle(words[last_start - 1]) {
        last_start -= 1;
    }
    format!(
        "{}, {}",
        words[last_start..].join(" "),
        words[..last_start].join(" ")
    )
}

fn is_particle(word: &str) -> bool {
    word.chars().next().is_some_and(char::is_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_authors_skips_blank() {
        assert_eq!(join_authors(["J. Smith", " ", "A. Doe"]), "J. Smith and A. Doe");
        assert_eq!(join_authors(Vec::<String>::new()), "");
    }

    #[test]
    fn test_split_authors_any_case() {
        assert_eq!(
            split_authors("Smith, J. AND Doe, A.\nand Lee, M."),
            ["Smith, J.", "Doe, A.", "Lee, M."]
        );
    }

    #[test]
    fn test_semicolon_list() {
        assert_eq!(semicolon_list_to_and("Smith, J.; Doe, A."), "Smith, J. and Doe, A.");
    }

    #[test]
    fn test_last_first_keeps_comma_names() {
        assert_eq!(
            fix_author_last_first("Smith, J. and Doe,   A."),
            "Smith, J. and Doe, A."
        );
    }

    #[test]
    fn test_last_first_reorders_plain_names() {
        assert_eq!(
            fix_author_last_first("John Smith and Ludwig van Beethoven and Plato"),
            "Smith, John and van Beethoven, Ludwig and Plato"
        );
    }
}
