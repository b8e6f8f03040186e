//! Brace protection for terms whose letter case must survive bibliography styles.

use std::cmp::Reverse;

/// Terms protected when no custom list is configured.
pub const DEFAULT_PROTECTED_TERMS: &[&str] = &[
    "ACM", "AI", "API", "ASIC", "ATM", "CMOS", "CORBA", "CPU", "DNA", "DSP", "FPGA", "GaAs",
    "GaN", "GPU", "HTML", "HTTP", "IEEE", "IP", "ISO", "Java", "LAN", "LaTeX", "Linux",
    "MIMO", "MOSFET", "OFDM", "QoS", "RF", "RNA", "SiC", "SQL", "TCP", "UML", "Unix",
    "VLSI", "WLAN", "XML",
];

/// Characters allowed immediately before a protected term.
const LEADING_BOUNDARY: [char; 7] = [' ', '-', '/', '[', '(', '}', '"'];

/// Wraps whole-word occurrences of protected terms in `{...}`.
///
/// Terms are applied longest first so a short term never splits a longer one.
/// An occurrence counts when it is preceded by start-of-text or one of
/// `space - / [ ( } "` and followed by end-of-text or any character other
/// than `}`. A term that is already braced is preceded by `{`, so running the
/// protector twice changes nothing.
#[derive(Debug, Clone)]
pub struct CaseKeeper {
    terms: Vec<String>,
}

impl CaseKeeper {
    /// Creates a protector for the given terms; blank terms are ignored.
    #[must_use]
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut terms: Vec<String> = terms
            .into_iter()
            .map(|t| t.as_ref().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        terms.sort_by_cached_key(|t| (Reverse(t.chars().count()), t.clone()));
        terms.dedup();
        Self { terms }
    }

    /// Builds a protector from a term list file body: one term per line,
    /// `#` starts a comment line.
    #[must_use]
    pub fn from_lines(text: &str) -> Self {
        Self::new(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#')),
        )
    }

    /// Returns the terms in application order (longest first).
    #[must_use]
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Returns `text` with every protected term occurrence wrapped in braces.
    #[must_use]
    pub fn protect(&self, text: &str) -> String {
        self.terms
            .iter()
            .fold(text.to_string(), |current, term| protect_term(&current, term))
    }
}

impl Default for CaseKeeper {
    fn default() -> Self {
        Self::new(DEFAULT_PROTECTED_TERMS)
    }
}

fn protect_term(text: &str, term: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    let mut copied = 0;
    for (start, _) in text.match_indices(term) {
        let end = start + term.len();
        let leading_ok = text[..start]
            .chars()
            .next_back()
            .is_none_or(|c| LEADING_BOUNDARY.contains(&c));
        let trailing_ok = text[end..].chars().next().is_none_or(|c| c != '}');
        if leading_ok && trailing_ok {
            out.push_str(&text[copied..start]);
            out.push('{');
            out.push_str(term);
            out.push('}');
            copied = end;
        }
    }
    out.push_str(&text[copied..]);
    out
}
