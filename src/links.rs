//! URL detection over terminal row text.
//!
//! Scans one row at a time for `http://` / `https://` substrings and maps
//! them to character-column spans so the hover overlay can hit-test the
//! pointer against them. Matches are found greedily left-to-right and
//! never overlap. Columns are character positions, not byte offsets, so
//! rows containing multi-byte text still line up with the grid.

use once_cell::sync::Lazy;
use regex::Regex;

/// A scheme followed by anything that is not whitespace or a character
/// that conventionally terminates a URL in running text.
static URL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^\s{}\])>"',;|`]+"#).unwrap());

/// One URL found in a row, with its character-column span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlMatch {
    pub text: String,
    pub row: usize,
    /// First column of the match, inclusive.
    pub start_col: usize,
    /// One past the last column of the match.
    pub end_col: usize,
}

impl UrlMatch {
    /// Whether `column` falls inside this match's span.
    pub fn contains_column(&self, column: usize) -> bool {
        column >= self.start_col && column < self.end_col
    }
}

/// All URL matches in one row, left-to-right.
pub fn matches_in_row(row: usize, text: &str) -> Vec<UrlMatch> {
    URL_REGEX
        .find_iter(text)
        .map(|m| {
            let start_col = text[..m.start()].chars().count();
            let len = m.as_str().chars().count();
            UrlMatch {
                text: m.as_str().to_string(),
                row,
                start_col,
                end_col: start_col + len,
            }
        })
        .collect()
}

/// The URL whose span contains `column`, if any.
///
/// Matches are non-overlapping, so at most one can contain the column;
/// scanning left-to-right and taking the first hit is unambiguous.
pub fn url_at(row: usize, text: &str, column: usize) -> Option<UrlMatch> {
    matches_in_row(row, text)
        .into_iter()
        .find(|m| m.contains_column(column))
}

// ---------------------------------------------------------------------------
// Opening URLs
// ---------------------------------------------------------------------------

/// Hands a detected URL to the environment's default handler.
///
/// Trait-shaped so tests can substitute a recorder for the real opener.
pub trait UrlOpener {
    fn open(&self, url: &str);
}

/// Opens via the OS default handler, best-effort. A string that does not
/// parse as a URL is dropped silently; open failures are logged and
/// otherwise ignored.
pub struct SystemOpener;

impl UrlOpener for SystemOpener {
    fn open(&self, url: &str) {
        match url::Url::parse(url) {
            Ok(parsed) => {
                if let Err(e) = open::that_detached(parsed.as_str()) {
                    tracing::warn!("failed to open {url}: {e}");
                }
            }
            Err(e) => {
                tracing::debug!("ignoring malformed URL {url:?}: {e}");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_urls_left_to_right() {
        let text = "see http://a.com and https://b.com/x";
        let found = matches_in_row(3, text);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].text, "http://a.com");
        assert_eq!(found[1].text, "https://b.com/x");
        assert!(found[0].end_col <= found[1].start_col, "matches must not overlap");
    }

    #[test]
    fn column_lookup_selects_the_right_match() {
        let text = "see http://a.com and https://b.com/x";
        // Column inside "a.com" portion of the first URL.
        let first_start = "see ".chars().count();
        let hit = url_at(0, text, first_start + 9).expect("first URL");
        assert_eq!(hit.text, "http://a.com");
        // Column inside "b.com/x" portion of the second URL.
        let second_start = "see http://a.com and ".chars().count();
        let hit = url_at(0, text, second_start + 10).expect("second URL");
        assert_eq!(hit.text, "https://b.com/x");
    }

    #[test]
    fn span_is_start_inclusive_end_exclusive() {
        let text = "x https://e.org y";
        let m = matches_in_row(0, text).remove(0);
        assert!(url_at(0, text, m.start_col).is_some());
        assert!(url_at(0, text, m.end_col - 1).is_some());
        assert!(url_at(0, text, m.end_col).is_none());
        assert!(url_at(0, text, m.start_col - 1).is_none());
    }

    #[test]
    fn match_includes_scheme_exactly() {
        let text = "https://example.com/path?q=1";
        let m = matches_in_row(0, text).remove(0);
        assert_eq!(m.text, text);
        assert_eq!(m.start_col, 0);
        assert_eq!(m.end_col, text.chars().count());
    }

    #[test]
    fn parenthesised_url_excludes_the_paren() {
        let found = matches_in_row(0, "(https://x.com/y)");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].text, "https://x.com/y");
    }

    #[test]
    fn delimiters_terminate_the_match() {
        for (text, expected) in [
            ("go to https://a.io/p, then stop", "https://a.io/p"),
            ("<https://a.io/p>", "https://a.io/p"),
            ("\"https://a.io/p\"", "https://a.io/p"),
            ("'https://a.io/p'", "https://a.io/p"),
            ("`https://a.io/p`", "https://a.io/p"),
            ("[https://a.io/p]", "https://a.io/p"),
            ("{https://a.io/p}", "https://a.io/p"),
            ("https://a.io/p{brace", "https://a.io/p"),
            ("https://a.io/p;next", "https://a.io/p"),
            ("https://a.io/p|pipe", "https://a.io/p"),
        ] {
            let found = matches_in_row(0, text);
            assert_eq!(found.len(), 1, "in {text:?}");
            assert_eq!(found[0].text, expected, "in {text:?}");
        }
    }

    #[test]
    fn scheme_is_case_sensitive() {
        assert!(matches_in_row(0, "HTTP://upper.example").is_empty());
        assert!(matches_in_row(0, "Https://mixed.example").is_empty());
    }

    #[test]
    fn scheme_alone_is_not_a_match() {
        assert!(matches_in_row(0, "http:// and nothing").is_empty());
        assert!(matches_in_row(0, "plain text").is_empty());
        assert!(matches_in_row(0, "").is_empty());
    }

    #[test]
    fn columns_are_characters_not_bytes() {
        // Multi-byte text before the URL shifts byte offsets but not columns.
        let text = "héllo → https://u.example/ü end";
        let m = matches_in_row(0, text).remove(0);
        let expected_start = "héllo → ".chars().count();
        assert_eq!(m.start_col, expected_start);
        assert_eq!(m.text, "https://u.example/ü");
        assert_eq!(m.end_col - m.start_col, m.text.chars().count());
    }

    #[test]
    fn row_is_carried_through() {
        let m = url_at(7, "https://r.example", 0).expect("match");
        assert_eq!(m.row, 7);
    }
}
