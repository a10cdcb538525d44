//! Pure extraction over rendered-markup snapshots.
//!
//! Everything in this module is synchronous and works on a parsed
//! [`scraper::Html`] document. A document is parsed, read, and dropped inside
//! a single call; only owned values leave these functions, so no DOM handle is
//! ever held across an `await`.

pub mod attrs;
pub mod listing;
pub mod post;
pub mod tree;

use std::sync::LazyLock;

use scraper::{ElementRef, Selector};

pub use attrs::{CommentAttributes, ListingAttributes, PostAttributes};
pub use listing::{ListingPage, parse_listing};
pub use post::{PostSnapshot, parse_post};
pub use tree::TreeExtractor;

pub(crate) static SCORE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".score.unvoted").expect("static selector must parse")
});

/// Parse a score from its rendered text, e.g. `"42 points"` → 42.
///
/// Only the leading whitespace-delimited token is considered. Absent or
/// non-numeric text yields 0.
pub fn parse_score(text: Option<&str>) -> i64 {
    text.and_then(leading_integer).unwrap_or(0)
}

fn leading_integer(text: &str) -> Option<i64> {
    text.split_whitespace().next()?.parse().ok()
}

/// Score of a `.score` element. A numeric leading token in its text wins,
/// zero included. Only when that token is not a number (e.g. "1.2k") is the
/// `title` attribute read, which carries the exact value.
pub(crate) fn score_of(element: Option<ElementRef<'_>>) -> i64 {
    let Some(element) = element else {
        return 0;
    };
    leading_integer(&text_of(element))
        .unwrap_or_else(|| parse_score(element.value().attr("title")))
}

/// Concatenated text content, trimmed.
pub(crate) fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Class-list membership test.
pub(crate) fn has_class(element: ElementRef<'_>, class: &str) -> bool {
    element.value().classes().any(|c| c == class)
}

/// Direct element children, in document order.
pub(crate) fn child_elements<'a>(
    element: ElementRef<'a>,
) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    element.children().filter_map(ElementRef::wrap)
}

#[cfg(test)]
mod tests {
    use scraper::Html;

    use super::*;

    #[test]
    fn test_parse_score() {
        assert_eq!(parse_score(Some("42 points")), 42);
        assert_eq!(parse_score(Some("  -3 points ")), -3);
        assert_eq!(parse_score(Some("1 point")), 1);
        assert_eq!(parse_score(Some("score hidden")), 0);
        assert_eq!(parse_score(Some("•")), 0);
        assert_eq!(parse_score(Some("")), 0);
        assert_eq!(parse_score(None), 0);
    }

    #[test]
    fn test_score_falls_back_to_title() {
        let html = Html::parse_fragment(r#"<div class="score unvoted" title="1234">1.2k</div>"#);
        let el = html.select(&SCORE).next();
        assert_eq!(score_of(el), 1234);
    }

    #[test]
    fn test_rendered_zero_ignores_title() {
        let html = Html::parse_fragment(r#"<div class="score unvoted" title="17">0 points</div>"#);
        let el = html.select(&SCORE).next();
        assert_eq!(score_of(el), 0);
    }

    #[test]
    fn test_score_of_missing_element() {
        assert_eq!(score_of(None), 0);
    }

    #[test]
    fn test_has_class_is_membership() {
        let html = Html::parse_fragment(r#"<div class="thing comment deleted noncollapsed"></div>"#);
        let sel = Selector::parse("div").unwrap();
        let el = html.select(&sel).next().unwrap();
        assert!(has_class(el, "deleted"));
        assert!(has_class(el, "comment"));
        assert!(!has_class(el, "collapsed"));
    }
}
