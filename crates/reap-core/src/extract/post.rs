use std::sync::LazyLock;

use scraper::{Html, Selector};

use super::attrs::PostAttributes;
use super::tree::TreeExtractor;
use super::{SCORE, score_of, text_of};
use crate::error::AppError;
use crate::models::DiscussionNode;

static CONTAINER: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#siteTable > .thing").expect("static selector must parse"));
static TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.title").expect("static selector must parse"));
static BODY: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".expando .usertext-body").expect("static selector must parse")
});
static DISCUSSION: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".commentarea > .sitetable").expect("static selector must parse")
});

/// Fields read from a detail page snapshot.
#[derive(Debug)]
pub struct PostSnapshot {
    pub attrs: PostAttributes,
    pub title: String,
    pub score: i64,
    pub body_text: String,
    /// Result of tree extraction; the caller decides how to degrade.
    pub discussion: Result<Vec<DiscussionNode>, AppError>,
}

/// Read a detail page snapshot.
///
/// A page without a primary container yields default fields; a page without
/// a discussion container yields an empty discussion.
pub fn parse_post(html: &str, extractor: &TreeExtractor) -> PostSnapshot {
    let doc = Html::parse_document(html);
    let container = doc.select(&CONTAINER).next();

    let attrs = container
        .map(PostAttributes::from_element)
        .unwrap_or_default();
    let title = container
        .and_then(|c| c.select(&TITLE).next())
        .map(text_of)
        .unwrap_or_default();
    let score = score_of(container.and_then(|c| c.select(&SCORE).next()));
    let body_text = container
        .and_then(|c| c.select(&BODY).next())
        .map(text_of)
        .unwrap_or_default();

    let discussion = match doc.select(&DISCUSSION).next() {
        Some(section) => extractor.extract(section),
        None => Ok(Vec::new()),
    };

    PostSnapshot {
        attrs,
        title,
        score,
        body_text,
        discussion,
    }
}
