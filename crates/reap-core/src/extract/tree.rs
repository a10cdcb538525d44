use std::sync::LazyLock;

use scraper::{ElementRef, Selector};

use super::attrs::CommentAttributes;
use super::{SCORE, child_elements, has_class, score_of, text_of};
use crate::config::DEFAULT_MAX_COMMENT_DEPTH;
use crate::error::AppError;
use crate::models::DiscussionNode;

static TIME: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("time[datetime]").expect("static selector must parse"));
static BODY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".usertext-body").expect("static selector must parse"));

/// Recursive-descent extractor for nested comment trees.
///
/// Reads a discussion container (a `.sitetable` holding `.thing.comment`
/// items) and returns owned [`DiscussionNode`] values. Only direct children of
/// a container become siblings; replies are found in each item's own
/// `.child > .sitetable` section.
#[derive(Debug, Clone, Copy)]
pub struct TreeExtractor {
    max_depth: usize,
}

impl Default for TreeExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_COMMENT_DEPTH)
    }
}

impl TreeExtractor {
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth: max_depth.max(1),
        }
    }

    pub fn extract(&self, container: ElementRef<'_>) -> Result<Vec<DiscussionNode>, AppError> {
        self.extract_level(container, 0)
    }

    fn extract_level(
        &self,
        container: ElementRef<'_>,
        depth: usize,
    ) -> Result<Vec<DiscussionNode>, AppError> {
        if depth >= self.max_depth {
            return Err(AppError::ExtractionError(format!(
                "discussion nested deeper than {} levels",
                self.max_depth
            )));
        }

        child_elements(container)
            .filter(|el| has_class(*el, "thing") && has_class(*el, "comment"))
            .map(|item| self.extract_node(item, depth))
            .collect()
    }

    fn extract_node(&self, item: ElementRef<'_>, depth: usize) -> Result<DiscussionNode, AppError> {
        let attrs = CommentAttributes::from_element(item);

        // Reads are scoped to the item's own entry so replies never leak in.
        let entry = child_elements(item).find(|el| has_class(*el, "entry"));

        let posted_at = entry
            .and_then(|e| e.select(&TIME).next())
            .and_then(|t| t.value().attr("datetime"))
            .unwrap_or_default()
            .to_string();
        let text = entry
            .and_then(|e| e.select(&BODY).next())
            .map(text_of)
            .unwrap_or_default();
        let score = score_of(entry.and_then(|e| e.select(&SCORE).next()));

        let children = match child_section(item) {
            Some(section) => self.extract_level(section, depth + 1)?,
            None => Vec::new(),
        };

        Ok(DiscussionNode {
            id: attrs.id,
            author: attrs.author,
            posted_at,
            text,
            score,
            children,
            is_deleted: attrs.is_deleted,
            is_collapsed: attrs.is_collapsed,
        })
    }
}

/// The `.child > .sitetable` section of an item, if it has one.
fn child_section(item: ElementRef<'_>) -> Option<ElementRef<'_>> {
    child_elements(item)
        .find(|el| has_class(*el, "child"))
        .and_then(|child| child_elements(child).find(|el| has_class(*el, "sitetable")))
}

#[cfg(test)]
mod tests {
    use scraper::Html;

    use super::*;
    use crate::testutil::{CommentFixture, comment_area};

    static CONTAINER: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse(".commentarea > .sitetable").unwrap());

    fn extract(html: &str, extractor: TreeExtractor) -> Result<Vec<DiscussionNode>, AppError> {
        let doc = Html::parse_document(html);
        let container = doc.select(&CONTAINER).next().unwrap();
        extractor.extract(container)
    }

    #[test]
    fn empty_container_yields_empty_sequence() {
        let nodes = extract(&comment_area(&[]), TreeExtractor::default()).unwrap();
        assert!(nodes.is_empty());
    }

    #[test]
    fn reads_fields_of_a_single_comment() {
        let html = comment_area(&[CommentFixture::new("t1_a", "alice")
            .score("17 points")
            .time("2024-05-01T12:00:00+00:00")
            .text("First!")]);
        let nodes = extract(&html, TreeExtractor::default()).unwrap();

        assert_eq!(nodes.len(), 1);
        let node = &nodes[0];
        assert_eq!(node.id.as_deref(), Some("t1_a"));
        assert_eq!(node.author, "alice");
        assert_eq!(node.posted_at, "2024-05-01T12:00:00+00:00");
        assert_eq!(node.text, "First!");
        assert_eq!(node.score, 17);
        assert!(node.children.is_empty());
        assert!(!node.is_deleted);
        assert!(!node.is_collapsed);
    }

    #[test]
    fn nested_replies_become_children_not_siblings() {
        let html = comment_area(&[
            CommentFixture::new("t1_a", "alice").reply(
                CommentFixture::new("t1_b", "bob").reply(CommentFixture::new("t1_c", "carol")),
            ),
            CommentFixture::new("t1_d", "dave"),
        ]);
        let nodes = extract(&html, TreeExtractor::default()).unwrap();

        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].id.as_deref(), Some("t1_a"));
        assert_eq!(nodes[1].id.as_deref(), Some("t1_d"));
        assert_eq!(nodes[0].children.len(), 1);
        assert_eq!(nodes[0].children[0].author, "bob");
        assert_eq!(nodes[0].children[0].children[0].author, "carol");
        assert!(nodes[1].children.is_empty());
    }

    #[test]
    fn parent_fields_are_not_taken_from_replies() {
        let html = comment_area(&[CommentFixture::new("t1_a", "alice")
            .reply(
                CommentFixture::new("t1_b", "bob")
                    .score("99 points")
                    .time("2024-01-01T00:00:00+00:00")
                    .text("reply"),
            )]);
        let nodes = extract(&html, TreeExtractor::default()).unwrap();

        assert_eq!(nodes[0].score, 0);
        assert_eq!(nodes[0].posted_at, "");
        assert_eq!(nodes[0].text, "");
        assert_eq!(nodes[0].children[0].score, 99);
    }

    #[test]
    fn deleted_comment_has_empty_author() {
        let html = comment_area(&[CommentFixture::new("t1_a", "[deleted]")
            .classes("deleted")
            .text("[removed]")]);
        let nodes = extract(&html, TreeExtractor::default()).unwrap();

        assert!(nodes[0].is_deleted);
        assert_eq!(nodes[0].author, "");
    }

    #[test]
    fn collapsed_flag_and_missing_score() {
        let html = comment_area(&[CommentFixture::new("t1_a", "alice").classes("collapsed")]);
        let nodes = extract(&html, TreeExtractor::default()).unwrap();

        assert!(nodes[0].is_collapsed);
        assert_eq!(nodes[0].score, 0);
    }

    #[test]
    fn child_section_without_sitetable_yields_no_children() {
        let html = r#"<html><body><div class="commentarea"><div class="sitetable">
            <div class="thing comment" data-fullname="t1_a" data-author="alice">
              <div class="entry"></div>
              <div class="child"></div>
            </div>
        </div></div></body></html>"#;
        let nodes = extract(html, TreeExtractor::default()).unwrap();
        assert!(nodes[0].children.is_empty());
    }

    #[test]
    fn non_comment_things_are_skipped() {
        let html = r#"<html><body><div class="commentarea"><div class="sitetable">
            <div class="thing comment" data-fullname="t1_a" data-author="alice"></div>
            <div class="thing morechildren"><a>load more comments</a></div>
            <div class="clearleft"></div>
        </div></div></body></html>"#;
        let nodes = extract(html, TreeExtractor::default()).unwrap();
        assert_eq!(nodes.len(), 1);
    }

    #[test]
    fn depth_limit_is_an_extraction_error() {
        let html = comment_area(&[CommentFixture::new("t1_a", "alice").reply(
            CommentFixture::new("t1_b", "bob").reply(CommentFixture::new("t1_c", "carol")),
        )]);

        assert!(extract(&html, TreeExtractor::new(3)).is_ok());
        let err = extract(&html, TreeExtractor::new(2)).unwrap_err();
        assert!(matches!(err, AppError::ExtractionError(_)));
    }

    #[test]
    fn extraction_is_idempotent() {
        let html = comment_area(&[
            CommentFixture::new("t1_a", "alice")
                .score("3 points")
                .reply(CommentFixture::new("t1_b", "bob").classes("deleted")),
            CommentFixture::new("t1_c", "carol").classes("collapsed"),
        ]);
        let first = extract(&html, TreeExtractor::default()).unwrap();
        let second = extract(&html, TreeExtractor::default()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn deleted_implies_empty_author_across_tree() {
        fn check(nodes: &[DiscussionNode]) {
            for node in nodes {
                if node.is_deleted {
                    assert_eq!(node.author, "");
                }
                check(&node.children);
            }
        }

        let html = comment_area(&[CommentFixture::new("t1_a", "alice")
            .reply(CommentFixture::new("t1_b", "bob").classes("deleted"))
            .reply(
                CommentFixture::new("t1_c", "carol")
                    .reply(CommentFixture::new("t1_d", "dave").classes("deleted collapsed")),
            )]);
        let nodes = extract(&html, TreeExtractor::default()).unwrap();
        assert_eq!(nodes[0].subtree_len(), 4);
        check(&nodes);
    }
}
