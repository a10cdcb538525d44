use crate::error::AppError;
use crate::extract::{TreeExtractor, parse_post};
use crate::models::{ItemDetail, ItemStub};
use crate::report::{CrawlEvent, CrawlReporter};
use crate::traits::Page;

/// Visits one item's detail page and composes its [`ItemDetail`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DetailFetcher {
    extractor: TreeExtractor,
}

impl DetailFetcher {
    pub fn new(extractor: TreeExtractor) -> Self {
        Self { extractor }
    }

    /// Fetch and extract one item.
    ///
    /// Navigation errors propagate. A failure while reading the discussion
    /// tree is reported and the item continues with an empty discussion.
    pub async fn fetch<P: Page, R: CrawlReporter>(
        &self,
        stub: &ItemStub,
        page: &P,
        reporter: &R,
    ) -> Result<ItemDetail, AppError> {
        tracing::debug!(item_id = %stub.id, url = %stub.url, "Fetching item");
        let html = page.load(&stub.url).await?;

        let post = parse_post(&html, &self.extractor);
        let discussion = match post.discussion {
            Ok(nodes) => nodes,
            Err(error) => {
                reporter.report(CrawlEvent::DiscussionDegraded {
                    item_id: &stub.id,
                    error: &error,
                });
                Vec::new()
            }
        };

        Ok(ItemDetail {
            stub: stub.clone(),
            media_type: post.attrs.media_type,
            media_url: post.attrs.media_url,
            is_promoted: post.attrs.is_promoted,
            is_gallery: post.attrs.is_gallery,
            title: post.title,
            score: post.score,
            body_text: post.body_text,
            discussion,
        })
    }
}
