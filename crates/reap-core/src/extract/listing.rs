use std::sync::LazyLock;

use scraper::{Html, Selector};
use url::Url;

use super::attrs::ListingAttributes;
use crate::error::AppError;
use crate::models::ItemStub;

static ROWS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#siteTable > .thing").expect("static selector must parse"));
static NEXT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".next-button a[href]").expect("static selector must parse"));

/// What one listing page yields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    /// Stubs in page order (newest first on a chronological listing).
    pub stubs: Vec<ItemStub>,
    /// Absolute URL of the next page, if the page has a next-page control.
    pub next_url: Option<String>,
    /// Rows that were missing a required attribute.
    pub skipped: usize,
}

/// Extract item stubs and the next-page link from a listing page snapshot.
///
/// Relative permalinks and next-page hrefs are resolved against `page_url`.
pub fn parse_listing(html: &str, page_url: &str) -> Result<ListingPage, AppError> {
    let base = Url::parse(page_url)
        .map_err(|e| AppError::ExtractionError(format!("Invalid page URL {page_url}: {e}")))?;
    let doc = Html::parse_document(html);

    let mut page = ListingPage::default();
    for row in doc.select(&ROWS) {
        let attrs = match ListingAttributes::from_element(row) {
            Ok(attrs) => attrs,
            Err(missing) => {
                tracing::warn!(
                    id = row.value().attr("data-fullname").unwrap_or("?"),
                    %missing,
                    "Skipping listing row"
                );
                page.skipped += 1;
                continue;
            }
        };
        let url = match base.join(&attrs.permalink) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(id = %attrs.id, error = %e, "Skipping listing row with bad permalink");
                page.skipped += 1;
                continue;
            }
        };
        page.stubs.push(ItemStub {
            id: attrs.id,
            community: attrs.community,
            posted_at_millis: attrs.timestamp_millis,
            author: attrs.author,
            url: url.to_string(),
        });
    }

    page.next_url = doc
        .select(&NEXT)
        .next()
        .and_then(|a| a.value().attr("href"))
        .filter(|href| !href.trim().is_empty())
        .and_then(|href| base.join(href).ok())
        .map(String::from);

    Ok(page)
}
