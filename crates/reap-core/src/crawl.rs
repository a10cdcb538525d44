use std::collections::HashSet;
use std::fmt;

use crate::config::ReapConfig;
use crate::error::AppError;
use crate::extract::parse_listing;
use crate::models::ItemStub;
use crate::report::{CrawlEvent, CrawlReporter};
use crate::traits::Page;

/// Why the crawl loop reached its terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A listing page had no items.
    EmptyPage,
    /// The oldest item on the last page was older than the cutoff.
    CutoffReached,
    /// The last page had no next-page control.
    NoNextPage,
    /// `max_pages` pages were visited.
    PageLimit,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::EmptyPage => "empty_page",
            StopReason::CutoffReached => "cutoff_reached",
            StopReason::NoNextPage => "no_next_page",
            StopReason::PageLimit => "page_limit",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of one crawl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlOutcome {
    /// Stubs newer than the cutoff, unique by id, in crawl order.
    pub stubs: Vec<ItemStub>,
    pub pages_visited: usize,
    pub stop_reason: StopReason,
    pub duplicates_dropped: usize,
}

enum CrawlState {
    FetchingPage { url: String },
    EvaluatingCutoff { oldest: i64, next_url: Option<String> },
    Advancing { next_url: Option<String> },
    Done(StopReason),
}

/// Walks a chronological listing page by page until it passes the cutoff.
///
/// Pages are assumed to list items newest first, so the last item on a page
/// is the oldest one on it. That ordering is not verified.
#[derive(Debug, Clone)]
pub struct CrawlLoop {
    listing_url: String,
    max_pages: usize,
}

impl CrawlLoop {
    pub fn new(listing_url: impl Into<String>, max_pages: usize) -> Self {
        Self {
            listing_url: listing_url.into(),
            max_pages: max_pages.max(1),
        }
    }

    pub fn from_config(config: &ReapConfig) -> Self {
        Self::new(config.listing_url.clone(), config.max_pages)
    }

    /// Crawl from the listing URL and return stubs posted strictly after `cutoff_millis`.
    pub async fn run<P: Page, R: CrawlReporter>(
        &self,
        page: &P,
        cutoff_millis: i64,
        reporter: &R,
    ) -> Result<CrawlOutcome, AppError> {
        let mut collected: Vec<ItemStub> = Vec::new();
        let mut pages_visited = 0;
        let mut state = CrawlState::FetchingPage {
            url: self.listing_url.clone(),
        };

        let stop_reason = loop {
            state = match state {
                CrawlState::FetchingPage { .. } if pages_visited >= self.max_pages => {
                    CrawlState::Done(StopReason::PageLimit)
                }
                CrawlState::FetchingPage { url } => {
                    let html = page.load(&url).await?;
                    let listing = parse_listing(&html, &url)?;
                    pages_visited += 1;
                    reporter.report(CrawlEvent::PageScanned {
                        page: pages_visited,
                        url: &url,
                        stubs: listing.stubs.len(),
                    });

                    match listing.stubs.last().map(|s| s.posted_at_millis) {
                        None => CrawlState::Done(StopReason::EmptyPage),
                        Some(oldest) => {
                            collected.extend(listing.stubs);
                            CrawlState::EvaluatingCutoff {
                                oldest,
                                next_url: listing.next_url,
                            }
                        }
                    }
                }
                CrawlState::EvaluatingCutoff { oldest, next_url } => {
                    if oldest < cutoff_millis {
                        CrawlState::Done(StopReason::CutoffReached)
                    } else {
                        CrawlState::Advancing { next_url }
                    }
                }
                CrawlState::Advancing { next_url } => match next_url {
                    Some(url) => CrawlState::FetchingPage { url },
                    None => CrawlState::Done(StopReason::NoNextPage),
                },
                CrawlState::Done(reason) => break reason,
            };
        };

        let (stubs, duplicates_dropped) = filter_and_dedupe(collected, cutoff_millis);
        if duplicates_dropped > 0 {
            tracing::warn!(%duplicates_dropped, "Dropped duplicate items across listing pages");
        }
        reporter.report(CrawlEvent::CrawlStopped {
            reason: stop_reason,
            pages: pages_visited,
            kept: stubs.len(),
        });

        Ok(CrawlOutcome {
            stubs,
            pages_visited,
            stop_reason,
            duplicates_dropped,
        })
    }
}

/// Keep stubs newer than the cutoff; of stubs sharing an id, keep the first.
fn filter_and_dedupe(stubs: Vec<ItemStub>, cutoff_millis: i64) -> (Vec<ItemStub>, usize) {
    let mut seen = HashSet::new();
    let mut duplicates = 0;
    let kept = stubs
        .into_iter()
        .filter(|s| s.posted_at_millis > cutoff_millis)
        .filter(|s| {
            let fresh = seen.insert(s.id.clone());
            if !fresh {
                duplicates += 1;
            }
            fresh
        })
        .collect();
    (kept, duplicates)
}
