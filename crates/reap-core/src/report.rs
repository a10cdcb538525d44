use std::sync::atomic::{AtomicUsize, Ordering};

use crate::crawl::StopReason;
use crate::error::AppError;

/// Events emitted during a run for monitoring/logging.
#[derive(Debug, Clone)]
pub enum CrawlEvent<'a> {
    PageScanned {
        page: usize,
        url: &'a str,
        stubs: usize,
    },
    CrawlStopped {
        reason: StopReason,
        pages: usize,
        kept: usize,
    },
    GroupStarted {
        group: usize,
        size: usize,
    },
    ItemFetched {
        item_id: &'a str,
        comments: usize,
        remaining: usize,
    },
    ItemFailed {
        item_id: &'a str,
        error: &'a AppError,
    },
    DiscussionDegraded {
        item_id: &'a str,
        error: &'a AppError,
    },
    GroupFinished {
        group: usize,
    },
    GroupFailed {
        group: usize,
        error: &'a AppError,
    },
    Published {
        records: usize,
    },
}

/// Trait for receiving run events (decoupled logging).
pub trait CrawlReporter: Send + Sync {
    fn report(&self, event: CrawlEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl CrawlReporter for TracingReporter {
    fn report(&self, event: CrawlEvent<'_>) {
        match event {
            CrawlEvent::PageScanned { page, url, stubs } => {
                tracing::info!(%page, %url, %stubs, "Listing page scanned");
            }
            CrawlEvent::CrawlStopped {
                reason,
                pages,
                kept,
            } => {
                tracing::info!(%reason, %pages, %kept, "Crawl finished");
            }
            CrawlEvent::GroupStarted { group, size } => {
                tracing::info!(%group, %size, "Group started");
            }
            CrawlEvent::ItemFetched {
                item_id,
                comments,
                remaining,
            } => {
                tracing::info!(%item_id, %comments, %remaining, "Item fetched");
            }
            CrawlEvent::ItemFailed { item_id, error } => {
                tracing::error!(%item_id, %error, "Item failed");
            }
            CrawlEvent::DiscussionDegraded { item_id, error } => {
                tracing::error!(%item_id, %error, "Discussion extraction failed, continuing without comments");
            }
            CrawlEvent::GroupFinished { group } => {
                tracing::info!(%group, "Group finished");
            }
            CrawlEvent::GroupFailed { group, error } => {
                tracing::error!(%group, %error, "Group failed");
            }
            CrawlEvent::Published { records } => {
                tracing::info!(%records, "Published");
            }
        }
    }
}

/// Per-run progress counters. Diagnostic only; nothing reads them for control flow.
#[derive(Debug, Default)]
pub struct RunProgress {
    total: AtomicUsize,
    remaining: AtomicUsize,
    fetched: AtomicUsize,
    published: AtomicUsize,
    failed: AtomicUsize,
}

impl RunProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total: AtomicUsize::new(total),
            remaining: AtomicUsize::new(total),
            fetched: AtomicUsize::new(0),
            published: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        }
    }

    /// Marks one item as fetched and returns how many are left.
    pub fn item_done(&self) -> usize {
        self.fetched.fetch_add(1, Ordering::Relaxed);
        self.count_down()
    }

    /// Marks one item as failed and returns how many are left.
    pub fn item_failed(&self) -> usize {
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.count_down()
    }

    /// Marks an item that was fetched but never published as failed.
    pub fn publish_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    fn count_down(&self) -> usize {
        let previous = self
            .remaining
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |r| {
                Some(r.saturating_sub(1))
            })
            .unwrap_or(0);
        previous.saturating_sub(1)
    }

    pub fn published(&self, records: usize) {
        self.published.fetch_add(records, Ordering::Relaxed);
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::Relaxed)
    }

    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Relaxed)
    }

    pub fn fetched_count(&self) -> usize {
        self.fetched.load(Ordering::Relaxed)
    }

    pub fn published_count(&self) -> usize {
        self.published.load(Ordering::Relaxed)
    }

    pub fn failed_count(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }
}
