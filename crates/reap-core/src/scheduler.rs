use std::fmt;

use chrono::Utc;
use futures::future::{join_all, try_join_all};
use tokio::sync::Semaphore;

use crate::config::{ReapConfig, SessionMode};
use crate::detail::DetailFetcher;
use crate::error::AppError;
use crate::extract::TreeExtractor;
use crate::models::{CapturedItem, ItemStub};
use crate::report::{CrawlEvent, CrawlReporter, RunProgress};
use crate::traits::{Page, Session, SessionFactory, Sink};

/// How detail fetches are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// One session, items in order, one `publish_many` at the end.
    Sequential,
    /// One session per group, items of a group concurrently, `publish_one` per item.
    Batched,
}

impl FetchMode {
    pub fn for_session(mode: &SessionMode) -> Self {
        match mode {
            SessionMode::Local => FetchMode::Sequential,
            SessionMode::Remote { .. } => FetchMode::Batched,
        }
    }
}

impl fmt::Display for FetchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchMode::Sequential => write!(f, "sequential"),
            FetchMode::Batched => write!(f, "batched"),
        }
    }
}

/// Counts for one scheduling pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleSummary {
    pub mode: FetchMode,
    pub groups: usize,
    pub failed_groups: usize,
    pub fetched: usize,
    pub published: usize,
    pub failed: usize,
}

impl ScheduleSummary {
    fn from_progress(mode: FetchMode, groups: usize, failed_groups: usize, progress: &RunProgress) -> Self {
        Self {
            mode,
            groups,
            failed_groups,
            fetched: progress.fetched_count(),
            published: progress.published_count(),
            failed: progress.failed_count(),
        }
    }
}

/// Drives detail fetching over a list of stubs and forwards results to a sink.
///
/// In batched mode every group is launched at once: the group size bounds how
/// many items share one page, not how many sessions are open. Set
/// `max_sessions` to cap the number of sessions held at the same time.
pub struct FetchScheduler<SF, K>
where
    SF: SessionFactory,
    K: Sink,
{
    factory: SF,
    sink: K,
    fetcher: DetailFetcher,
    group_size: usize,
    max_sessions: Option<usize>,
}

impl<SF, K> FetchScheduler<SF, K>
where
    SF: SessionFactory,
    K: Sink,
{
    pub fn new(factory: SF, sink: K) -> Self {
        Self {
            factory,
            sink,
            fetcher: DetailFetcher::default(),
            group_size: crate::config::DEFAULT_GROUP_SIZE,
            max_sessions: None,
        }
    }

    pub fn from_config(factory: SF, sink: K, config: &ReapConfig) -> Self {
        Self::new(factory, sink)
            .with_fetcher(DetailFetcher::new(TreeExtractor::new(
                config.max_comment_depth,
            )))
            .with_group_size(config.group_size)
            .with_max_sessions(config.max_sessions)
    }

    pub fn with_fetcher(mut self, fetcher: DetailFetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_group_size(mut self, size: usize) -> Self {
        self.group_size = size.max(1);
        self
    }

    pub fn with_max_sessions(mut self, max: Option<usize>) -> Self {
        self.max_sessions = max.filter(|m| *m > 0);
        self
    }

    pub async fn run<R: CrawlReporter>(
        &self,
        stubs: &[ItemStub],
        mode: FetchMode,
        reporter: &R,
    ) -> Result<ScheduleSummary, AppError> {
        tracing::info!(%mode, items = stubs.len(), "Fetching item details");
        match mode {
            FetchMode::Sequential => self.run_sequential(stubs, reporter).await,
            FetchMode::Batched => Ok(self.run_batched(stubs, reporter).await),
        }
    }

    /// One session for everything; any item failure aborts before publishing.
    async fn run_sequential<R: CrawlReporter>(
        &self,
        stubs: &[ItemStub],
        reporter: &R,
    ) -> Result<ScheduleSummary, AppError> {
        let progress = RunProgress::new(stubs.len());

        let session = self.factory.open().await?;
        let gathered = self.gather(&session, stubs, &progress, reporter).await;
        release_session(session).await;
        let records = gathered?;

        if !records.is_empty() {
            self.sink.publish_many(&records).await?;
            progress.published(records.len());
            reporter.report(CrawlEvent::Published {
                records: records.len(),
            });
        }

        Ok(ScheduleSummary::from_progress(
            FetchMode::Sequential,
            1,
            0,
            &progress,
        ))
    }

    async fn gather<R: CrawlReporter>(
        &self,
        session: &SF::Session,
        stubs: &[ItemStub],
        progress: &RunProgress,
        reporter: &R,
    ) -> Result<Vec<CapturedItem>, AppError> {
        let page = session.new_page().await?;

        let mut records = Vec::with_capacity(stubs.len());
        let mut outcome = Ok(());
        for stub in stubs {
            match self.capture(stub, &page, progress, reporter).await {
                Ok(record) => records.push(record),
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            }
        }

        release_page(page).await;
        outcome.map(|()| records)
    }

    /// All groups concurrently; a failed group does not affect the others.
    async fn run_batched<R: CrawlReporter>(
        &self,
        stubs: &[ItemStub],
        reporter: &R,
    ) -> ScheduleSummary {
        let progress = RunProgress::new(stubs.len());
        let limiter = self.max_sessions.map(Semaphore::new);

        let results = join_all(
            stubs
                .chunks(self.group_size)
                .enumerate()
                .map(|(i, group)| self.run_group(i + 1, group, limiter.as_ref(), &progress, reporter)),
        )
        .await;

        let failed_groups = results.iter().filter(|r| r.is_err()).count();
        ScheduleSummary::from_progress(FetchMode::Batched, results.len(), failed_groups, &progress)
    }

    async fn run_group<R: CrawlReporter>(
        &self,
        index: usize,
        group: &[ItemStub],
        limiter: Option<&Semaphore>,
        progress: &RunProgress,
        reporter: &R,
    ) -> Result<(), AppError> {
        let _permit = match limiter {
            Some(semaphore) => Some(
                semaphore
                    .acquire()
                    .await
                    .map_err(|e| AppError::BrowserError(format!("Session limiter closed: {e}")))?,
            ),
            None => None,
        };

        reporter.report(CrawlEvent::GroupStarted {
            group: index,
            size: group.len(),
        });

        let result = match self.factory.open().await {
            Ok(session) => {
                let result = self.fetch_group(&session, group, progress, reporter).await;
                release_session(session).await;
                result
            }
            Err(e) => Err(e),
        };

        match &result {
            Ok(()) => reporter.report(CrawlEvent::GroupFinished { group: index }),
            Err(error) => reporter.report(CrawlEvent::GroupFailed {
                group: index,
                error,
            }),
        }
        result
    }

    async fn fetch_group<R: CrawlReporter>(
        &self,
        session: &SF::Session,
        group: &[ItemStub],
        progress: &RunProgress,
        reporter: &R,
    ) -> Result<(), AppError> {
        let page = session.new_page().await?;

        // The first failure drops the group's in-flight items; published ones stay published.
        let result = try_join_all(
            group
                .iter()
                .map(|stub| self.capture_and_publish(stub, &page, progress, reporter)),
        )
        .await
        .map(|_| ());

        release_page(page).await;
        result
    }

    async fn capture_and_publish<R: CrawlReporter>(
        &self,
        stub: &ItemStub,
        page: &<SF::Session as Session>::Page,
        progress: &RunProgress,
        reporter: &R,
    ) -> Result<(), AppError> {
        let record = self.capture(stub, page, progress, reporter).await?;
        if let Err(error) = self.sink.publish_one(&record).await {
            progress.publish_failed();
            reporter.report(CrawlEvent::ItemFailed {
                item_id: &stub.id,
                error: &error,
            });
            return Err(error);
        }
        progress.published(1);
        reporter.report(CrawlEvent::Published { records: 1 });
        Ok(())
    }

    async fn capture<P: Page, R: CrawlReporter>(
        &self,
        stub: &ItemStub,
        page: &P,
        progress: &RunProgress,
        reporter: &R,
    ) -> Result<CapturedItem, AppError> {
        match self.fetcher.fetch(stub, page, reporter).await {
            Ok(detail) => {
                let remaining = progress.item_done();
                reporter.report(CrawlEvent::ItemFetched {
                    item_id: &stub.id,
                    comments: detail.discussion.iter().map(|n| n.subtree_len()).sum(),
                    remaining,
                });
                Ok(CapturedItem::new(detail, Utc::now()))
            }
            Err(error) => {
                progress.item_failed();
                reporter.report(CrawlEvent::ItemFailed {
                    item_id: &stub.id,
                    error: &error,
                });
                Err(error)
            }
        }
    }
}

pub(crate) async fn release_page<P: Page>(page: P) {
    if let Err(e) = page.close().await {
        tracing::warn!(error = %e, "Failed to close page");
    }
}

pub(crate) async fn release_session<S: Session>(session: S) {
    if let Err(e) = session.close().await {
        tracing::warn!(error = %e, "Failed to close browser session");
    }
}
