use std::future::Future;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::config::ReapConfig;
use crate::crawl::{CrawlLoop, StopReason};
use crate::error::AppError;
use crate::report::{CrawlReporter, TracingReporter};
use crate::scheduler::{FetchMode, FetchScheduler, ScheduleSummary, release_page, release_session};
use crate::traits::{Session, SessionFactory, Sink};

/// What one run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub cutoff_millis: i64,
    pub pages_visited: usize,
    pub stop_reason: StopReason,
    /// Stubs that survived the cutoff filter and de-duplication.
    pub stubs: usize,
    pub schedule: ScheduleSummary,
}

/// Anything that can perform one full run. Entry points depend on this
/// rather than on [`Pipeline`] directly.
pub trait Runner: Send + Sync {
    fn run(&self) -> impl Future<Output = Result<RunSummary, AppError>> + Send;
}

/// Crawl, then fetch and publish details.
pub struct Pipeline<SF, K, R = TracingReporter>
where
    SF: SessionFactory,
    K: Sink,
    R: CrawlReporter,
{
    config: ReapConfig,
    factory: SF,
    sink: K,
    reporter: R,
}

impl<SF, K> Pipeline<SF, K>
where
    SF: SessionFactory,
    K: Sink,
{
    pub fn new(config: ReapConfig, factory: SF, sink: K) -> Self {
        Self {
            config,
            factory,
            sink,
            reporter: TracingReporter,
        }
    }
}

impl<SF, K, R> Pipeline<SF, K, R>
where
    SF: SessionFactory,
    K: Sink,
    R: CrawlReporter,
{
    pub fn with_reporter<R2: CrawlReporter>(self, reporter: R2) -> Pipeline<SF, K, R2> {
        Pipeline {
            config: self.config,
            factory: self.factory,
            sink: self.sink,
            reporter,
        }
    }

    pub fn config(&self) -> &ReapConfig {
        &self.config
    }

    /// Run with `now` as the reference time for the cutoff.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<RunSummary, AppError> {
        let run_id = Uuid::new_v4();
        let cutoff_millis = now
            .checked_sub_signed(self.config.window)
            .ok_or_else(|| {
                AppError::ConfigError(format!(
                    "Window of {}h reaches past the earliest representable time",
                    self.config.window.num_hours()
                ))
            })?
            .timestamp_millis();
        let mode = FetchMode::for_session(&self.config.mode);
        tracing::info!(%run_id, %mode, %cutoff_millis, listing = %self.config.listing_url, "Run started");

        let session = self.factory.open().await?;
        let crawled = match session.new_page().await {
            Ok(page) => {
                let outcome = CrawlLoop::from_config(&self.config)
                    .run(&page, cutoff_millis, &self.reporter)
                    .await;
                release_page(page).await;
                outcome
            }
            Err(e) => Err(e),
        };
        release_session(session).await;
        let crawl = crawled?;

        let schedule = FetchScheduler::from_config(self.factory.clone(), self.sink.clone(), &self.config)
            .run(&crawl.stubs, mode, &self.reporter)
            .await?;

        let summary = RunSummary {
            run_id,
            cutoff_millis,
            pages_visited: crawl.pages_visited,
            stop_reason: crawl.stop_reason,
            stubs: crawl.stubs.len(),
            schedule,
        };
        tracing::info!(
            %run_id,
            pages = summary.pages_visited,
            stubs = summary.stubs,
            published = summary.schedule.published,
            failed_groups = summary.schedule.failed_groups,
            "Run finished"
        );
        Ok(summary)
    }
}

impl<SF, K, R> Runner for Pipeline<SF, K, R>
where
    SF: SessionFactory,
    K: Sink,
    R: CrawlReporter,
{
    async fn run(&self) -> Result<RunSummary, AppError> {
        self.run_at(Utc::now()).await
    }
}

/// Result of a request/response invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InvocationOutcome {
    pub success: bool,
}

/// Run once and report success as a value. Errors are logged, never returned.
pub async fn invoke<R: Runner>(runner: &R) -> InvocationOutcome {
    match runner.run().await {
        Ok(_) => InvocationOutcome { success: true },
        Err(e) => {
            tracing::error!(error = %e, "Run failed");
            InvocationOutcome { success: false }
        }
    }
}
