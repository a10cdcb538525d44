pub mod config;
pub mod crawl;
pub mod detail;
pub mod error;
pub mod extract;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod scheduler;
pub mod traits;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use config::{ReapConfig, SessionMode};
pub use crawl::{CrawlLoop, CrawlOutcome, StopReason};
pub use detail::DetailFetcher;
pub use error::AppError;
pub use extract::TreeExtractor;
pub use models::{CapturedItem, DiscussionNode, ItemDetail, ItemStub};
pub use pipeline::{InvocationOutcome, Pipeline, RunSummary, Runner, invoke};
pub use report::{CrawlEvent, CrawlReporter, RunProgress, TracingReporter};
pub use scheduler::{FetchMode, FetchScheduler, ScheduleSummary};
pub use traits::{NullSink, Page, Session, SessionFactory, Sink};
