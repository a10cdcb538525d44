use std::future::Future;

use crate::error::AppError;
use crate::models::CapturedItem;

/// Opens browser sessions, either by connecting to a remote endpoint or by
/// launching a local browser.
pub trait SessionFactory: Send + Sync + Clone {
    type Session: Session;

    fn open(&self) -> impl Future<Output = Result<Self::Session, AppError>> + Send;
}

/// One browser session. Owned by exactly one run or group and closed once.
pub trait Session: Send + Sync {
    type Page: Page;

    fn new_page(&self) -> impl Future<Output = Result<Self::Page, AppError>> + Send;

    fn close(self) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// A tab scoped to a session.
pub trait Page: Send + Sync {
    /// Navigates to `url` and returns a snapshot of the rendered markup.
    ///
    /// Implementations must not interleave two loads on the same page: when
    /// called concurrently, each caller gets the markup of its own URL.
    fn load(&self, url: &str) -> impl Future<Output = Result<String, AppError>> + Send;

    fn close(self) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Destination for captured records.
pub trait Sink: Send + Sync + Clone {
    fn publish_one(&self, record: &CapturedItem)
    -> impl Future<Output = Result<(), AppError>> + Send;

    fn publish_many(
        &self,
        records: &[CapturedItem],
    ) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// A sink that drops everything, for dry runs.
#[derive(Debug, Clone)]
pub struct NullSink;

impl Sink for NullSink {
    async fn publish_one(&self, _record: &CapturedItem) -> Result<(), AppError> {
        Ok(())
    }

    async fn publish_many(&self, _records: &[CapturedItem]) -> Result<(), AppError> {
        Ok(())
    }
}
