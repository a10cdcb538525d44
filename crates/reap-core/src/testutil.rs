//! Test utilities: mock implementations of the core traits and markup fixtures.
//!
//! Handwritten mocks for dependency injection in unit tests. All mocks use
//! `Arc<Mutex<_>>` or atomics for interior mutability, so clones share state
//! and tests can assert on recorded calls after handing a clone to the code
//! under test.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Barrier, Notify};
use uuid::Uuid;

use crate::crawl::StopReason;
use crate::error::AppError;
use crate::models::{CapturedItem, ItemStub};
use crate::pipeline::{RunSummary, Runner};
use crate::report::{CrawlEvent, CrawlReporter};
use crate::scheduler::{FetchMode, ScheduleSummary};
use crate::traits::{Page, Session, SessionFactory, Sink};

// ---------------------------------------------------------------------------
// MockPage
// ---------------------------------------------------------------------------

/// Page that serves fixed markup per URL. Unknown URLs are navigation errors.
#[derive(Clone, Default)]
pub struct MockPage {
    pages: Arc<Mutex<HashMap<String, String>>>,
    loads: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicUsize>,
    delay: Option<Duration>,
}

impl MockPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: &str, html: &str) -> Self {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), html.to_string());
        self
    }

    /// Every load sleeps this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every URL passed to `load`, including failed ones, in call order.
    pub fn loads(&self) -> Vec<String> {
        self.loads.lock().unwrap().clone()
    }

    pub fn closed_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Page for MockPage {
    async fn load(&self, url: &str) -> Result<String, AppError> {
        self.loads.lock().unwrap().push(url.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let html = self.pages.lock().unwrap().get(url).cloned();
        html.ok_or_else(|| AppError::NavigationError(format!("no page at {url}")))
    }

    async fn close(self) -> Result<(), AppError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockSessionFactory / MockSession
// ---------------------------------------------------------------------------

/// Session factory whose sessions all hand out the same shared [`MockPage`].
#[derive(Clone)]
pub struct MockSessionFactory {
    page: MockPage,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    open_errors: Arc<Mutex<VecDeque<AppError>>>,
    gate: Option<Arc<Barrier>>,
}

impl MockSessionFactory {
    pub fn new(page: MockPage) -> Self {
        Self {
            page,
            opened: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
            open_errors: Arc::new(Mutex::new(VecDeque::new())),
            gate: None,
        }
    }

    /// `open` does not return until `parties` sessions are open at once.
    pub fn with_open_gate(mut self, parties: usize) -> Self {
        self.gate = Some(Arc::new(Barrier::new(parties)));
        self
    }

    /// The next `open` calls fail with these errors, in order.
    pub fn with_open_errors(self, errors: Vec<AppError>) -> Self {
        self.open_errors.lock().unwrap().extend(errors);
        self
    }

    pub fn page(&self) -> &MockPage {
        &self.page
    }

    pub fn sessions_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn sessions_closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Most sessions that were open at the same time.
    pub fn peak_sessions(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl SessionFactory for MockSessionFactory {
    type Session = MockSession;

    async fn open(&self) -> Result<MockSession, AppError> {
        let error = self.open_errors.lock().unwrap().pop_front();
        if let Some(error) = error {
            return Err(error);
        }

        self.opened.fetch_add(1, Ordering::SeqCst);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.wait().await;
        }

        Ok(MockSession {
            page: self.page.clone(),
            closed: Arc::clone(&self.closed),
            active: Arc::clone(&self.active),
        })
    }
}

pub struct MockSession {
    page: MockPage,
    closed: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
}

impl Session for MockSession {
    type Page = MockPage;

    async fn new_page(&self) -> Result<MockPage, AppError> {
        Ok(self.page.clone())
    }

    async fn close(self) -> Result<(), AppError> {
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockSink
// ---------------------------------------------------------------------------

/// Sink that records every publish call.
#[derive(Clone, Default)]
pub struct MockSink {
    /// Records passed to `publish_one`, in call order.
    pub one: Arc<Mutex<Vec<CapturedItem>>>,
    /// Batches passed to `publish_many`, in call order.
    pub many: Arc<Mutex<Vec<Vec<CapturedItem>>>>,
    error: Arc<Mutex<Option<AppError>>>,
}

impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next publish call fails with `error`; later calls succeed.
    pub fn with_error(error: AppError) -> Self {
        Self {
            error: Arc::new(Mutex::new(Some(error))),
            ..Self::default()
        }
    }

    fn take_error(&self) -> Result<(), AppError> {
        match self.error.lock().unwrap().take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Sink for MockSink {
    async fn publish_one(&self, record: &CapturedItem) -> Result<(), AppError> {
        self.take_error()?;
        self.one.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn publish_many(&self, records: &[CapturedItem]) -> Result<(), AppError> {
        self.take_error()?;
        self.many.lock().unwrap().push(records.to_vec());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Reporter that records the variant name of every event.
#[derive(Clone, Default)]
pub struct MockReporter {
    events: Arc<Mutex<Vec<String>>>,
    /// Sizes of started groups, in start order.
    pub group_sizes: Arc<Mutex<Vec<usize>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn labels(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl CrawlReporter for MockReporter {
    fn report(&self, event: CrawlEvent<'_>) {
        let label = match event {
            CrawlEvent::PageScanned { .. } => "PageScanned",
            CrawlEvent::CrawlStopped { .. } => "CrawlStopped",
            CrawlEvent::GroupStarted { size, .. } => {
                self.group_sizes.lock().unwrap().push(size);
                "GroupStarted"
            }
            CrawlEvent::ItemFetched { .. } => "ItemFetched",
            CrawlEvent::ItemFailed { .. } => "ItemFailed",
            CrawlEvent::DiscussionDegraded { .. } => "DiscussionDegraded",
            CrawlEvent::GroupFinished { .. } => "GroupFinished",
            CrawlEvent::GroupFailed { .. } => "GroupFailed",
            CrawlEvent::Published { .. } => "Published",
        };
        self.events.lock().unwrap().push(label.to_string());
    }
}

// ---------------------------------------------------------------------------
// MockRunner
// ---------------------------------------------------------------------------

/// Runner with a scripted result, optionally held open until released.
#[derive(Clone, Default)]
pub struct MockRunner {
    error: Arc<Mutex<Option<AppError>>>,
    calls: Arc<AtomicUsize>,
    started: Arc<Notify>,
    gate: Option<Arc<Notify>>,
}

impl MockRunner {
    pub fn succeeding() -> Self {
        Self::default()
    }

    /// The next run fails with `error`; later runs succeed.
    pub fn failing(error: AppError) -> Self {
        Self {
            error: Arc::new(Mutex::new(Some(error))),
            ..Self::default()
        }
    }

    /// Runs block until [`MockRunner::release`] is called.
    pub fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Notify::new())),
            ..Self::default()
        }
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    /// Resolves once a run has started.
    pub async fn wait_started(&self) {
        self.started.notified().await;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Runner for MockRunner {
    async fn run(&self) -> Result<RunSummary, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let error = self.error.lock().unwrap().take();
        if let Some(error) = error {
            return Err(error);
        }

        Ok(RunSummary {
            run_id: Uuid::new_v4(),
            cutoff_millis: 0,
            pages_visited: 1,
            stop_reason: StopReason::NoNextPage,
            stubs: 0,
            schedule: ScheduleSummary {
                mode: FetchMode::Sequential,
                groups: 1,
                failed_groups: 0,
                fetched: 0,
                published: 0,
                failed: 0,
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Markup fixtures
// ---------------------------------------------------------------------------

/// A stub whose detail page lives at `https://old.reddit.com/r/all/comments/{id}/post/`.
pub fn make_stub(id: &str, posted_at_millis: i64) -> ItemStub {
    ItemStub {
        id: id.to_string(),
        community: "all".to_string(),
        posted_at_millis,
        author: "someone".to_string(),
        url: format!("https://old.reddit.com/r/all/comments/{id}/post/"),
    }
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// One row of a listing page.
#[derive(Debug, Clone)]
pub struct ListingRow {
    id: String,
    timestamp_millis: i64,
    community: String,
    author: String,
}

impl ListingRow {
    pub fn new(id: &str, timestamp_millis: i64) -> Self {
        Self {
            id: id.to_string(),
            timestamp_millis,
            community: "all".to_string(),
            author: "someone".to_string(),
        }
    }

    pub fn community(mut self, community: &str) -> Self {
        self.community = community.to_string();
        self
    }

    pub fn author(mut self, author: &str) -> Self {
        self.author = author.to_string();
        self
    }

    fn render(&self) -> String {
        let permalink = format!("/r/{}/comments/{}/post/", self.community, self.id);
        format!(
            r#"<div class="thing link" data-fullname="{id}" data-subreddit="{community}" data-timestamp="{ts}" data-author="{author}" data-permalink="{permalink}"><p class="title"><a class="title" href="{permalink}">{id}</a></p></div>"#,
            id = escape(&self.id),
            community = escape(&self.community),
            ts = self.timestamp_millis,
            author = escape(&self.author),
            permalink = escape(&permalink),
        )
    }
}

/// A listing page document; `next` renders a next-page control with that href.
pub fn listing_page(rows: &[ListingRow], next: Option<&str>) -> String {
    let rows: String = rows.iter().map(ListingRow::render).collect();
    let nav = next
        .map(|href| {
            format!(
                r#"<div class="nav-buttons"><span class="next-button"><a href="{}" rel="nofollow next">next</a></span></div>"#,
                escape(href)
            )
        })
        .unwrap_or_default();
    format!(
        r#"<html><body><div id="siteTable" class="sitetable linklisting">{rows}{nav}</div></body></html>"#
    )
}

/// One comment, with optional nested replies.
#[derive(Debug, Clone)]
pub struct CommentFixture {
    id: String,
    author: String,
    score: Option<String>,
    time: Option<String>,
    text: Option<String>,
    classes: String,
    replies: Vec<CommentFixture>,
}

impl CommentFixture {
    pub fn new(id: &str, author: &str) -> Self {
        Self {
            id: id.to_string(),
            author: author.to_string(),
            score: None,
            time: None,
            text: None,
            classes: String::new(),
            replies: Vec::new(),
        }
    }

    pub fn score(mut self, score: &str) -> Self {
        self.score = Some(score.to_string());
        self
    }

    pub fn time(mut self, datetime: &str) -> Self {
        self.time = Some(datetime.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    /// Extra classes on the item, e.g. `"deleted"` or `"deleted collapsed"`.
    pub fn classes(mut self, classes: &str) -> Self {
        self.classes = classes.to_string();
        self
    }

    pub fn reply(mut self, reply: CommentFixture) -> Self {
        self.replies.push(reply);
        self
    }

    fn render(&self) -> String {
        let mut entry = String::new();
        if let Some(score) = &self.score {
            entry.push_str(&format!(
                r#"<p class="tagline"><span class="score unvoted">{}</span></p>"#,
                escape(score)
            ));
        }
        if let Some(time) = &self.time {
            entry.push_str(&format!(
                r#"<time class="live-timestamp" datetime="{}">some time ago</time>"#,
                escape(time)
            ));
        }
        if let Some(text) = &self.text {
            entry.push_str(&format!(
                r#"<form class="usertext"><div class="usertext-body"><div class="md"><p>{}</p></div></div></form>"#,
                escape(text)
            ));
        }

        let child = if self.replies.is_empty() {
            r#"<div class="child"></div>"#.to_string()
        } else {
            let replies: String = self.replies.iter().map(CommentFixture::render).collect();
            format!(r#"<div class="child"><div class="sitetable listing">{replies}</div></div>"#)
        };

        format!(
            r#"<div class="thing comment {classes}" data-fullname="{id}" data-author="{author}"><div class="entry">{entry}</div>{child}</div>"#,
            classes = escape(&self.classes),
            id = escape(&self.id),
            author = escape(&self.author),
        )
    }
}

fn discussion_section(comments: &[CommentFixture]) -> String {
    let comments: String = comments.iter().map(CommentFixture::render).collect();
    format!(
        r#"<div class="commentarea"><div class="sitetable nestedlisting">{comments}</div></div>"#
    )
}

/// A document holding only a discussion section with these top-level comments.
pub fn comment_area(comments: &[CommentFixture]) -> String {
    format!(
        "<html><body>{}</body></html>",
        discussion_section(comments)
    )
}

/// A detail page document.
#[derive(Debug, Clone)]
pub struct DetailFixture {
    id: String,
    title: String,
    score: Option<String>,
    body: Option<String>,
    kind: Option<String>,
    media_url: Option<String>,
    is_gallery: bool,
    is_promoted: bool,
    comments: Vec<CommentFixture>,
}

impl DetailFixture {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            title: String::new(),
            score: None,
            body: None,
            kind: None,
            media_url: None,
            is_gallery: false,
            is_promoted: false,
            comments: Vec::new(),
        }
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn score(mut self, score: &str) -> Self {
        self.score = Some(score.to_string());
        self
    }

    pub fn body(mut self, body: &str) -> Self {
        self.body = Some(body.to_string());
        self
    }

    pub fn kind(mut self, kind: &str) -> Self {
        self.kind = Some(kind.to_string());
        self
    }

    pub fn media_url(mut self, url: &str) -> Self {
        self.media_url = Some(url.to_string());
        self
    }

    pub fn gallery(mut self) -> Self {
        self.is_gallery = true;
        self
    }

    pub fn promoted(mut self) -> Self {
        self.is_promoted = true;
        self
    }

    pub fn comment(mut self, comment: CommentFixture) -> Self {
        self.comments.push(comment);
        self
    }

    pub fn render(&self) -> String {
        let mut attrs = format!(
            r#"data-fullname="{}" data-promoted="{}" data-is-gallery="{}""#,
            escape(&self.id),
            self.is_promoted,
            self.is_gallery
        );
        if let Some(kind) = &self.kind {
            attrs.push_str(&format!(r#" data-kind="{}""#, escape(kind)));
        }
        if let Some(url) = &self.media_url {
            attrs.push_str(&format!(r#" data-url="{}""#, escape(url)));
        }

        let score = self
            .score
            .as_ref()
            .map(|s| {
                format!(
                    r#"<div class="midcol"><div class="score unvoted" title="{0}">{0}</div></div>"#,
                    escape(s)
                )
            })
            .unwrap_or_default();
        let body = self
            .body
            .as_ref()
            .map(|b| {
                format!(
                    r#"<div class="expando"><form class="usertext"><div class="usertext-body"><div class="md"><p>{}</p></div></div></form></div>"#,
                    escape(b)
                )
            })
            .unwrap_or_default();

        format!(
            r#"<html><body><div id="siteTable" class="sitetable linklisting"><div class="thing link" {attrs}>{score}<div class="entry"><p class="title"><a class="title" href="/">{title}</a></p>{body}</div></div></div>{discussion}</body></html>"#,
            title = escape(&self.title),
            discussion = discussion_section(&self.comments),
        )
    }
}
