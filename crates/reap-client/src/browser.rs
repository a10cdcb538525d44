use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::fetch::{
    EnableParams, EventRequestPaused, FailRequestParams, RequestPattern,
};
use chromiumoxide::cdp::browser_protocol::network::{ErrorReason, ResourceType};
use chromiumoxide::{Browser, BrowserConfig, Handler};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use reap_core::config::{DEFAULT_NAV_TIMEOUT, ReapConfig, SessionMode};
use reap_core::error::AppError;
use reap_core::traits::{Page, Session, SessionFactory};

/// Resource types that are never downloaded unless overridden.
pub fn default_blocked_resources() -> Vec<ResourceType> {
    vec![
        ResourceType::Image,
        ResourceType::Media,
        ResourceType::Font,
        ResourceType::Stylesheet,
    ]
}

/// Opens Chromium sessions through the Chrome DevTools Protocol.
///
/// In [`SessionMode::Local`] each session is its own headless Chromium
/// process. In [`SessionMode::Remote`] each session is a fresh connection to
/// the configured DevTools websocket endpoint, so a pooled remote service
/// hands every group its own browser.
#[derive(Clone)]
pub struct ChromiumSessionFactory {
    mode: SessionMode,
    nav_timeout: Duration,
    blocked: Arc<[ResourceType]>,
    chrome_bin: Option<PathBuf>,
}

impl ChromiumSessionFactory {
    pub fn new(mode: SessionMode) -> Self {
        Self {
            mode,
            nav_timeout: DEFAULT_NAV_TIMEOUT,
            blocked: default_blocked_resources().into(),
            chrome_bin: None,
        }
    }

    pub fn from_config(config: &ReapConfig) -> Self {
        Self::new(config.mode.clone()).with_nav_timeout(config.nav_timeout)
    }

    pub fn with_nav_timeout(mut self, timeout: Duration) -> Self {
        self.nav_timeout = timeout;
        self
    }

    /// Replace the set of blocked resource types. An empty set disables interception.
    pub fn with_blocked_resources(mut self, blocked: Vec<ResourceType>) -> Self {
        self.blocked = blocked.into();
        self
    }

    /// Explicit Chromium binary for local mode, taking precedence over discovery.
    pub fn with_chrome_binary(mut self, bin: impl Into<PathBuf>) -> Self {
        self.chrome_bin = Some(bin.into());
        self
    }

    async fn launch(&self) -> Result<(Browser, Handler), AppError> {
        let mut builder = BrowserConfig::builder().no_sandbox().disable_default_args();

        let override_bin = self
            .chrome_bin
            .clone()
            .or_else(|| std::env::var_os("CHROME_BIN").map(PathBuf::from));
        if let Some(bin) = find_chrome_binary(override_bin) {
            tracing::info!("Using Chrome binary: {}", bin.display());
            builder = builder.chrome_executable(bin);
        }

        let config = builder
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--no-first-run")
            .build()
            .map_err(|e| AppError::BrowserError(format!("Browser config error: {e}")))?;

        Browser::launch(config)
            .await
            .map_err(|e| AppError::BrowserError(format!("Failed to launch browser: {e}")))
    }
}

impl SessionFactory for ChromiumSessionFactory {
    type Session = ChromiumSession;

    async fn open(&self) -> Result<ChromiumSession, AppError> {
        let (browser, handler) = match &self.mode {
            SessionMode::Local => self.launch().await?,
            SessionMode::Remote { endpoint } => {
                Browser::connect(endpoint.clone()).await.map_err(|e| {
                    AppError::BrowserError(format!("Failed to connect to {endpoint}: {e}"))
                })?
            }
        };
        tracing::debug!(remote = self.mode.is_remote(), "Browser session opened");

        Ok(ChromiumSession {
            browser,
            handler: drive_handler(handler),
            nav_timeout: self.nav_timeout,
            blocked: Arc::clone(&self.blocked),
        })
    }
}

/// The CDP handler must be polled continuously for the connection to work.
fn drive_handler(mut handler: Handler) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                tracing::warn!(error = %e, "Browser CDP handler error");
                break;
            }
        }
    })
}

pub struct ChromiumSession {
    browser: Browser,
    handler: JoinHandle<()>,
    nav_timeout: Duration,
    blocked: Arc<[ResourceType]>,
}

impl Session for ChromiumSession {
    type Page = ChromiumPage;

    async fn new_page(&self) -> Result<ChromiumPage, AppError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| AppError::BrowserError(format!("Failed to open page: {e}")))?;

        let interceptor = if self.blocked.is_empty() {
            None
        } else {
            Some(block_resources(&page, &self.blocked).await?)
        };

        Ok(ChromiumPage {
            page,
            nav_lock: Mutex::new(()),
            timeout: self.nav_timeout,
            interceptor,
        })
    }

    async fn close(mut self) -> Result<(), AppError> {
        let result = self
            .browser
            .close()
            .await
            .map(|_| ())
            .map_err(|e| AppError::BrowserError(format!("Failed to close browser: {e}")));
        self.handler.abort();
        result
    }
}

/// Pause requests of the blocked types and fail each one as blocked by the client.
async fn block_resources(
    page: &chromiumoxide::Page,
    blocked: &[ResourceType],
) -> Result<JoinHandle<()>, AppError> {
    let mut paused = page
        .event_listener::<EventRequestPaused>()
        .await
        .map_err(|e| AppError::BrowserError(format!("Failed to listen for requests: {e}")))?;

    let patterns: Vec<RequestPattern> = blocked
        .iter()
        .map(|kind| RequestPattern::builder().resource_type(kind.clone()).build())
        .collect();
    page.execute(EnableParams::builder().patterns(patterns).build())
        .await
        .map_err(|e| AppError::BrowserError(format!("Failed to enable interception: {e}")))?;

    let page = page.clone();
    Ok(tokio::spawn(async move {
        while let Some(event) = paused.next().await {
            let fail = FailRequestParams::new(event.request_id.clone(), ErrorReason::BlockedByClient);
            if let Err(e) = page.execute(fail).await {
                tracing::debug!(error = %e, "Failed to block request");
            }
        }
    }))
}

/// A tab with resource blocking applied.
///
/// `load` holds the page's navigation lock from `goto` until the snapshot is
/// taken, so concurrent callers sharing the tab each get their own markup.
pub struct ChromiumPage {
    page: chromiumoxide::Page,
    nav_lock: Mutex<()>,
    timeout: Duration,
    interceptor: Option<JoinHandle<()>>,
}

impl Page for ChromiumPage {
    async fn load(&self, url: &str) -> Result<String, AppError> {
        let _guard = self.nav_lock.lock().await;

        let result = tokio::time::timeout(self.timeout, async {
            self.page
                .goto(url)
                .await
                .map_err(|e| AppError::NavigationError(format!("Failed to navigate to {url}: {e}")))?;

            self.page
                .content()
                .await
                .map_err(|e| AppError::NavigationError(format!("Failed to read {url}: {e}")))
        })
        .await;

        match result {
            Ok(inner) => inner,
            Err(_) => Err(AppError::Timeout(whole_secs(self.timeout))),
        }
    }

    async fn close(self) -> Result<(), AppError> {
        if let Some(interceptor) = self.interceptor {
            interceptor.abort();
        }
        self.page
            .close()
            .await
            .map_err(|e| AppError::BrowserError(format!("Failed to close page: {e}")))
    }
}

/// Seconds, rounded up so a sub-second timeout never reads as 0.
fn whole_secs(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}

/// Tries to locate a real Chrome/Chromium binary.
///
/// An explicit override wins when it exists. On systems where Chromium is
/// installed via snap, the wrapper at `/snap/bin/chromium` strips unknown CLI
/// flags, so the real binary inside the snap is tried before well-known
/// system paths. `None` leaves the lookup to `chromiumoxide`.
pub fn find_chrome_binary(override_bin: Option<PathBuf>) -> Option<PathBuf> {
    const CANDIDATES: &[&str] = &[
        "/snap/chromium/current/usr/lib/chromium-browser/chrome",
        "/var/lib/flatpak/exports/bin/org.chromium.Chromium",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/google-chrome",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
    ];

    if let Some(path) = override_bin.filter(|p| p.exists()) {
        return Some(path);
    }

    CANDIDATES.iter().map(PathBuf::from).find(|p| p.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_blocked_resources() {
        let blocked = default_blocked_resources();
        assert_eq!(blocked.len(), 4);
        assert!(blocked.contains(&ResourceType::Image));
        assert!(blocked.contains(&ResourceType::Media));
        assert!(blocked.contains(&ResourceType::Font));
        assert!(blocked.contains(&ResourceType::Stylesheet));
        assert!(!blocked.contains(&ResourceType::Document));
        assert!(!blocked.contains(&ResourceType::Script));
    }

    #[test]
    fn test_timeout_seconds_round_up() {
        assert_eq!(whole_secs(Duration::from_millis(250)), 1);
        assert_eq!(whole_secs(Duration::from_millis(1500)), 2);
        assert_eq!(whole_secs(Duration::from_secs(30)), 30);
        assert_eq!(whole_secs(Duration::ZERO), 0);
    }

    #[test]
    fn test_existing_override_wins() {
        let exe = std::env::current_exe().unwrap();
        assert_eq!(find_chrome_binary(Some(exe.clone())), Some(exe));
    }

    #[test]
    fn test_missing_override_is_ignored() {
        let missing = PathBuf::from("/definitely/not/a/chrome");
        assert_ne!(find_chrome_binary(Some(missing.clone())), Some(missing));
    }

    #[test]
    fn test_factory_from_config() {
        let config = ReapConfig::default()
            .with_mode(SessionMode::Remote {
                endpoint: "ws://127.0.0.1:9222/devtools/browser/x".into(),
            });
        let factory = ChromiumSessionFactory::from_config(&config)
            .with_blocked_resources(vec![ResourceType::Image]);
        assert!(factory.mode.is_remote());
        assert_eq!(factory.nav_timeout, config.nav_timeout);
        assert_eq!(&*factory.blocked, &[ResourceType::Image]);
    }

    #[tokio::test]
    async fn test_remote_connect_failure_is_browser_error() {
        // Nothing listens on the discard port.
        let factory = ChromiumSessionFactory::new(SessionMode::Remote {
            endpoint: "ws://127.0.0.1:9/devtools/browser/none".into(),
        });
        let err = factory.open().await.err().unwrap();
        assert!(matches!(err, AppError::BrowserError(_)));
    }
}
