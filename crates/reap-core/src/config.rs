use std::time::Duration;

use chrono::TimeDelta;

use crate::error::AppError;

pub const DEFAULT_LISTING_URL: &str = "https://old.reddit.com/r/all/new/";
pub const DEFAULT_WINDOW_HOURS: i64 = 24;
pub const DEFAULT_GROUP_SIZE: usize = 5;
pub const DEFAULT_MAX_PAGES: usize = 100;
pub const DEFAULT_MAX_COMMENT_DEPTH: usize = 200;
pub const DEFAULT_NAV_TIMEOUT: Duration = Duration::from_secs(30);

/// Where browser sessions come from, which also selects the scheduling mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionMode {
    /// Launch a local headless browser; items are fetched sequentially.
    Local,
    /// Connect to a remote DevTools endpoint; items are fetched in concurrent groups.
    Remote { endpoint: String },
}

impl SessionMode {
    pub fn is_remote(&self) -> bool {
        matches!(self, SessionMode::Remote { .. })
    }
}

/// Settings for one crawl-and-fetch run.
#[derive(Debug, Clone)]
pub struct ReapConfig {
    pub mode: SessionMode,
    pub listing_url: String,
    /// Trailing window; items posted before `now - window` are excluded.
    pub window: TimeDelta,
    /// Items per session in concurrent mode.
    pub group_size: usize,
    /// Upper bound on sessions held at once in concurrent mode (None = one per group, all at once).
    pub max_sessions: Option<usize>,
    pub max_pages: usize,
    pub max_comment_depth: usize,
    pub nav_timeout: Duration,
}

impl Default for ReapConfig {
    fn default() -> Self {
        Self {
            mode: SessionMode::Local,
            listing_url: DEFAULT_LISTING_URL.to_string(),
            window: TimeDelta::hours(DEFAULT_WINDOW_HOURS),
            group_size: DEFAULT_GROUP_SIZE,
            max_sessions: None,
            max_pages: DEFAULT_MAX_PAGES,
            max_comment_depth: DEFAULT_MAX_COMMENT_DEPTH,
            nav_timeout: DEFAULT_NAV_TIMEOUT,
        }
    }
}

impl ReapConfig {
    /// Read configuration from environment variables.
    ///
    /// - `BROWSER_WS_ENDPOINT` (optional, selects remote mode when set)
    /// - `REAP_LISTING_URL` (optional)
    /// - `REAP_WINDOW_HOURS` (optional, defaults to 24)
    /// - `REAP_GROUP_SIZE` (optional, defaults to 5)
    /// - `REAP_MAX_SESSIONS` (optional, unbounded when unset)
    /// - `REAP_MAX_PAGES` (optional, defaults to 100)
    /// - `REAP_MAX_COMMENT_DEPTH` (optional, defaults to 200)
    /// - `REAP_NAV_TIMEOUT_SECS` (optional, defaults to 30)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let mut config = Self::default();

        if let Some(endpoint) = lookup("BROWSER_WS_ENDPOINT").filter(|v| !v.trim().is_empty()) {
            config.mode = SessionMode::Remote { endpoint };
        }
        if let Some(url) = lookup("REAP_LISTING_URL") {
            url::Url::parse(&url).map_err(|e| {
                AppError::ConfigError(format!("Invalid REAP_LISTING_URL '{url}': {e}"))
            })?;
            config.listing_url = url;
        }
        if let Some(hours) = parse_positive(&lookup, "REAP_WINDOW_HOURS")? {
            config.window = i64::try_from(hours)
                .ok()
                .and_then(TimeDelta::try_hours)
                .ok_or_else(|| {
                    AppError::ConfigError(format!("REAP_WINDOW_HOURS {hours} is out of range"))
                })?;
        }
        if let Some(size) = parse_positive(&lookup, "REAP_GROUP_SIZE")? {
            config.group_size = size;
        }
        config.max_sessions = parse_positive(&lookup, "REAP_MAX_SESSIONS")?;
        if let Some(pages) = parse_positive(&lookup, "REAP_MAX_PAGES")? {
            config.max_pages = pages;
        }
        if let Some(depth) = parse_positive(&lookup, "REAP_MAX_COMMENT_DEPTH")? {
            config.max_comment_depth = depth;
        }
        if let Some(secs) = parse_positive(&lookup, "REAP_NAV_TIMEOUT_SECS")? {
            config.nav_timeout = Duration::from_secs(secs as u64);
        }

        Ok(config)
    }

    pub fn with_mode(mut self, mode: SessionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_listing_url(mut self, url: impl Into<String>) -> Self {
        self.listing_url = url.into();
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

    pub fn with_max_pages(mut self, pages: usize) -> Self {
        self.max_pages = pages.max(1);
        self
    }

    pub fn with_window(mut self, window: TimeDelta) -> Self {
        self.window = window;
        self
    }
}

fn parse_positive(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<usize>, AppError> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let parsed: usize = raw.trim().parse().map_err(|_| {
        AppError::ConfigError(format!(
            "Invalid {key} '{raw}': must be a positive integer"
        ))
    })?;
    if parsed == 0 {
        return Err(AppError::ConfigError(format!("{key} must be at least 1")));
    }
    Ok(Some(parsed))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_set() {
        let config = ReapConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.mode, SessionMode::Local);
        assert_eq!(config.listing_url, DEFAULT_LISTING_URL);
        assert_eq!(config.window, TimeDelta::hours(24));
        assert_eq!(config.group_size, 5);
        assert_eq!(config.max_sessions, None);
        assert_eq!(config.nav_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_endpoint_selects_remote_mode() {
        let config =
            ReapConfig::from_lookup(lookup(&[("BROWSER_WS_ENDPOINT", "ws://chrome:3000")]))
                .unwrap();
        assert_eq!(
            config.mode,
            SessionMode::Remote {
                endpoint: "ws://chrome:3000".into()
            }
        );
        assert!(config.mode.is_remote());
    }

    #[test]
    fn test_blank_endpoint_stays_local() {
        let config = ReapConfig::from_lookup(lookup(&[("BROWSER_WS_ENDPOINT", "  ")])).unwrap();
        assert_eq!(config.mode, SessionMode::Local);
    }

    #[test]
    fn test_numeric_overrides() {
        let config = ReapConfig::from_lookup(lookup(&[
            ("REAP_WINDOW_HOURS", "6"),
            ("REAP_GROUP_SIZE", "3"),
            ("REAP_MAX_SESSIONS", "2"),
            ("REAP_NAV_TIMEOUT_SECS", "10"),
        ]))
        .unwrap();
        assert_eq!(config.window, TimeDelta::hours(6));
        assert_eq!(config.group_size, 3);
        assert_eq!(config.max_sessions, Some(2));
        assert_eq!(config.nav_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        let err = ReapConfig::from_lookup(lookup(&[("REAP_GROUP_SIZE", "five")])).unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));

        let err = ReapConfig::from_lookup(lookup(&[("REAP_MAX_PAGES", "0")])).unwrap_err();
        assert!(err.to_string().contains("at least 1"));

        let err =
            ReapConfig::from_lookup(lookup(&[("REAP_LISTING_URL", "not a url")])).unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }

    #[test]
    fn test_window_beyond_time_delta_range_is_config_error() {
        let err = ReapConfig::from_lookup(lookup(&[("REAP_WINDOW_HOURS", "3000000000000")]))
            .unwrap_err();
        assert!(matches!(err, AppError::ConfigError(ref m) if m.contains("out of range")));

        let err = ReapConfig::from_lookup(lookup(&[(
            "REAP_WINDOW_HOURS",
            "18446744073709551615",
        )]))
        .unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }
}
