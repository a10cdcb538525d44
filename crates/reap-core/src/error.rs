use thiserror::Error;

/// Application-wide error types for reap.
#[derive(Error, Debug)]
pub enum AppError {
    /// Navigating to a page or reading its rendered markup failed.
    #[error("Navigation error: {0}")]
    NavigationError(String),

    /// Markup did not have the expected shape.
    #[error("Extraction error: {0}")]
    ExtractionError(String),

    /// The message sink rejected or failed a publish call.
    #[error("Publish error: {0}")]
    PublishError(String),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Browser session or page lifecycle failure (launch, connect, open tab).
    #[error("Browser error: {0}")]
    BrowserError(String),

    /// Navigation timed out.
    #[error("Navigation timed out after {0} seconds")]
    Timeout(u64),

    /// JSON serialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl AppError {
    /// Returns true if this error came from reaching a page rather than reading it.
    pub fn is_navigation(&self) -> bool {
        matches!(self, AppError::NavigationError(_) | AppError::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigation_errors() {
        assert!(AppError::NavigationError("net::ERR_ABORTED".into()).is_navigation());
        assert!(AppError::Timeout(30).is_navigation());
        assert!(!AppError::PublishError("503".into()).is_navigation());
        assert!(!AppError::ExtractionError("too deep".into()).is_navigation());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            AppError::Timeout(30).to_string(),
            "Navigation timed out after 30 seconds"
        );
        assert_eq!(
            AppError::ConfigError("REAP_GROUP_SIZE must be at least 1".into()).to_string(),
            "Configuration error: REAP_GROUP_SIZE must be at least 1"
        );
    }
}
