use thiserror::Error;

/// Failures raised by the browser layer.
///
/// Extractors catch these at their call boundary and degrade to empty or
/// partial results; only session setup surfaces them to callers.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Browser launch failed: {0}")]
    Launch(String),

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Timed out after {millis}ms: {url}")]
    Timeout { url: String, millis: u128 },

    #[error("Page evaluation failed: {0}")]
    Evaluation(String),

    #[error("Page is closed")]
    Closed,
}

impl ScrapeError {
    pub fn navigation(url: &str, message: impl Into<String>) -> Self {
        Self::Navigation {
            url: url.to_string(),
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrape_error_display() {
        let err = ScrapeError::navigation("https://example.org", "net::ERR_ABORTED");
        assert_eq!(
            err.to_string(),
            "Navigation to https://example.org failed: net::ERR_ABORTED"
        );

        let err = ScrapeError::Timeout {
            url: "https://example.org".to_string(),
            millis: 10_000,
        };
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "Timed out after 10000ms: https://example.org");
    }
}
