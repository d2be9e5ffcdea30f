//! The browser-tab seam.
//!
//! Extractors only talk to [`BrowserPage`]; [`ChromePage`] is the Chromium
//! implementation driven over CDP by `chromiumoxide`.

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EventRequestPaused, FailRequestParams,
};
use chromiumoxide::cdp::browser_protocol::network::{ErrorReason, ResourceType};
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::ScrapeError;
use super::gate::{GateDecision, ResourceGate, ResourceKind};

const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollTarget {
    Top,
    Bottom,
}

/// One browser tab. Implementations must tolerate being driven by a single
/// task at a time; the page pool guarantees that.
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Navigates and waits for the document, failing after `timeout`.
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), ScrapeError>;

    /// Serialized DOM of the current document.
    async fn content(&self) -> Result<String, ScrapeError>;

    /// Polls until `selector` matches or `timeout` passes.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> bool;

    /// Clicks every element matching `selector`; returns how many were clicked.
    async fn click_all(&self, selector: &str) -> Result<usize, ScrapeError>;

    /// Clicks the first element matching `selector` whose text contains any keyword.
    async fn click_first_with_text(
        &self,
        selector: &str,
        keywords: &[&str],
    ) -> Result<bool, ScrapeError>;

    async fn scroll(&self, target: ScrollTarget) -> Result<(), ScrapeError>;

    /// Number of `<img>` elements in the document.
    async fn image_count(&self) -> Result<usize, ScrapeError>;

    /// Whether image `index` finished loading or erroring.
    async fn image_settled(&self, index: usize) -> Result<bool, ScrapeError>;

    async fn close(&self) -> Result<(), ScrapeError>;
}

/// Sleeps for `millis`; every fixed pause in the extractors goes through here.
pub async fn delay(millis: u64) {
    if millis > 0 {
        tokio::time::sleep(Duration::from_millis(millis)).await;
    }
}

/// Fixed pauses that give client-side rendering time to catch up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// After a catalog page's container appears.
    pub catalog_settle_ms: u64,
    pub scroll_bottom_ms: u64,
    pub scroll_top_ms: u64,
    /// Ceiling for the poster-image barrier.
    pub image_ceiling: Duration,
    pub image_poll: Duration,
    /// After a detail page loads, before reading episodes.
    pub detail_settle_ms: u64,
    /// After range/load-more clicks.
    pub reveal_ms: u64,
    /// After a detail page loads for metadata only.
    pub metadata_settle_ms: u64,
    /// After an episode page loads, before the first iframe scan.
    pub episode_settle_ms: u64,
    /// Wait after a player trigger click is `trigger_base_ms + attempt * trigger_step_ms`.
    pub trigger_base_ms: u64,
    pub trigger_step_ms: u64,
    /// Before loading an episode page again after it yielded no iframe.
    pub renavigate_ms: u64,
    /// After the ranking page loads, before reading its charts.
    pub ranking_settle_ms: u64,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            catalog_settle_ms: 3000,
            scroll_bottom_ms: 2000,
            scroll_top_ms: 1000,
            image_ceiling: Duration::from_secs(5),
            image_poll: Duration::from_millis(100),
            detail_settle_ms: 3000,
            reveal_ms: 5000,
            metadata_settle_ms: 800,
            episode_settle_ms: 1500,
            trigger_base_ms: 1000,
            trigger_step_ms: 300,
            renavigate_ms: 800,
            ranking_settle_ms: 5000,
        }
    }
}

impl Pacing {
    /// No pauses at all; for pages that render synchronously.
    #[must_use]
    pub const fn immediate() -> Self {
        Self {
            catalog_settle_ms: 0,
            scroll_bottom_ms: 0,
            scroll_top_ms: 0,
            image_ceiling: Duration::from_millis(200),
            image_poll: Duration::from_millis(1),
            detail_settle_ms: 0,
            reveal_ms: 0,
            metadata_settle_ms: 0,
            episode_settle_ms: 0,
            trigger_base_ms: 0,
            trigger_step_ms: 0,
            renavigate_ms: 0,
            ranking_settle_ms: 0,
        }
    }

    #[must_use]
    pub const fn trigger_delay_ms(&self, attempt: u32) -> u64 {
        self.trigger_base_ms + attempt as u64 * self.trigger_step_ms
    }
}

pub struct ChromePage {
    page: Page,
    interceptor: JoinHandle<()>,
    closed: AtomicBool,
}

impl ChromePage {
    /// Wraps `page`, applies the user agent and wires `gate` into request interception.
    pub async fn new(page: Page, gate: ResourceGate, user_agent: &str) -> Result<Self, ScrapeError> {
        page.set_user_agent(user_agent)
            .await
            .map_err(|e| ScrapeError::Launch(format!("Failed to set user agent: {e}")))?;

        let mut paused = page
            .event_listener::<EventRequestPaused>()
            .await
            .map_err(|e| ScrapeError::Launch(format!("Failed to listen for requests: {e}")))?;

        let intercept_page = page.clone();
        let interceptor = tokio::spawn(async move {
            while let Some(event) = paused.next().await {
                let kind = resource_kind(&event.resource_type);
                let decision = gate.decide(kind, &event.request.url);

                let result = match decision {
                    GateDecision::Continue => intercept_page
                        .execute(ContinueRequestParams::new(event.request_id.clone()))
                        .await
                        .map(|_| ()),
                    GateDecision::Abort => {
                        trace!(url = %event.request.url, ?kind, "Blocked request");
                        intercept_page
                            .execute(FailRequestParams::new(
                                event.request_id.clone(),
                                ErrorReason::BlockedByClient,
                            ))
                            .await
                            .map(|_| ())
                    }
                };

                if let Err(e) = result {
                    debug!(error = %e, "Request interception reply failed");
                }
            }
        });

        Ok(Self {
            page,
            interceptor,
            closed: AtomicBool::new(false),
        })
    }

    async fn evaluate<T: serde::de::DeserializeOwned>(
        &self,
        expression: String,
    ) -> Result<T, ScrapeError> {
        self.page
            .evaluate(expression)
            .await
            .map_err(|e| ScrapeError::Evaluation(e.to_string()))?
            .into_value::<T>()
            .map_err(|e| ScrapeError::Evaluation(e.to_string()))
    }
}

impl Drop for ChromePage {
    fn drop(&mut self) {
        self.interceptor.abort();
    }
}

#[async_trait]
impl BrowserPage for ChromePage {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), ScrapeError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ScrapeError::Closed);
        }
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(ScrapeError::navigation(url, e.to_string())),
            Err(_) => Err(ScrapeError::Timeout {
                url: url.to_string(),
                millis: timeout.as_millis(),
            }),
        }
    }

    async fn content(&self) -> Result<String, ScrapeError> {
        self.page
            .content()
            .await
            .map_err(|e| ScrapeError::Evaluation(e.to_string()))
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> bool {
        let expression = format!("document.querySelector({}) !== null", js_string(selector));
        let deadline = Instant::now() + timeout;

        loop {
            if let Ok(true) = self.evaluate::<bool>(expression.clone()).await {
                return true;
            }
            if Instant::now() + SELECTOR_POLL_INTERVAL > deadline {
                return false;
            }
            tokio::time::sleep(SELECTOR_POLL_INTERVAL).await;
        }
    }

    async fn click_all(&self, selector: &str) -> Result<usize, ScrapeError> {
        let expression = format!(
            r"(() => {{
                const els = Array.from(document.querySelectorAll({sel}));
                for (const el of els) {{ try {{ el.click(); }} catch (e) {{}} }}
                return els.length;
            }})()",
            sel = js_string(selector)
        );
        self.evaluate::<usize>(expression).await
    }

    async fn click_first_with_text(
        &self,
        selector: &str,
        keywords: &[&str],
    ) -> Result<bool, ScrapeError> {
        let keywords = serde_json::to_string(keywords)
            .map_err(|e| ScrapeError::Evaluation(e.to_string()))?;
        let expression = format!(
            r"(() => {{
                const keywords = {keywords};
                for (const el of document.querySelectorAll({sel})) {{
                    const text = (el.textContent || '').toLowerCase();
                    if (keywords.some(k => text.includes(k))) {{
                        try {{ el.click(); return true; }} catch (e) {{}}
                    }}
                }}
                return false;
            }})()",
            sel = js_string(selector)
        );
        self.evaluate::<bool>(expression).await
    }

    async fn scroll(&self, target: ScrollTarget) -> Result<(), ScrapeError> {
        let expression = match target {
            ScrollTarget::Top => "window.scrollTo(0, 0); true",
            ScrollTarget::Bottom => "window.scrollTo(0, document.body.scrollHeight); true",
        };
        self.evaluate::<bool>(expression.to_string()).await.map(|_| ())
    }

    async fn image_count(&self) -> Result<usize, ScrapeError> {
        self.evaluate::<usize>("document.images.length".to_string())
            .await
    }

    async fn image_settled(&self, index: usize) -> Result<bool, ScrapeError> {
        self.evaluate::<bool>(format!(
            "(() => {{ const img = document.images[{index}]; return !img || img.complete; }})()"
        ))
        .await
    }

    async fn close(&self) -> Result<(), ScrapeError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.interceptor.abort();
        self.page
            .clone()
            .close()
            .await
            .map_err(|e| ScrapeError::Evaluation(e.to_string()))
    }
}

const fn resource_kind(resource_type: &ResourceType) -> ResourceKind {
    match resource_type {
        ResourceType::Document => ResourceKind::Document,
        ResourceType::Stylesheet => ResourceKind::Stylesheet,
        ResourceType::Image => ResourceKind::Image,
        ResourceType::Media => ResourceKind::Media,
        ResourceType::Font => ResourceKind::Font,
        ResourceType::Script => ResourceKind::Script,
        ResourceType::Xhr => ResourceKind::Xhr,
        ResourceType::Fetch => ResourceKind::Fetch,
        ResourceType::WebSocket => ResourceKind::WebSocket,
        ResourceType::Manifest => ResourceKind::Manifest,
        _ => ResourceKind::Other,
    }
}

/// Quotes `value` as a JavaScript string literal.
fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}
