//! Browser lifecycle: one [`ScraperSession`] per top-level operation.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromeConfig};
use chromiumoxide::handler::viewport::Viewport;
use futures::StreamExt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::ScrapeError;
use super::gate::ResourceGate;
use super::page::{BrowserPage, ChromePage};
use crate::config::{BrowserConfig, MAX_POOL_SIZE};

/// Fixed set of pages handed out round-robin.
///
/// There is no locking: a caller running at most `len()` tasks at once with
/// distinct consecutive indices never shares a page between two tasks.
#[derive(Clone)]
pub struct PagePool {
    pages: Arc<[Arc<dyn BrowserPage>]>,
}

impl PagePool {
    #[must_use]
    pub fn new(pages: Vec<Arc<dyn BrowserPage>>) -> Self {
        Self {
            pages: pages.into(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Page for task `index`, i.e. `pages[index % len]`.
    #[must_use]
    pub fn acquire(&self, index: usize) -> Arc<dyn BrowserPage> {
        Arc::clone(&self.pages[index % self.pages.len()])
    }

    /// Clamps a requested limiter concurrency to the pool size.
    #[must_use]
    pub fn limit(&self, requested: usize) -> usize {
        requested.clamp(1, self.pages.len().max(1))
    }

    async fn close_all(&self) {
        for page in self.pages.iter() {
            if let Err(e) = page.close().await {
                debug!(error = %e, "Failed to close page");
            }
        }
    }
}

struct ChromeProcess {
    browser: Browser,
    handler: JoinHandle<()>,
}

/// Owns the page pool and the browser behind it.
pub struct ScraperSession {
    pool: PagePool,
    chrome: Option<ChromeProcess>,
}

impl ScraperSession {
    /// Session over pages that need no browser process of their own.
    #[must_use]
    pub fn from_pages(pages: Vec<Arc<dyn BrowserPage>>) -> Self {
        Self {
            pool: PagePool::new(pages),
            chrome: None,
        }
    }

    #[must_use]
    pub const fn pool(&self) -> &PagePool {
        &self.pool
    }

    /// Closes every page, then the browser.
    pub async fn close(mut self) {
        self.pool.close_all().await;

        if let Some(mut chrome) = self.chrome.take() {
            if let Err(e) = chrome.browser.close().await {
                debug!(error = %e, "Browser close failed");
            }
            if let Err(e) = chrome.browser.wait().await {
                debug!(error = %e, "Browser did not exit cleanly");
            }
            chrome.handler.abort();
        }
    }
}

impl Drop for ScraperSession {
    fn drop(&mut self) {
        if let Some(chrome) = &self.chrome {
            chrome.handler.abort();
        }
    }
}

#[async_trait]
pub trait SessionLauncher: Send + Sync {
    /// Opens a session with `workers` pages, each filtered by `gate`.
    async fn open(&self, workers: usize, gate: ResourceGate)
    -> Result<ScraperSession, ScrapeError>;
}

/// Launches a Chromium process per session.
pub struct ChromeLauncher {
    config: BrowserConfig,
}

impl ChromeLauncher {
    #[must_use]
    pub const fn new(config: BrowserConfig) -> Self {
        Self { config }
    }

    fn chrome_config(&self) -> Result<ChromeConfig, ScrapeError> {
        let viewport = Viewport {
            width: self.config.viewport_width,
            height: self.config.viewport_height,
            device_scale_factor: Some(1.0),
            ..Viewport::default()
        };

        let mut builder = ChromeConfig::builder()
            .enable_request_intercept()
            .viewport(viewport)
            .window_size(self.config.viewport_width, self.config.viewport_height)
            .launch_timeout(Duration::from_secs(self.config.launch_timeout_seconds))
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg(format!("--user-agent={}", self.config.user_agent));

        if !self.config.headless {
            builder = builder.with_head();
        }

        if let Some(path) = &self.config.executable_path {
            builder = builder.chrome_executable(path);
        }

        builder.build().map_err(ScrapeError::Launch)
    }
}

#[async_trait]
impl SessionLauncher for ChromeLauncher {
    async fn open(
        &self,
        workers: usize,
        gate: ResourceGate,
    ) -> Result<ScraperSession, ScrapeError> {
        let workers = workers.clamp(1, MAX_POOL_SIZE);
        let (browser, mut handler) = Browser::launch(self.chrome_config()?)
            .await
            .map_err(|e| ScrapeError::Launch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while handler.next().await.is_some() {}
        });

        let mut session = ScraperSession {
            pool: PagePool::new(Vec::new()),
            chrome: Some(ChromeProcess { browser, handler }),
        };

        let opened = match &session.chrome {
            Some(chrome) => {
                open_pages(&chrome.browser, workers, &gate, &self.config.user_agent).await
            }
            None => Vec::new(),
        };

        if opened.is_empty() {
            session.close().await;
            return Err(ScrapeError::Launch("No browser pages could be opened".to_string()));
        }

        if opened.len() < workers {
            warn!(requested = workers, opened = opened.len(), "Page pool is smaller than requested");
        }

        info!(pages = opened.len(), "Browser session ready");
        session.pool = PagePool::new(opened);
        Ok(session)
    }
}

async fn open_pages(
    browser: &Browser,
    workers: usize,
    gate: &ResourceGate,
    user_agent: &str,
) -> Vec<Arc<dyn BrowserPage>> {
    let attempts = (0..workers).map(|_| async {
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScrapeError::Launch(e.to_string()))?;
        ChromePage::new(page, gate.clone(), user_agent).await
    });

    futures::future::join_all(attempts)
        .await
        .into_iter()
        .filter_map(|result| match result {
            Ok(page) => Some(Arc::new(page) as Arc<dyn BrowserPage>),
            Err(e) => {
                warn!(error = %e, "Failed to open browser page");
                None
            }
        })
        .collect()
}

/// Runs `body` against a fresh session and always tears the session down afterwards.
pub async fn with_session<T, F, Fut>(
    launcher: &dyn SessionLauncher,
    workers: usize,
    gate: ResourceGate,
    body: F,
) -> Result<T, ScrapeError>
where
    F: FnOnce(PagePool) -> Fut + Send,
    Fut: Future<Output = T> + Send,
{
    let session = launcher.open(workers, gate).await?;
    let output = body(session.pool().clone()).await;
    session.close().await;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrape::testing::FakePage;

    #[test]
    fn test_pool_round_robin() {
        let a: Arc<dyn BrowserPage> = Arc::new(FakePage::new());
        let b: Arc<dyn BrowserPage> = Arc::new(FakePage::new());
        let pool = PagePool::new(vec![Arc::clone(&a), Arc::clone(&b)]);

        assert!(Arc::ptr_eq(&pool.acquire(0), &a));
        assert!(Arc::ptr_eq(&pool.acquire(1), &b));
        assert!(Arc::ptr_eq(&pool.acquire(4), &a));
        assert_eq!(pool.limit(8), 2);
        assert_eq!(pool.limit(0), 1);
    }

    #[tokio::test]
    async fn test_with_session_closes_pages() {
        let page = Arc::new(FakePage::new());
        let launcher = crate::scrape::testing::FakeLauncher::new(vec![Arc::clone(&page)]);

        let value = with_session(&launcher, 1, ResourceGate::detail(), |pool| async move {
            pool.len()
        })
        .await
        .unwrap();

        assert_eq!(value, 1);
        assert!(page.is_closed());
    }
}
