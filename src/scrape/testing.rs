//! In-memory [`BrowserPage`] for exercising extractor flows without Chromium.
//!
//! Each URL maps to a list of HTML states. Navigating shows the first state;
//! any click that hits at least one element advances to the next one, which
//! is enough to model "click to reveal" pages.

use async_trait::async_trait;
use scraper::Html;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::ScrapeError;
use super::gate::ResourceGate;
use super::html::{select, text_of};
use super::page::{BrowserPage, ScrollTarget};
use super::session::{ScraperSession, SessionLauncher};

#[derive(Default)]
pub struct FakePage {
    sites: Mutex<HashMap<String, Vec<String>>>,
    failures: Mutex<HashMap<String, u32>>,
    current: Mutex<Option<(String, usize)>>,
    visits: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: &str, html: &str) -> Self {
        self.with_states(url, &[html])
    }

    pub fn with_states(self, url: &str, states: &[&str]) -> Self {
        self.sites.lock().unwrap().insert(
            url.to_string(),
            states.iter().map(ToString::to_string).collect(),
        );
        self
    }

    /// Whether `close` was called at least once. Sessions share fake pages,
    /// so a closed page stays usable.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// The next `count` navigations to `url` fail.
    pub fn failing(self, url: &str, count: u32) -> Self {
        self.failures.lock().unwrap().insert(url.to_string(), count);
        self
    }

    pub fn visits(&self, url: &str) -> usize {
        self.visits
            .lock()
            .unwrap()
            .iter()
            .filter(|visited| *visited == url)
            .count()
    }

    fn current_html(&self) -> Option<String> {
        let current = self.current.lock().unwrap().clone()?;
        let sites = self.sites.lock().unwrap();
        let states = sites.get(&current.0)?;
        states.get(current.1).or_else(|| states.last()).cloned()
    }

    fn advance(&self) {
        if let Some((_, state)) = self.current.lock().unwrap().as_mut() {
            *state += 1;
        }
    }
}

fn count_matches(html: &str, selector: &str) -> usize {
    let doc = Html::parse_document(html);
    select(doc.root_element(), selector).len()
}

fn any_text_match(html: &str, selector: &str, keywords: &[&str]) -> bool {
    let doc = Html::parse_document(html);
    select(doc.root_element(), selector).into_iter().any(|el| {
        let text = text_of(el).to_lowercase();
        keywords.iter().any(|keyword| text.contains(keyword))
    })
}

#[async_trait]
impl BrowserPage for FakePage {
    async fn goto(&self, url: &str, _timeout: Duration) -> Result<(), ScrapeError> {
        self.visits.lock().unwrap().push(url.to_string());

        if let Some(remaining) = self.failures.lock().unwrap().get_mut(url)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(ScrapeError::navigation(url, "net::ERR_CONNECTION_RESET"));
        }

        if !self.sites.lock().unwrap().contains_key(url) {
            return Err(ScrapeError::navigation(url, "net::ERR_NAME_NOT_RESOLVED"));
        }

        *self.current.lock().unwrap() = Some((url.to_string(), 0));
        Ok(())
    }

    async fn content(&self) -> Result<String, ScrapeError> {
        self.current_html()
            .ok_or_else(|| ScrapeError::Evaluation("No document loaded".to_string()))
    }

    async fn wait_for_selector(&self, selector: &str, _timeout: Duration) -> bool {
        self.current_html()
            .is_some_and(|html| count_matches(&html, selector) > 0)
    }

    async fn click_all(&self, selector: &str) -> Result<usize, ScrapeError> {
        let clicked = self
            .current_html()
            .map_or(0, |html| count_matches(&html, selector));
        if clicked > 0 {
            self.advance();
        }
        Ok(clicked)
    }

    async fn click_first_with_text(
        &self,
        selector: &str,
        keywords: &[&str],
    ) -> Result<bool, ScrapeError> {
        let clicked = self
            .current_html()
            .is_some_and(|html| any_text_match(&html, selector, keywords));
        if clicked {
            self.advance();
        }
        Ok(clicked)
    }

    async fn scroll(&self, _target: ScrollTarget) -> Result<(), ScrapeError> {
        Ok(())
    }

    async fn image_count(&self) -> Result<usize, ScrapeError> {
        Ok(self.current_html().map_or(0, |html| count_matches(&html, "img")))
    }

    async fn image_settled(&self, _index: usize) -> Result<bool, ScrapeError> {
        Ok(true)
    }

    async fn close(&self) -> Result<(), ScrapeError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out the same fake pages for every session.
pub struct FakeLauncher {
    pages: Vec<Arc<FakePage>>,
    opened: AtomicUsize,
}

impl FakeLauncher {
    pub fn new(pages: Vec<Arc<FakePage>>) -> Self {
        Self {
            pages,
            opened: AtomicUsize::new(0),
        }
    }

    pub fn sessions_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionLauncher for FakeLauncher {
    async fn open(
        &self,
        workers: usize,
        _gate: ResourceGate,
    ) -> Result<ScraperSession, ScrapeError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let pages = self
            .pages
            .iter()
            .take(workers.max(1))
            .map(|page| Arc::clone(page) as Arc<dyn BrowserPage>)
            .collect();
        Ok(ScraperSession::from_pages(pages))
    }
}
