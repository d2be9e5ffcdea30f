//! Resolving an episode page to its player iframe.

use scraper::Html;
use std::time::Duration;
use tracing::{debug, warn};

use super::html::{attr, first_in, select};
use super::page::{BrowserPage, Pacing, delay};
use super::retry::RetryPolicy;

/// Shortest iframe source accepted as a player URL.
pub const MIN_IFRAME_SRC_LEN: usize = 20;

/// Substrings of known player hosts and embed paths.
const PROVIDER_PATTERNS: &[&str] = &[
    "bunnycdn",
    "embed",
    "play",
    "stream",
    "video",
    "player",
    "vidsrc",
    "vidplay",
    "filemoon",
    "doodstream",
    "streamtape",
    "mp4upload",
    "mixdrop",
    "upstream",
    "streamwish",
    "vid",
    "watch",
];

/// Ad, analytics and captcha frames.
const BLOCKED_SOURCES: &[&str] = &[
    "dtscout.com",
    "google.com",
    "googletagmanager.com",
    "doubleclick.net",
    "googlesyndication.com",
    "googleadservices.com",
    "adsystem.com",
    "recaptcha",
    "facebook.com",
    "twitter.com",
    "instagram.com",
    "ads",
    "ad-",
    "analytics",
    "tracking",
    "about:blank",
];

const PRIORITY_SELECTORS: &[&str] = &[
    "#iframe_ext82377 iframe",
    "iframe[src*=\"bunnycdn\"]",
    "iframe[src*=\"embed\"]",
    "iframe[src*=\"play\"]",
    "iframe[src*=\"stream\"]",
    "iframe[src*=\"video\"]",
    "iframe[src*=\"player\"]",
    "iframe[src*=\"vid\"]",
];

const IFRAME_SOURCE_ATTRS: &[&str] = &["src", "data-src", "data-lazy", "data-original"];

const TRIGGER_SELECTOR: &str = "button, .play-btn, .load-btn, [onclick], .btn, .play-button";
const TRIGGER_KEYWORDS: &[&str] = &["play", "load", "watch", "server"];

/// Whether `src` is a player URL rather than an ad or tracking frame.
#[must_use]
pub fn is_valid_iframe_src(src: &str) -> bool {
    if src.len() < MIN_IFRAME_SRC_LEN || !src.starts_with("http") {
        return false;
    }
    let lower = src.to_lowercase();
    if BLOCKED_SOURCES.iter().any(|blocked| lower.contains(blocked)) {
        return false;
    }
    PROVIDER_PATTERNS.iter().any(|pattern| lower.contains(pattern))
}

/// First valid player iframe in a page snapshot.
#[must_use]
pub fn find_streaming_iframe(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let root = doc.root_element();

    PRIORITY_SELECTORS
        .iter()
        .filter_map(|css| first_in(root, css))
        .filter_map(|iframe| attr(iframe, "src"))
        .find(|src| is_valid_iframe_src(src))
        .or_else(|| {
            select(root, "iframe").into_iter().find_map(|iframe| {
                IFRAME_SOURCE_ATTRS
                    .iter()
                    .find_map(|name| attr(iframe, name))
                    .filter(|src| is_valid_iframe_src(src))
            })
        })
        .map(ToString::to_string)
}

/// Attempt limits and timeouts for one episode.
#[derive(Debug, Clone, Copy)]
pub struct ResolverSettings {
    pub timeout: Duration,
    /// Navigation attempts and the backoff after a failed one.
    pub navigation: RetryPolicy,
    /// Iframe scans per loaded page; every miss but the last clicks a player trigger.
    pub scan_attempts: u32,
    pub pacing: Pacing,
}

/// Where one episode's resolution stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveState {
    Pending,
    Navigating { attempt: u32 },
    Scanning { attempt: u32, scan: u32 },
    RetryTrigger { attempt: u32, scan: u32 },
    Resolved(String),
    Exhausted,
}

impl ResolveState {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved(_) | Self::Exhausted)
    }
}

/// Drives one episode through [`ResolveState`] until it resolves or runs out of attempts.
pub struct EpisodeResolver<'a> {
    page: &'a dyn BrowserPage,
    url: &'a str,
    settings: ResolverSettings,
    state: ResolveState,
}

impl<'a> EpisodeResolver<'a> {
    #[must_use]
    pub const fn new(page: &'a dyn BrowserPage, url: &'a str, settings: ResolverSettings) -> Self {
        Self {
            page,
            url,
            settings,
            state: ResolveState::Pending,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &ResolveState {
        &self.state
    }

    /// Advances one transition.
    pub async fn step(&mut self) {
        let max_navigations = self.settings.navigation.attempts.max(1);
        let max_scans = self.settings.scan_attempts.max(1);

        self.state = match std::mem::replace(&mut self.state, ResolveState::Exhausted) {
            ResolveState::Pending => ResolveState::Navigating { attempt: 1 },

            ResolveState::Navigating { attempt } => {
                match self.page.goto(self.url, self.settings.timeout).await {
                    Ok(()) => {
                        delay(self.settings.pacing.episode_settle_ms).await;
                        ResolveState::Scanning { attempt, scan: 1 }
                    }
                    Err(e) if attempt < max_navigations => {
                        debug!(url = self.url, attempt, error = %e, "Episode navigation failed, retrying");
                        tokio::time::sleep(self.settings.navigation.delay_for(attempt)).await;
                        ResolveState::Navigating {
                            attempt: attempt + 1,
                        }
                    }
                    Err(e) => {
                        warn!(url = self.url, attempt, error = %e, "Episode navigation failed");
                        ResolveState::Exhausted
                    }
                }
            }

            ResolveState::Scanning { attempt, scan } => {
                let found = match self.page.content().await {
                    Ok(html) => find_streaming_iframe(&html),
                    Err(e) => {
                        debug!(url = self.url, error = %e, "Could not read episode page");
                        None
                    }
                };

                match found {
                    Some(src) => ResolveState::Resolved(src),
                    None if scan < max_scans => ResolveState::RetryTrigger { attempt, scan },
                    None if attempt < max_navigations => {
                        debug!(url = self.url, attempt, "No iframe found, navigating again");
                        delay(self.settings.pacing.renavigate_ms).await;
                        ResolveState::Navigating {
                            attempt: attempt + 1,
                        }
                    }
                    None => ResolveState::Exhausted,
                }
            }

            ResolveState::RetryTrigger { attempt, scan } => {
                match self
                    .page
                    .click_first_with_text(TRIGGER_SELECTOR, TRIGGER_KEYWORDS)
                    .await
                {
                    Ok(true) => debug!(url = self.url, scan, "Clicked player trigger"),
                    Ok(false) => {}
                    Err(e) => debug!(url = self.url, error = %e, "Player trigger click failed"),
                }
                delay(self.settings.pacing.trigger_delay_ms(scan)).await;
                ResolveState::Scanning {
                    attempt,
                    scan: scan + 1,
                }
            }

            terminal @ (ResolveState::Resolved(_) | ResolveState::Exhausted) => terminal,
        };
    }

    /// Runs to a terminal state; `Some` holds the player URL.
    pub async fn resolve(mut self) -> Option<String> {
        while !self.state.is_terminal() {
            self.step().await;
        }
        match self.state {
            ResolveState::Resolved(src) => Some(src),
            _ => None,
        }
    }
}

/// Resolves `url` to a player iframe source, or `None` once every attempt is spent.
pub async fn resolve_episode(
    page: &dyn BrowserPage,
    url: &str,
    settings: ResolverSettings,
) -> Option<String> {
    EpisodeResolver::new(page, url, settings).resolve().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrape::testing::FakePage;

    const EPISODE: &str = "https://w1.123animes.ru/anime/your-forma/episode/1";
    const PLAYER: &str = "https://play.bunnycdn.example/embed/abc123";

    fn settings() -> ResolverSettings {
        ResolverSettings {
            timeout: Duration::from_secs(1),
            navigation: RetryPolicy::from_millis(2, 1),
            scan_attempts: 2,
            pacing: Pacing::immediate(),
        }
    }

    fn with_iframe(src: &str) -> String {
        format!(r#"<html><body><div id="iframe_ext82377"><iframe src="{src}"></iframe></div></body></html>"#)
    }

    #[test]
    fn test_iframe_validity() {
        assert!(is_valid_iframe_src(PLAYER));
        assert!(!is_valid_iframe_src("https://www.google.com/recaptcha/api2/anchor?k=1"));
        assert!(!is_valid_iframe_src("https://v.dtscout.com/embed/video"));
        assert!(!is_valid_iframe_src("about:blank"));
        assert!(!is_valid_iframe_src("https://vid.x/"));
        assert!(!is_valid_iframe_src("https://cdn.example.org/static/frame.html"));
        assert!(!is_valid_iframe_src("//play.bunnycdn.example/embed/abc123"));
    }

    #[test]
    fn test_find_streaming_iframe_prefers_valid_over_blocked() {
        let html = format!(
            r#"<html><body>
            <iframe src="https://recaptcha.google.com/recaptcha/api2/anchor"></iframe>
            <iframe data-src="{PLAYER}"></iframe>
            </body></html>"#
        );
        assert_eq!(find_streaming_iframe(&html).as_deref(), Some(PLAYER));
    }

    #[tokio::test]
    async fn test_blocked_iframe_only_resolves_to_none() {
        let page = FakePage::new().with_page(
            EPISODE,
            r#"<html><body><iframe src="https://recaptcha.google.com/recaptcha/api2/anchor?k=abc"></iframe></body></html>"#,
        );

        assert_eq!(resolve_episode(&page, EPISODE, settings()).await, None);
        assert_eq!(page.visits(EPISODE), 2);
    }

    #[tokio::test]
    async fn test_trigger_click_reveals_player() {
        let before = r#"<html><body><button class="btn">Server 1</button></body></html>"#;
        let after = with_iframe(PLAYER);
        let page = FakePage::new().with_states(EPISODE, &[before, &after]);

        let mut resolver = EpisodeResolver::new(&page, EPISODE, settings());
        let mut trail = Vec::new();
        while !resolver.state().is_terminal() {
            resolver.step().await;
            trail.push(resolver.state().clone());
        }

        assert_eq!(
            trail,
            vec![
                ResolveState::Navigating { attempt: 1 },
                ResolveState::Scanning { attempt: 1, scan: 1 },
                ResolveState::RetryTrigger { attempt: 1, scan: 1 },
                ResolveState::Scanning { attempt: 1, scan: 2 },
                ResolveState::Resolved(PLAYER.to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_navigation_retry_then_success() {
        let page = FakePage::new()
            .with_page(EPISODE, &with_iframe(PLAYER))
            .failing(EPISODE, 1);

        assert_eq!(
            resolve_episode(&page, EPISODE, settings()).await.as_deref(),
            Some(PLAYER)
        );
        assert_eq!(page.visits(EPISODE), 2);
    }

    #[tokio::test]
    async fn test_navigation_exhausted() {
        let page = FakePage::new().failing(EPISODE, 5);
        assert_eq!(resolve_episode(&page, EPISODE, settings()).await, None);
        assert_eq!(page.visits(EPISODE), 2);
    }
}
