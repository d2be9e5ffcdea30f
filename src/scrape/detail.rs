//! Anime detail pages: title, poster and the full episode list.

use regex::Regex;
use scraper::{ElementRef, Html};
use std::collections::HashSet;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::html::{absolutize, attr, first_in, select, text_of};
use super::metadata::parse_metadata;
use super::page::{BrowserPage, Pacing, delay};
use crate::domain::{
    AnimeDetail, EpisodeNumber, EpisodeRef, EpisodeStrategy, last_path_segment, slug_to_title,
};

const TITLE_SELECTORS: &[&str] = &[
    ".entry-title",
    ".anime-title",
    "h1.title",
    ".infoz h1",
    "h1",
    ".post-title",
];

const POSTER_SELECTORS: &[&str] = &[
    ".thumb img",
    ".poster img",
    ".anime-poster img",
    ".detail-poster img",
    "img[src*=\"poster\"]",
    "img[src*=\"cover\"]",
];

/// Buttons that reveal hidden episode ranges.
pub const REVEAL_SELECTOR: &str = "button[data-range], .range-btn, .load-more, .show-more, [onclick*=\"range\"], [onclick*=\"load\"]";

const RANGE_SELECTORS: &[&str] = &[
    ".episodes.range",
    ".episodes[data-range]",
    ".episode-range",
    "[class*=\"range\"]",
];

const CONTAINER_SELECTOR: &str = ".episodes, .episode-list, .eps-list, .eplister";

const DIRECT_SELECTORS: &[&str] = &[
    "a[href*=\"episode\"]",
    "a[href*=\"/ep-\"]",
    "a[href*=\"/ep/\"]",
    ".episode-link",
    ".ep-link",
];

/// Largest plausible episode number; anything above is pagination noise.
pub const DEFAULT_MAX_EPISODE: u32 = 2000;

/// A detail page as scraped: header fields, metadata and episodes.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailPage {
    pub detail: AnimeDetail,
    pub episodes: Vec<EpisodeRef>,
}

/// Loads `url`, reveals episode ranges and reads everything on the page.
///
/// A page that cannot be loaded yields [`AnimeDetail::partial`] and no episodes.
pub async fn extract_detail(
    page: &dyn BrowserPage,
    url: &str,
    timeout: Duration,
    max_episode: u32,
    pacing: &Pacing,
) -> DetailPage {
    if let Err(e) = page.goto(url, timeout).await {
        warn!(url, error = %e, "Detail page failed to load");
        return DetailPage {
            detail: AnimeDetail::partial(url),
            episodes: Vec::new(),
        };
    }
    delay(pacing.detail_settle_ms).await;

    match page.click_all(REVEAL_SELECTOR).await {
        Ok(0) => {}
        Ok(clicked) => {
            debug!(url, clicked, "Clicked range/load buttons");
            delay(pacing.reveal_ms).await;
        }
        Err(e) => debug!(url, error = %e, "Range reveal failed"),
    }

    let html = match page.content().await {
        Ok(html) => html,
        Err(e) => {
            warn!(url, error = %e, "Could not read detail page");
            return DetailPage {
                detail: AnimeDetail::partial(url),
                episodes: Vec::new(),
            };
        }
    };

    let detail = parse_detail(&html, url);
    let episodes = discover_episodes(&html, url, &detail.title, max_episode);
    info!(url, title = %detail.title, episodes = episodes.len(), "Detail page extracted");

    DetailPage { detail, episodes }
}

/// Loads `url` only for its labeled fields; `Err` lets callers retry.
pub async fn extract_metadata(
    page: &dyn BrowserPage,
    url: &str,
    title: &str,
    timeout: Duration,
    pacing: &Pacing,
) -> Result<crate::domain::AnimeMetadata, super::ScrapeError> {
    page.goto(url, timeout).await?;
    delay(pacing.metadata_settle_ms).await;
    let html = page.content().await?;
    Ok(parse_metadata(&html, title))
}

/// Header and metadata from a detail page snapshot.
#[must_use]
pub fn parse_detail(html: &str, url: &str) -> AnimeDetail {
    let (title, poster_image) = {
        let doc = Html::parse_document(html);
        let title = TITLE_SELECTORS
            .iter()
            .filter_map(|css| first_in(doc.root_element(), css))
            .map(text_of)
            .find(|text| !text.is_empty())
            .unwrap_or_else(|| title_from_url(url));

        let poster_image = POSTER_SELECTORS
            .iter()
            .filter_map(|css| first_in(doc.root_element(), css))
            .filter_map(|img| attr(img, "src"))
            .find(|src| !src.contains("no_poster"))
            .map(|src| absolutize(url, src));

        (title, poster_image)
    };

    AnimeDetail {
        metadata: parse_metadata(html, &title),
        title,
        detail_url: url.to_string(),
        poster_image,
    }
}

fn title_from_url(url: &str) -> String {
    let title = slug_to_title(last_path_segment(url));
    if title.is_empty() {
        "Unknown Anime".to_string()
    } else {
        title
    }
}

struct Candidate {
    label: Option<String>,
    url: String,
    range_id: Option<String>,
}

/// One discovery strategy: candidates found on the page, unfiltered.
type Strategy = fn(ElementRef<'_>, &str) -> Vec<Candidate>;

/// Strategies in priority order; the first one left with episodes after filtering wins.
const STRATEGIES: &[(EpisodeStrategy, Strategy)] = &[
    (EpisodeStrategy::Range, range_candidates),
    (EpisodeStrategy::Container, container_candidates),
    (EpisodeStrategy::Direct, direct_candidates),
];

fn episode_url_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/\d+/?$").expect("Invalid regex pattern defined in code"))
}

/// Whether `url` looks like an episode page.
#[must_use]
pub fn is_episode_url(url: &str) -> bool {
    url.contains("episode")
        || url.contains("/ep-")
        || url.contains("/ep/")
        || episode_url_pattern().is_match(url)
}

fn anchors_in(container: ElementRef<'_>, page_url: &str) -> Vec<(String, String)> {
    select(container, "a[href]")
        .into_iter()
        .filter_map(|anchor| {
            let href = attr(anchor, "href")?;
            Some((text_of(anchor), absolutize(page_url, href)))
        })
        .collect()
}

fn range_candidates(root: ElementRef<'_>, page_url: &str) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    let ranges: Vec<ElementRef<'_>> = RANGE_SELECTORS
        .iter()
        .flat_map(|css| select(root, css))
        .filter(|range| seen.insert(range.id()))
        .collect();

    let page_path = url::Url::parse(page_url)
        .map(|url| url.path().trim_end_matches('/').to_string())
        .unwrap_or_default();

    ranges
        .into_iter()
        .enumerate()
        .flat_map(|(index, range)| {
            let range_id = attr(range, "data-range-id")
                .or_else(|| attr(range, "data-range"))
                .map_or_else(|| format!("range-{index}"), ToString::to_string);

            anchors_in(range, page_url)
                .into_iter()
                .filter(|(_, url)| {
                    is_episode_url(url) || (!page_path.is_empty() && url.contains(&page_path))
                })
                .map(move |(label, url)| Candidate {
                    label: Some(label),
                    url,
                    range_id: Some(range_id.clone()),
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

fn container_candidates(root: ElementRef<'_>, page_url: &str) -> Vec<Candidate> {
    select(root, CONTAINER_SELECTOR)
        .into_iter()
        .enumerate()
        .flat_map(|(index, container)| {
            anchors_in(container, page_url)
                .into_iter()
                .filter(|(_, url)| is_episode_url(url))
                .map(move |(label, url)| Candidate {
                    label: Some(label).filter(|label| !label.is_empty()),
                    url,
                    range_id: Some(format!("container-{index}")),
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

fn direct_candidates(root: ElementRef<'_>, page_url: &str) -> Vec<Candidate> {
    DIRECT_SELECTORS
        .iter()
        .flat_map(|css| select(root, css))
        .filter_map(|anchor| {
            let url = absolutize(page_url, attr(anchor, "href")?);
            is_episode_url(&url).then(|| Candidate {
                label: Some(text_of(anchor)).filter(|label| !label.is_empty()),
                url,
                range_id: Some("direct".to_string()),
            })
        })
        .collect()
}

/// Runs the strategy chain over a detail page snapshot.
///
/// The result has no two entries with the same URL or the same numeric
/// episode value and is sorted ascending by that value.
#[must_use]
pub fn discover_episodes(
    html: &str,
    page_url: &str,
    anime_title: &str,
    max_episode: u32,
) -> Vec<EpisodeRef> {
    let doc = Html::parse_document(html);
    let root = doc.root_element();
    #[allow(clippy::cast_precision_loss)]
    let max = max_episode as f32;

    for (strategy, find) in STRATEGIES {
        let numbered: Vec<(EpisodeNumber, Candidate)> = find(root, page_url)
            .into_iter()
            .enumerate()
            .filter_map(|(index, candidate)| {
                let number = match &candidate.label {
                    Some(label) => EpisodeNumber::parse_label(label),
                    #[allow(clippy::cast_precision_loss)]
                    None => Some(EpisodeNumber::new((index + 1) as f32)),
                }?;
                number.is_within(1.0, max).then_some((number, candidate))
            })
            .collect();

        if numbered.is_empty() {
            debug!(%strategy, "Strategy found no episodes");
            continue;
        }

        let episodes = dedup_and_sort(numbered, anime_title, *strategy);
        debug!(%strategy, count = episodes.len(), "Episodes discovered");
        return episodes;
    }

    Vec::new()
}

fn dedup_and_sort(
    numbered: Vec<(EpisodeNumber, Candidate)>,
    anime_title: &str,
    strategy: EpisodeStrategy,
) -> Vec<EpisodeRef> {
    let mut seen_urls = HashSet::new();
    let mut seen_numbers = HashSet::new();

    let mut unique: Vec<(EpisodeNumber, Candidate)> = numbered
        .into_iter()
        .filter(|(number, candidate)| {
            let fresh = !seen_urls.contains(&candidate.url)
                && !seen_numbers.contains(&number.dedup_key());
            if fresh {
                seen_urls.insert(candidate.url.clone());
                seen_numbers.insert(number.dedup_key());
            }
            fresh
        })
        .collect();

    unique.sort_by(|(a, _), (b, _)| a.value().total_cmp(&b.value()));

    unique
        .into_iter()
        .map(|(number, candidate)| EpisodeRef {
            anime_title: anime_title.to_string(),
            episode_number: number.to_string(),
            episode_url: candidate.url,
            range_id: candidate.range_id,
            strategy,
        })
        .collect()
}
