//! Ranked top-10 charts read from a second site and mapped onto the catalog.

use scraper::{ElementRef, Html};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info};

use super::ScrapeError;
use super::html::{attr, first_in, select, text_of};
use super::matcher::find_match;
use super::page::{BrowserPage, Pacing, delay};
use crate::domain::{AnimeSummary, AudioType, Category, title_slug};

/// Titles this short are navigation crumbs, not anime names.
const MIN_TITLE_LEN: usize = 4;

const TOP_ITEM_TITLE: &str = ".film-name a";
const LIST_ITEM_TITLE: &str = ".film-name a, .dynamic-name, a[title], a";

/// Which chart on the ranking page to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RankedList {
    Trending,
    Weekly,
    Monthly,
}

impl RankedList {
    pub const ALL: [Self; 3] = [Self::Trending, Self::Weekly, Self::Monthly];

    #[must_use]
    pub const fn category(self) -> Category {
        match self {
            Self::Trending => Category::Trending,
            Self::Weekly => Category::Weekly,
            Self::Monthly => Category::Monthly,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        self.category().as_str()
    }

    /// Chart containers, most specific first.
    const fn sections(self) -> &'static [&'static str] {
        match self {
            Self::Trending => &[".anif-block-ul.anif-block-chart.tab-pane.active"],
            Self::Weekly => &["#top-viewed-week", "[id*=\"top-viewed-week\"]"],
            Self::Monthly => &["#top-viewed-month", "[id*=\"top-viewed-month\"]"],
        }
    }
}

/// Loads the ranking page and reads one chart.
///
/// Unlike the catalog, a ranking page that does not load is an error: there
/// is nothing useful to return without it.
pub async fn extract_ranked_titles(
    page: &dyn BrowserPage,
    url: &str,
    list: RankedList,
    limit: usize,
    timeout: Duration,
    pacing: &Pacing,
) -> Result<Vec<String>, ScrapeError> {
    page.goto(url, timeout).await?;
    delay(pacing.ranking_settle_ms).await;
    let html = page.content().await?;

    let titles = parse_ranked_titles(&html, list, limit);
    info!(url, list = list.as_str(), found = titles.len(), "Ranked titles extracted");
    Ok(titles)
}

/// Reads up to `limit` distinct titles from a chart, podium entries first.
#[must_use]
pub fn parse_ranked_titles(html: &str, list: RankedList, limit: usize) -> Vec<String> {
    let doc = Html::parse_document(html);
    let root = doc.root_element();

    for css in list.sections() {
        let Some(section) = first_in(root, css) else {
            continue;
        };
        let titles = chart_titles(section, limit);
        if !titles.is_empty() {
            return titles;
        }
        debug!(section = css, "Chart section had no titles");
    }
    Vec::new()
}

fn chart_titles(section: ElementRef<'_>, limit: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut titles = Vec::new();

    let podium = select(section, ".item-top")
        .into_iter()
        .filter_map(|item| first_in(item, TOP_ITEM_TITLE))
        .map(text_of)
        .filter(|title| !title.is_empty());

    let rest = select(section, "li:not(.item-top)")
        .into_iter()
        .filter_map(|item| first_in(item, LIST_ITEM_TITLE))
        .filter_map(|link| {
            let text = text_of(link);
            if text.is_empty() {
                attr(link, "title").map(ToString::to_string)
            } else {
                Some(text)
            }
        })
        .filter(|title| title.chars().count() >= MIN_TITLE_LEN);

    for title in podium.chain(rest) {
        if titles.len() >= limit {
            break;
        }
        if seen.insert(title.clone()) {
            titles.push(title);
        }
    }
    titles
}

/// How a ranked title was tied to a catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickSource {
    Matched,
    /// No match; the catalog entry at `rank - 1` modulo the catalog size stands in.
    Positional,
    /// Empty catalog; the detail URL is generated from the title.
    Generated,
}

/// One chart entry paired with the catalog tile it will be stored as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedPick {
    pub rank: u32,
    /// Title as shown on the chart.
    pub title: String,
    pub summary: AnimeSummary,
    pub source: PickSource,
}

impl RankedPick {
    /// Only generated picks have no real detail page to enrich from.
    #[must_use]
    pub fn needs_metadata(&self) -> bool {
        self.source != PickSource::Generated
    }

    /// Stand-in picks borrow another anime's detail URL and must never be
    /// written over that anime's row.
    #[must_use]
    pub fn is_persistable(&self) -> bool {
        self.source == PickSource::Matched
    }
}

/// Pairs each chart title with a catalog tile, keeping chart order.
///
/// A matched pick keeps the catalog tile untouched. Stand-in picks show the
/// chart title at the chart position.
#[must_use]
pub fn pair_with_catalog(
    titles: &[String],
    catalog: &[AnimeSummary],
    anime_url: impl Fn(&str) -> String,
) -> Vec<RankedPick> {
    titles
        .iter()
        .enumerate()
        .map(|(index, title)| {
            let rank = u32::try_from(index + 1).unwrap_or(u32::MAX);
            let (tile, source) = match find_match(title, catalog) {
                Some(found) => (Some(found), PickSource::Matched),
                None if catalog.is_empty() => (None, PickSource::Generated),
                None => (catalog.get(index % catalog.len()), PickSource::Positional),
            };

            let summary = match (tile, source) {
                (Some(tile), PickSource::Matched) => tile.clone(),
                (Some(tile), _) => AnimeSummary {
                    position: rank,
                    title: title.clone(),
                    ..tile.clone()
                },
                (None, _) => AnimeSummary {
                    position: rank,
                    title: title.clone(),
                    detail_url: anime_url(&title_slug(title)),
                    poster_image: None,
                    episodes_label: None,
                    audio_type: AudioType::Sub,
                },
            };

            RankedPick {
                rank,
                title: title.clone(),
                summary,
                source,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrape::testing::FakePage;

    const HOME: &str = "https://hianime.to/home";

    fn chart(id: &str, class: &str, podium: &[&str], rest: &[&str]) -> String {
        let top: String = podium
            .iter()
            .map(|t| format!(r#"<li class="item-top"><div class="film-name"><a href="/x">{t}</a></div></li>"#))
            .collect();
        let others: String = rest
            .iter()
            .map(|t| format!(r#"<li><div class="film-name"><a href="/y">{t}</a></div></li>"#))
            .collect();
        format!(r#"<ul id="{id}" class="{class}">{top}{others}</ul>"#)
    }

    fn home() -> String {
        format!(
            "<html><body>{}{}{}</body></html>",
            chart(
                "top-viewed-day",
                "anif-block-ul anif-block-chart tab-pane active",
                &["One Piece", "Solo Leveling"],
                &["One Piece", "Dandadan", "Ok"],
            ),
            chart("top-viewed-week", "anif-block-ul anif-block-chart tab-pane", &["Bleach"], &["Naruto"]),
            r#"<div id="legacy-top-viewed-month"><ul><li><a title="Frieren: Beyond Journey's End"></a></li></ul></div>"#,
        )
    }

    fn tile(title: &str, slug: &str) -> AnimeSummary {
        AnimeSummary {
            position: 9,
            title: title.to_string(),
            detail_url: format!("https://w1.123animes.ru/anime/{slug}"),
            poster_image: Some(format!("https://w1.123animes.ru/imgs/poster/{slug}.jpg")),
            episodes_label: Some("12".to_string()),
            audio_type: AudioType::Dub,
        }
    }

    fn anime_url(slug: &str) -> String {
        format!("https://w1.123animes.ru/anime/{slug}")
    }

    #[test]
    fn test_parse_ranked_titles_per_chart() {
        let html = home();
        assert_eq!(
            parse_ranked_titles(&html, RankedList::Trending, 10),
            vec!["One Piece", "Solo Leveling", "Dandadan"]
        );
        assert_eq!(
            parse_ranked_titles(&html, RankedList::Trending, 2),
            vec!["One Piece", "Solo Leveling"]
        );
        assert_eq!(parse_ranked_titles(&html, RankedList::Weekly, 10), vec!["Bleach", "Naruto"]);
        assert_eq!(
            parse_ranked_titles(&html, RankedList::Monthly, 10),
            vec!["Frieren: Beyond Journey's End"]
        );
        assert!(parse_ranked_titles("<html></html>", RankedList::Weekly, 10).is_empty());
    }

    #[test]
    fn test_pair_with_catalog_fallbacks() {
        let titles = vec!["One Piece".to_string(), "Bocchi".to_string(), "Mushishi".to_string()];
        let catalog = vec![tile("One Piece Dub", "one-piece-dub"), tile("Monster", "monster")];

        let picks = pair_with_catalog(&titles, &catalog, anime_url);
        assert_eq!(picks.len(), 3);

        assert_eq!(picks[0].source, PickSource::Matched);
        assert!(picks[0].is_persistable());
        assert_eq!(picks[0].title, "One Piece");
        assert_eq!(picks[0].summary, catalog[0]);
        assert_eq!(picks[0].rank, 1);

        // index 1 % 2 and index 2 % 2
        assert_eq!(picks[1].source, PickSource::Positional);
        assert!(!picks[1].is_persistable());
        assert_eq!(picks[1].summary.title, "Bocchi");
        assert_eq!(picks[1].summary.position, 2);
        assert_eq!(picks[1].summary.detail_url, catalog[1].detail_url);
        assert_eq!(picks[2].summary.detail_url, catalog[0].detail_url);
        assert_eq!(picks[2].rank, 3);
    }

    #[test]
    fn test_pair_with_empty_catalog_generates_links() {
        let titles = vec!["Solo Leveling  Season 2".to_string()];
        let picks = pair_with_catalog(&titles, &[], anime_url);
        assert_eq!(picks[0].source, PickSource::Generated);
        assert!(!picks[0].needs_metadata());
        assert!(!picks[0].is_persistable());
        assert_eq!(
            picks[0].summary.detail_url,
            "https://w1.123animes.ru/anime/solo-leveling-season-2"
        );
        assert_eq!(picks[0].summary.audio_type, AudioType::Sub);
    }

    #[tokio::test]
    async fn test_extract_ranked_titles_requires_page() {
        let page = FakePage::new().failing(HOME, 1);
        let result = extract_ranked_titles(
            &page,
            HOME,
            RankedList::Trending,
            10,
            Duration::from_secs(1),
            &Pacing::immediate(),
        )
        .await;
        assert!(result.is_err());

        let page = FakePage::new().with_page(HOME, &home());
        let titles = extract_ranked_titles(
            &page,
            HOME,
            RankedList::Weekly,
            10,
            Duration::from_secs(1),
            &Pacing::immediate(),
        )
        .await
        .unwrap();
        assert_eq!(titles, vec!["Bleach", "Naruto"]);
    }
}
