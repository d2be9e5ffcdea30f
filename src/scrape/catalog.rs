//! Catalog listing pages: one tile per anime.

use scraper::{ElementRef, Html};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::barrier::await_completions;
use super::html::{
    absolutize, attr, background_image_url, first_in, select, text_of,
};
use super::page::{BrowserPage, Pacing, ScrollTarget, delay};
use crate::domain::{AnimeSummary, AudioType};

const PRIMARY_CONTAINER: &str = ".film-list";
const FALLBACK_CONTAINERS: &[&str] = &[".container", ".main-content", ".content", "#content"];
const PRIMARY_WAIT: Duration = Duration::from_secs(10);
const FALLBACK_WAIT: Duration = Duration::from_secs(3);

const IMG_SOURCE_ATTRS: &[&str] = &["src", "data-src", "data-original", "data-lazy", "data-lazy-src"];
const LINK_IMAGE_ATTRS: &[&str] = &["data-src", "data-image", "data-poster", "data-thumb"];

/// Substrings of known placeholder images.
const POSTER_PLACEHOLDERS: &[&str] = &[
    "no_poster",
    "placeholder.",
    "default.jpg",
    "no-image.",
    "loading.",
    "lazy.",
    "about:blank",
];
const MIN_POSTER_LEN: usize = 10;

/// Loads `url` on `page` and reads every tile. Never fails: a page that does
/// not load yields an empty list.
pub async fn extract_catalog(
    page: &dyn BrowserPage,
    url: &str,
    site_base: &str,
    timeout: Duration,
    pacing: &Pacing,
) -> Vec<AnimeSummary> {
    if let Err(e) = page.goto(url, timeout).await {
        warn!(url, error = %e, "Catalog page failed to load");
        return Vec::new();
    }

    if !page.wait_for_selector(PRIMARY_CONTAINER, PRIMARY_WAIT).await {
        debug!(url, "Film list container missing, probing alternatives");
        for selector in FALLBACK_CONTAINERS {
            if page.wait_for_selector(selector, FALLBACK_WAIT).await {
                debug!(url, selector, "Found alternative container");
                break;
            }
        }
    }

    delay(pacing.catalog_settle_ms).await;
    settle_lazy_images(page, pacing).await;

    let html = match page.content().await {
        Ok(html) => html,
        Err(e) => {
            warn!(url, error = %e, "Could not read catalog page");
            return Vec::new();
        }
    };

    let items = parse_catalog(&html, site_base);
    info!(
        url,
        found = items.len(),
        with_posters = items.iter().filter(|item| item.poster_image.is_some()).count(),
        "Catalog page extracted"
    );
    items
}

/// Scrolls to the bottom and back so deferred images start loading, then
/// waits for every image to load or error, up to the pacing ceiling.
async fn settle_lazy_images(page: &dyn BrowserPage, pacing: &Pacing) {
    if let Err(e) = page.scroll(ScrollTarget::Bottom).await {
        debug!(error = %e, "Scroll to bottom failed");
    }
    delay(pacing.scroll_bottom_ms).await;
    if let Err(e) = page.scroll(ScrollTarget::Top).await {
        debug!(error = %e, "Scroll to top failed");
    }
    delay(pacing.scroll_top_ms).await;

    let count = page.image_count().await.unwrap_or(0);
    if count == 0 {
        return;
    }

    let probes = (0..count).map(|index| async move {
        loop {
            match page.image_settled(index).await {
                Ok(false) => tokio::time::sleep(pacing.image_poll).await,
                Ok(true) | Err(_) => break,
            }
        }
    });

    let outcome = await_completions(probes, pacing.image_ceiling).await;
    debug!(
        loaded = outcome.completed,
        total = outcome.expected,
        complete = outcome.is_complete(),
        "Poster images settled"
    );
}

/// Reads tiles from a listing page snapshot, deduplicated by detail URL in
/// first-seen order.
#[must_use]
pub fn parse_catalog(html: &str, site_base: &str) -> Vec<AnimeSummary> {
    let doc = Html::parse_document(html);
    let root = doc.root_element();

    let items = first_in(root, PRIMARY_CONTAINER)
        .map_or_else(|| select(root, ".item"), |list| select(list, ".item"));

    let mut seen = HashSet::new();
    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let position = u32::try_from(index + 1).unwrap_or(u32::MAX);
            parse_item(item, position, site_base)
        })
        .filter(|summary| seen.insert(summary.detail_url.clone()))
        .collect()
}

fn parse_item(item: ElementRef<'_>, position: u32, site_base: &str) -> Option<AnimeSummary> {
    let inner = first_in(item, ".inner")?;
    let anchors = select(inner, "a[href]");
    let poster_link = *anchors.first()?;
    let title_link = *anchors.get(1)?;

    let title = attr(title_link, "data-jititle")
        .map(ToString::to_string)
        .or_else(|| Some(text_of(title_link)).filter(|text| !text.is_empty()))
        .unwrap_or_else(|| format!("Anime {position}"));

    let detail_url = absolutize(site_base, attr(title_link, "href")?);
    if !detail_url.contains("/anime/") {
        return None;
    }

    let poster_image = poster_from_img(poster_link, site_base)
        .or_else(|| poster_from_any_img(item, site_base))
        .or_else(|| poster_from_background(poster_link, site_base))
        .or_else(|| poster_from_link_attrs(poster_link, site_base));

    let status = first_in(poster_link, ".status");
    let episodes_label = status
        .and_then(|status| first_in(status, ".ep"))
        .map(text_of)
        .filter(|text| !text.is_empty());
    let audio_type = status
        .and_then(|status| first_in(status, ".sub"))
        .map(text_of)
        .map(|label| AudioType::from_label(&label))
        .filter(|audio| *audio != AudioType::Unknown)
        .unwrap_or_else(|| AudioType::infer_from_title(&title));

    Some(AnimeSummary {
        position,
        title,
        detail_url,
        poster_image,
        episodes_label,
        audio_type,
    })
}

fn poster_from_img(link: ElementRef<'_>, site_base: &str) -> Option<String> {
    let img = first_in(link, "img")?;
    IMG_SOURCE_ATTRS
        .iter()
        .filter_map(|name| attr(img, name))
        .find_map(|value| accept_poster(value, site_base))
}

fn poster_from_any_img(item: ElementRef<'_>, site_base: &str) -> Option<String> {
    select(item, "img")
        .into_iter()
        .filter_map(|img| attr(img, "src").or_else(|| attr(img, "data-src")))
        .filter(|src| src.contains("/poster/") || src.contains(".jpg") || src.contains(".png"))
        .find_map(|src| accept_poster(src, site_base))
}

fn poster_from_background(link: ElementRef<'_>, site_base: &str) -> Option<String> {
    link.descendants()
        .filter_map(ElementRef::wrap)
        .filter_map(|el| attr(el, "style"))
        .filter_map(background_image_url)
        .find_map(|value| accept_poster(&value, site_base))
}

fn poster_from_link_attrs(link: ElementRef<'_>, site_base: &str) -> Option<String> {
    LINK_IMAGE_ATTRS
        .iter()
        .filter_map(|name| attr(link, name))
        .filter(|value| [".jpg", ".png", ".jpeg"].iter().any(|ext| value.contains(ext)))
        .find_map(|value| accept_poster(value, site_base))
}

/// Absolutizes a poster candidate, rejecting placeholders and junk values.
fn accept_poster(value: &str, site_base: &str) -> Option<String> {
    let url = if let Some(rest) = value.strip_prefix("//") {
        format!("https://{rest}")
    } else if value.starts_with('/') {
        format!("{}{value}", site_base.trim_end_matches('/'))
    } else {
        value.to_string()
    };

    let rejected = url.len() < MIN_POSTER_LEN
        || POSTER_PLACEHOLDERS.iter().any(|needle| url.contains(needle));
    (!rejected).then_some(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrape::testing::FakePage;

    const BASE: &str = "https://w1.123animes.ru";

    fn tile(title: &str, slug: &str, img: &str, status: &str) -> String {
        format!(
            r#"<div class="item"><div class="inner">
                <a href="/anime/{slug}" class="poster">{img}{status}</a>
                <a href="/anime/{slug}" class="name" data-jititle="{title}">{title}</a>
            </div></div>"#
        )
    }

    fn listing(tiles: &[String]) -> String {
        format!(
            r#"<html><body><nav><a href="/az-all-anime">A-Z</a></nav>
            <div class="film-list">{}</div></body></html>"#,
            tiles.concat()
        )
    }

    #[test]
    fn test_parse_catalog_reads_tiles() {
        let html = listing(&[
            tile(
                "Your Forma",
                "your-forma",
                r#"<img src="/images/loading.gif" data-src="/imgs/poster/your-forma.jpg">"#,
                r#"<div class="status"><div class="ep">12/12</div><span class="sub">SUB</span></div>"#,
            ),
            tile("One Piece Dub", "one-piece-dub", "", ""),
        ]);

        let items = parse_catalog(&html, BASE);
        assert_eq!(items.len(), 2);

        assert_eq!(items[0].position, 1);
        assert_eq!(items[0].title, "Your Forma");
        assert_eq!(items[0].detail_url, "https://w1.123animes.ru/anime/your-forma");
        assert_eq!(
            items[0].poster_image.as_deref(),
            Some("https://w1.123animes.ru/imgs/poster/your-forma.jpg")
        );
        assert_eq!(items[0].episodes_label.as_deref(), Some("12/12"));
        assert_eq!(items[0].audio_type, AudioType::Sub);

        assert_eq!(items[1].poster_image, None);
        assert_eq!(items[1].audio_type, AudioType::Dub);
    }

    #[test]
    fn test_parse_catalog_dedups_and_filters_links() {
        let mut tiles = vec![
            tile("Naruto", "naruto", "", ""),
            tile("Naruto", "naruto", "", ""),
        ];
        tiles.push(
            r#"<div class="item"><div class="inner"><a href="/genre/action">x</a><a href="/genre/action">Action</a></div></div>"#
                .to_string(),
        );
        let html = listing(&tiles);

        let items = parse_catalog(&html, BASE);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Naruto");
        assert_eq!(parse_catalog(&html, BASE), items);
    }

    #[test]
    fn test_poster_from_background_and_placeholders() {
        let html = listing(&[tile(
            "Bleach",
            "bleach",
            r#"<img src="/img/no_poster.jpg"><span style="background-image: url('https://cdn.example.org/bleach.webp')"></span>"#,
            "",
        )]);

        let items = parse_catalog(&html, BASE);
        assert_eq!(
            items[0].poster_image.as_deref(),
            Some("https://cdn.example.org/bleach.webp")
        );
        assert_eq!(accept_poster("x.jpg", BASE), None);
    }

    #[test]
    fn test_parse_catalog_without_film_list() {
        let html = format!(
            "<html><body><div class='content'>{}</div></body></html>",
            tile("Monster", "monster", "", "")
        );
        let items = parse_catalog(&html, BASE);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Monster");
    }

    #[tokio::test]
    async fn test_extract_catalog_returns_empty_on_failed_navigation() {
        let url = "https://w1.123animes.ru/az-all-anime/all/?page=2";
        let page = FakePage::new().failing(url, 1);
        let items =
            extract_catalog(&page, url, BASE, Duration::from_secs(1), &Pacing::immediate()).await;
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_extract_catalog_reads_loaded_page() {
        let url = "https://w1.123animes.ru/az-all-anime/all/?page=1";
        let html = listing(&[tile(
            "Mushishi",
            "mushishi",
            r#"<img src="https://w1.123animes.ru/imgs/poster/mushishi.jpg">"#,
            "",
        )]);
        let page = FakePage::new().with_page(url, &html);

        let items =
            extract_catalog(&page, url, BASE, Duration::from_secs(1), &Pacing::immediate()).await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Mushishi");
    }
}
