//! Small helpers over `scraper` snapshots of a page.

use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

#[must_use]
pub fn selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(selector) => Some(selector),
        Err(e) => {
            debug!(css, error = %e, "Unparseable selector skipped");
            None
        }
    }
}

/// All elements under `scope` matching `css`, in document order.
#[must_use]
pub fn select<'a>(scope: ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
    selector(css).map_or_else(Vec::new, |sel| scope.select(&sel).collect())
}

#[must_use]
pub fn first_in<'a>(scope: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    let sel = selector(css)?;
    scope.select(&sel).next()
}

/// First element matching any selector, trying selectors in order.
#[must_use]
pub fn first_of<'a>(doc: &'a Html, selectors: &[&str]) -> Option<ElementRef<'a>> {
    selectors
        .iter()
        .find_map(|css| first_in(doc.root_element(), css))
}

/// Visible text with whitespace runs collapsed to single spaces.
#[must_use]
pub fn text_of(el: ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<String>())
}

#[must_use]
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Trimmed, non-empty attribute value.
#[must_use]
pub fn attr<'a>(el: ElementRef<'a>, name: &str) -> Option<&'a str> {
    el.value()
        .attr(name)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Text of the first link inside `el`, else the text of `el` itself.
#[must_use]
pub fn link_or_text(el: ElementRef<'_>) -> String {
    first_in(el, "a").map_or_else(|| text_of(el), text_of)
}

#[must_use]
pub fn next_element_sibling(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    el.next_siblings().find_map(ElementRef::wrap)
}

#[must_use]
pub fn element_children_count(el: ElementRef<'_>) -> usize {
    el.children().filter_map(ElementRef::wrap).count()
}

/// Whether `el` or any ancestor carries a class containing one of `needles`.
#[must_use]
pub fn within_class(el: ElementRef<'_>, needles: &[&str]) -> bool {
    std::iter::once(el)
        .chain(el.ancestors().filter_map(ElementRef::wrap))
        .any(|node| {
            node.value()
                .attr("class")
                .is_some_and(|class| needles.iter().any(|needle| class.contains(needle)))
        })
}

/// Resolves `href` against `base`, leaving already-absolute URLs alone.
#[must_use]
pub fn absolutize(base: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    Url::parse(base)
        .and_then(|base| base.join(href))
        .map_or_else(|_| href.to_string(), String::from)
}

/// Extracts the URL from an inline `background-image: url(...)` declaration.
#[must_use]
pub fn background_image_url(style: &str) -> Option<String> {
    let lower = style.to_ascii_lowercase();
    let start = lower.find("url(")? + 4;
    let rest = &style[start..];
    let end = rest.find(')')?;
    let value = rest[..end].trim().trim_matches(|c| c == '"' || c == '\'');
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_and_siblings() {
        let doc = Html::parse_document(
            "<dl><dt> Type: </dt>\n<dd><a href='/t'>TV   Series</a></dd></dl>",
        );
        let dt = first_in(doc.root_element(), "dt").unwrap();
        assert_eq!(text_of(dt), "Type:");
        let dd = next_element_sibling(dt).unwrap();
        assert_eq!(dd.value().name(), "dd");
        assert_eq!(link_or_text(dd), "TV Series");
    }

    #[test]
    fn test_within_class() {
        let doc = Html::parse_document(
            "<div class='video-player'><div><p id='x'>hi</p></div></div><p id='y'>ok</p>",
        );
        let x = first_in(doc.root_element(), "#x").unwrap();
        let y = first_in(doc.root_element(), "#y").unwrap();
        assert!(within_class(x, &["player"]));
        assert!(!within_class(y, &["player"]));
    }

    #[test]
    fn test_absolutize_and_background() {
        assert_eq!(
            absolutize("https://w1.123animes.ru/az-all-anime/all/", "/imgs/poster/a.jpg"),
            "https://w1.123animes.ru/imgs/poster/a.jpg"
        );
        assert_eq!(
            absolutize("https://w1.123animes.ru", "https://cdn.x/a.jpg"),
            "https://cdn.x/a.jpg"
        );
        assert_eq!(
            background_image_url("background-image: url('https://cdn.x/p.webp');"),
            Some("https://cdn.x/p.webp".to_string())
        );
        assert_eq!(background_image_url("color: red"), None);
    }

    #[test]
    fn test_invalid_selector_is_skipped() {
        let doc = Html::parse_document("<p>x</p>");
        assert!(select(doc.root_element(), "p[[").is_empty());
        assert!(first_of(&doc, &["p[[", "p"]).is_some());
    }
}
