//! Labeled fields and synopsis text from an anime detail page.
//!
//! Every field is read through an ordered chain of probes; the first probe
//! that yields a value wins and a field nobody finds stays `None`.

use regex::Regex;
use scraper::{ElementRef, Html};
use std::sync::OnceLock;
use tracing::debug;

use super::html::{
    collapse_whitespace, element_children_count, first_in, link_or_text, next_element_sibling,
    select, text_of, within_class,
};
use crate::domain::{AnimeMetadata, normalize_country};

pub const MIN_DESCRIPTION_LEN: usize = 50;
pub const MAX_DESCRIPTION_LEN: usize = 1500;
pub const DESCRIPTION_TRUNCATE_AT: usize = 1200;

const MAX_LABEL_LEN: usize = 50;
const MAX_COUNTRY_LEN: usize = 100;
const MAX_GENRE_LEN: usize = 30;
const MAX_GENRES: usize = 8;
const MAX_TEXT_GENRES: usize = 6;
const MIN_LEAF_DIV_LEN: usize = 100;

/// UI chrome that never appears in a real synopsis.
const UI_PHRASES: &[&str] = &[
    "you can also use the keyboard shortcuts",
    "keyboard shortcuts",
    "control the player",
    "one way or another, keep comments",
    "comments related to the anime",
    "about 123animes in general",
    "watch online",
    "click here",
    "disable adblock",
    "ad block",
    "show more",
    "show less",
    "morelink",
    "cursor:pointer",
];

/// Single UI words, matched as whole words so "endless" or "terror" pass.
const UI_WORDS: &[&str] = &[
    "streaming",
    "download",
    "loading",
    "error",
    "advertisement",
    "popup",
    "redirect",
    "mirror",
    "server",
    "quality",
    "resolution",
    "less",
    "more",
];

/// A synopsis mentions at least one of these.
pub const STORY_KEYWORDS: &[&str] = &[
    "story", "character", "world", "adventure", "journey", "protagonist", "hero", "villain",
    "power", "magic", "school", "student", "friend", "battle", "fight", "love", "romance",
    "family", "life", "death", "mystery", "secret", "truth", "past", "future", "anime", "manga",
    "series", "follows", "plot", "young", "boy", "girl", "man", "woman", "dreams", "goals",
    "challenges", "overcome", "discovers", "name", "known", "being", "becomes", "encounter",
    "handsome", "beautiful", "popular", "despite", "classmate",
];

const DESCRIPTION_SELECTORS: &[&str] = &[
    ".description",
    ".synopsis",
    ".plot",
    ".summary",
    ".story",
    ".anime-description",
    ".content-description",
    "div[class*=\"desc\"]",
    "div[class*=\"syn\"]",
    "p.description",
    "p.synopsis",
    ".dses",
    "p.dses",
];

const TOOLTIP_SELECTORS: &[&str] = &[
    "[id*=\"tooltipster\"] .tooltipster-content .dses",
    "[id*=\"tooltipster\"] .dses",
    ".tooltipster-content .dses",
    "[class*=\"tooltipster\"] .dses",
    "[class*=\"tooltip\"] .dses",
];

const CONTENT_AREAS: &str =
    ".content, .main-content, .post-content, .entry-content, .article-content, .info, .details";

/// Class fragments marking regions whose text is UI rather than content.
const CONTROL_REGIONS: &[&str] = &["control", "player", "video", "nav", "menu", "button", "morelink"];

const TYPE_SELECTORS: &[&str] = &[".type", ".format", "[data-type]", ".anime-type", ".kind"];
const GENRE_SELECTORS: &[&str] = &[".genres", ".genre-list", ".categories", ".tags"];
const KEYWORD_SELECTORS: &[&str] = &["div", "p", "span", ".keywords", "[class*=\"keyword\"]"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Kind,
    Genres,
    Country,
    Status,
    Released,
}

impl Field {
    /// Substrings of a `<dt>` term naming this field.
    const fn term_keywords(self) -> &'static [&'static str] {
        match self {
            Self::Kind => &["type", "format", "kind"],
            Self::Genres => &["genre", "category", "tag"],
            Self::Country => &["country", "origin", "nation"],
            Self::Status => &["status", "state"],
            Self::Released => &["released", "aired", "year", "date"],
        }
    }

    /// Prefix of a `label: value` row naming this field.
    const fn row_label(self) -> &'static str {
        match self {
            Self::Kind => "type:",
            Self::Genres => "genre:",
            Self::Country => "country:",
            Self::Status => "status:",
            Self::Released => "released:",
        }
    }

    fn names_term(self, term: &str) -> bool {
        self.term_keywords().iter().any(|keyword| term.contains(keyword))
    }
}

#[derive(Debug, Default)]
struct LabeledFields {
    kind: Option<String>,
    genres: Option<Vec<String>>,
    country: Option<String>,
    status: Option<String>,
    released: Option<String>,
}

impl LabeledFields {
    const fn is_complete(&self) -> bool {
        self.kind.is_some()
            && self.genres.is_some()
            && self.country.is_some()
            && self.status.is_some()
            && self.released.is_some()
    }

    /// `<dt>term</dt><dd>value</dd>` pairs.
    fn read_definitions(&mut self, root: ElementRef<'_>) {
        for dt in select(root, "dt") {
            let term = text_of(dt).to_lowercase();
            let Some(dd) = next_element_sibling(dt).filter(|el| el.value().name() == "dd") else {
                continue;
            };

            if self.kind.is_none() && Field::Kind.names_term(&term) {
                self.kind = short_label(link_or_text(dd));
            }
            if self.genres.is_none() && Field::Genres.names_term(&term) {
                self.genres = genres_in(dd, true);
            }
            if self.country.is_none() && Field::Country.names_term(&term) {
                self.country = Some(link_or_text(dd))
                    .filter(|text| !text.is_empty() && text.chars().count() < MAX_COUNTRY_LEN);
            }
            if self.status.is_none() && Field::Status.names_term(&term) {
                self.status = short_label(link_or_text(dd));
            }
            if self.released.is_none() && Field::Released.names_term(&term) {
                self.released = short_label(link_or_text(dd));
            }
        }
    }

    /// `.meta .col-sm-12` rows of the form `Label: <a>value</a>`.
    fn read_meta_rows(&mut self, root: ElementRef<'_>) {
        for row in select(root, ".meta .col-sm-12") {
            let text = text_of(row).to_lowercase();
            let linked = || first_in(row, "a").map(text_of).and_then(short_label);

            if self.kind.is_none() && text.contains(Field::Kind.row_label()) {
                self.kind = linked();
            }
            if self.genres.is_none() && text.contains(Field::Genres.row_label()) {
                self.genres = genres_in(row, false);
            }
            if self.country.is_none() && text.contains(Field::Country.row_label()) {
                self.country = linked();
            }
            if self.status.is_none() && text.contains(Field::Status.row_label()) {
                self.status = linked();
            }
            if self.released.is_none() && text.contains(Field::Released.row_label()) {
                self.released = linked();
            }
        }
    }
}

/// Reads every labeled field and the synopsis. `title` feeds the type heuristic.
#[must_use]
pub fn parse_metadata(html: &str, title: &str) -> AnimeMetadata {
    let doc = Html::parse_document(html);
    let root = doc.root_element();

    let mut fields = LabeledFields::default();
    fields.read_definitions(root);
    if !fields.is_complete() {
        fields.read_meta_rows(root);
    }

    let kind = fields
        .kind
        .or_else(|| kind_from_selectors(root))
        .unwrap_or_else(|| kind_from_title(title).to_string());

    let genres = fields
        .genres
        .or_else(|| genres_from_selectors(root))
        .unwrap_or_default();

    let country = fields
        .country
        .map(|raw| normalize_country(&raw))
        .or_else(|| country_from_page_text(root));

    AnimeMetadata {
        kind: Some(kind),
        genres,
        country,
        status: fields.status,
        released: fields.released,
        description: extract_description(root),
    }
}

fn short_label(text: String) -> Option<String> {
    let text = collapse_whitespace(&text);
    (!text.is_empty() && text.chars().count() < MAX_LABEL_LEN).then_some(text)
}

/// Genre names from links inside `scope`, preferring genre-page links.
/// With `text_fallback`, a comma-separated plain-text value is accepted too.
fn genres_in(scope: ElementRef<'_>, text_fallback: bool) -> Option<Vec<String>> {
    let mut links = select(scope, "a[href*=\"/genere/\"]");
    if links.is_empty() {
        links = select(scope, "a");
    }

    if !links.is_empty() {
        let genres: Vec<String> = links
            .into_iter()
            .map(text_of)
            .filter(|name| {
                let len = name.chars().count();
                len > 0 && len < MAX_GENRE_LEN && !name.to_lowercase().contains("view all")
            })
            .take(MAX_GENRES)
            .collect();
        return (!genres.is_empty()).then_some(genres);
    }

    if !text_fallback {
        return None;
    }

    let text = text_of(scope);
    if text.is_empty() || text.len() >= 200 {
        return None;
    }
    let genres: Vec<String> = text
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty() && name.chars().count() < MAX_GENRE_LEN)
        .take(MAX_TEXT_GENRES)
        .map(ToString::to_string)
        .collect();
    (!genres.is_empty()).then_some(genres)
}

fn kind_from_selectors(root: ElementRef<'_>) -> Option<String> {
    TYPE_SELECTORS
        .iter()
        .filter_map(|css| first_in(root, css))
        .find_map(|el| short_label(text_of(el)))
}

fn genres_from_selectors(root: ElementRef<'_>) -> Option<Vec<String>> {
    GENRE_SELECTORS
        .iter()
        .filter_map(|css| first_in(root, css))
        .find_map(|el| {
            let genres: Vec<String> = select(el, "a")
                .into_iter()
                .map(text_of)
                .filter(|name| !name.is_empty() && name.chars().count() < MAX_GENRE_LEN)
                .take(MAX_TEXT_GENRES)
                .collect();
            (!genres.is_empty()).then_some(genres)
        })
}

fn country_from_page_text(root: ElementRef<'_>) -> Option<String> {
    let text = root.text().collect::<String>().to_lowercase();
    if text.contains("japan") {
        Some("Japan".to_string())
    } else if text.contains("china") || text.contains("chinese") {
        Some("China".to_string())
    } else if text.contains("korea") {
        Some("Korea".to_string())
    } else {
        None
    }
}

/// Last-resort type guess from the title.
#[must_use]
pub fn kind_from_title(title: &str) -> &'static str {
    let lower = title.to_lowercase();
    if lower.contains("movie") || lower.contains("film") {
        "Movie"
    } else if lower.contains("ova") {
        "OVA"
    } else if lower.contains("special") {
        "Special"
    } else {
        "TV Series"
    }
}

/// Whether `text` reads like a synopsis rather than page chrome.
#[must_use]
pub fn is_valid_description(text: &str) -> bool {
    let len = text.chars().count();
    if !(MIN_DESCRIPTION_LEN..=MAX_DESCRIPTION_LEN).contains(&len) {
        return false;
    }

    if contains_ui_text(text) {
        return false;
    }

    let lower = text.to_lowercase();
    STORY_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
}

/// Whether `text` carries any player or site chrome phrase or word.
fn contains_ui_text(text: &str) -> bool {
    let lower = text.to_lowercase();
    UI_PHRASES.iter().any(|phrase| lower.contains(phrase))
        || lower
            .split(|c: char| !c.is_alphanumeric())
            .any(|word| UI_WORDS.contains(&word))
}

fn boilerplate_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)you can also use the keyboard shortcuts.*",
            r"(?i)keyboard shortcuts to control.*",
            r"(?i)control the player.*",
            r"(?i)one way or another, keep comments.*",
            r"(?i)comments related to the anime.*",
            r"(?i)about 123animes in general.*",
            r"(?i)\[written by.*?\]",
            r"(?i)\(written by.*?\)",
            r"(?i)\b(?:show\s+)?(?:more|less)\s*$",
        ]
        .iter()
        .map(|pattern| Regex::new(pattern).expect("Invalid regex pattern defined in code"))
        .collect()
    })
}

/// Strips trailing boilerplate; `None` when too little text survives.
#[must_use]
pub fn clean_description(text: &str) -> Option<String> {
    let mut cleaned = collapse_whitespace(text);
    for pattern in boilerplate_patterns() {
        cleaned = pattern.replace_all(&cleaned, "").trim().to_string();
    }
    (cleaned.chars().count() >= MIN_DESCRIPTION_LEN).then_some(cleaned)
}

/// Caps `text` at the truncation length, marking the cut with an ellipsis.
#[must_use]
pub fn truncate_description(text: String) -> String {
    if text.chars().count() > DESCRIPTION_TRUNCATE_AT {
        let mut cut: String = text.chars().take(DESCRIPTION_TRUNCATE_AT).collect();
        cut.push_str("...");
        cut
    } else {
        text
    }
}

fn description_candidates<'a>(root: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    let long_and_short = ["div.long", "div.short"]
        .into_iter()
        .filter_map(move |css| first_in(root, css));

    let labeled = DESCRIPTION_SELECTORS
        .iter()
        .chain(TOOLTIP_SELECTORS)
        .flat_map(move |css| select(root, css));

    let content_areas = select(root, CONTENT_AREAS)
        .into_iter()
        .flat_map(|area| select(area, "p, div"))
        .filter(|el| !within_class(*el, CONTROL_REGIONS));

    let leaf_divs = select(root, "div").into_iter().filter(|div| {
        element_children_count(*div) <= 2
            && text_of(*div).chars().count() >= MIN_LEAF_DIV_LEN
            && !within_class(*div, CONTROL_REGIONS)
    });

    long_and_short
        .chain(labeled)
        .chain(content_areas)
        .chain(leaf_divs)
}

fn keyword_block(root: ElementRef<'_>) -> Option<String> {
    KEYWORD_SELECTORS
        .iter()
        .flat_map(|css| select(root, css))
        .map(text_of)
        .find(|text| text.starts_with("Keywords:"))
        .or_else(|| {
            static KEYWORDS: OnceLock<Regex> = OnceLock::new();
            let re = KEYWORDS.get_or_init(|| {
                Regex::new(r"(?i)Keywords:[^\n]+").expect("Invalid regex pattern defined in code")
            });
            let body = root.text().collect::<String>();
            re.find(&body).map(|m| collapse_whitespace(m.as_str()))
        })
}

fn extract_description(root: ElementRef<'_>) -> Option<String> {
    let accepted = description_candidates(root)
        .map(text_of)
        .find(|text| is_valid_description(text));

    let Some(accepted) = accepted else {
        debug!("No valid description candidate");
        return None;
    };

    let mut description = clean_description(&accepted)?;
    if let Some(keywords) = keyword_block(root)
        && !description.contains(&keywords)
        && !contains_ui_text(&keywords)
    {
        description.push_str("\n\n");
        description.push_str(&keywords);
    }

    Some(truncate_description(description))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SYNOPSIS: &str = "Kimiko is a young detective who joins a special unit that reads \
        the memories of suspects. Together with her new partner she uncovers a secret that \
        ties their past together.";

    #[test]
    fn test_description_validity() {
        assert!(is_valid_description(SYNOPSIS));
        assert!(is_valid_description(
            "An endless war of terror leaves the young hero with nothing but his friends."
        ));
        assert!(!is_valid_description("Too short to be a story."));
        assert!(!is_valid_description(
            "You can also use the keyboard shortcuts to control the player while you watch the story."
        ));
        assert!(!is_valid_description(
            "Choose another server if this one is slow, the story will continue right there."
        ));
        assert!(!is_valid_description(
            "Lorem ipsum dolor sit amet, consectetur adipiscing elit, sed do eiusmod tempor."
        ));
        assert!(!is_valid_description(&"story ".repeat(300)));
    }

    #[test]
    fn test_clean_and_truncate() {
        let cleaned = clean_description(&format!("{SYNOPSIS} [Written by MAL Rewrite]")).unwrap();
        assert_eq!(cleaned, SYNOPSIS.split_whitespace().collect::<Vec<_>>().join(" "));

        assert_eq!(clean_description("A short story. Show more"), None);

        let long = "a".repeat(1300);
        let truncated = truncate_description(long);
        assert_eq!(truncated.chars().count(), DESCRIPTION_TRUNCATE_AT + 3);
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn test_parse_metadata_from_definition_list() {
        let html = format!(
            r#"<html><body>
            <dl>
                <dt>Type:</dt><dd><a href="/type/tv">TV Series</a></dd>
                <dt>Genre:</dt><dd>
                    <a href="/genere/action">Action</a>, <a href="/genere/drama">Drama</a>
                    <a href="/genere/all">View all</a>
                </dd>
                <dt>Country:</dt><dd><a href="/country/jp">Japanese</a></dd>
                <dt>Status:</dt><dd>Completed</dd>
                <dt>Released:</dt><dd>2023</dd>
            </dl>
            <div class="long">{SYNOPSIS}</div>
            <div class="controls"><p>Keyboard shortcuts to control the player</p></div>
            </body></html>"#
        );

        let metadata = parse_metadata(&html, "Your Forma");
        assert_eq!(metadata.kind.as_deref(), Some("TV Series"));
        assert_eq!(metadata.genres, vec!["Action", "Drama"]);
        assert_eq!(metadata.country.as_deref(), Some("Japan"));
        assert_eq!(metadata.status.as_deref(), Some("Completed"));
        assert_eq!(metadata.released.as_deref(), Some("2023"));
        assert!(metadata.description.unwrap().starts_with("Kimiko is a young detective"));
    }

    #[test]
    fn test_parse_metadata_from_meta_rows_and_fallbacks() {
        let html = format!(
            r#"<html><body>
            <div class="meta">
                <div class="col-sm-12">Status: <a href="/status/ongoing">Ongoing</a></div>
                <div class="col-sm-12">Genre: <a href="/genere/comedy">Comedy</a></div>
            </div>
            <div class="video-player"><div><p>{SYNOPSIS}</p></div></div>
            <div class="info"><p>{SYNOPSIS}</p></div>
            <div class="keywords">Keywords: detective, memories</div>
            <p>Produced in China.</p>
            </body></html>"#
        );

        let metadata = parse_metadata(&html, "Your Forma Movie");
        assert_eq!(metadata.kind.as_deref(), Some("Movie"));
        assert_eq!(metadata.status.as_deref(), Some("Ongoing"));
        assert_eq!(metadata.genres, vec!["Comedy"]);
        assert_eq!(metadata.country.as_deref(), Some("China"));
        let description = metadata.description.unwrap();
        assert!(description.ends_with("Keywords: detective, memories"));
    }

    #[test]
    fn test_keyword_block_with_site_chrome_is_dropped() {
        let html = format!(
            r#"<html><body>
            <div class="long">{SYNOPSIS}</div>
            <div class="keywords">Keywords: your forma streaming, watch online free, show more</div>
            </body></html>"#
        );

        let description = parse_metadata(&html, "Your Forma").description.unwrap();
        assert!(description.starts_with("Kimiko is a young detective"));
        assert!(!description.contains("Keywords:"));
        assert!(!description.to_lowercase().contains("watch online"));
        assert!(!description.contains("streaming"));
    }

    #[test]
    fn test_missing_description_stays_none() {
        let metadata = parse_metadata("<html><body><h1>Nothing</h1></body></html>", "Nothing");
        assert_eq!(metadata.description, None);
        assert_eq!(metadata.kind.as_deref(), Some("TV Series"));
        assert!(metadata.genres.is_empty());
    }

    #[test]
    fn test_kind_from_title() {
        assert_eq!(kind_from_title("Jujutsu Kaisen 0 Movie"), "Movie");
        assert_eq!(kind_from_title("Hellsing OVA"), "OVA");
        assert_eq!(kind_from_title("Frieren"), "TV Series");
    }
}
