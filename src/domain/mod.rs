//! Domain types for scraped anime records with strong typing.
//!
//! Everything here is a transient scrape result until it reaches the
//! [`Store`](crate::db::Store). The types carry the normalization rules that
//! must hold no matter which extractor produced them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Audio track label shown on catalog tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AudioType {
    #[serde(rename = "SUB")]
    Sub,
    #[serde(rename = "DUB")]
    Dub,
    #[serde(rename = "BOTH")]
    Both,
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
}

impl AudioType {
    /// Parses a status badge such as `"SUB"`, `"Dub"` or `"Sub & Dub"`.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        let lower = label.trim().to_lowercase();
        let sub = lower.contains("sub");
        let dub = lower.contains("dub");
        match (sub, dub) {
            (true, true) => Self::Both,
            (true, false) => Self::Sub,
            (false, true) => Self::Dub,
            (false, false) => Self::Unknown,
        }
    }

    /// Fallback when a tile has no badge: dubbed releases carry "dub" in the title.
    #[must_use]
    pub fn infer_from_title(title: &str) -> Self {
        if title.to_lowercase().contains("dub") {
            Self::Dub
        } else {
            Self::Sub
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sub => "SUB",
            Self::Dub => "DUB",
            Self::Both => "BOTH",
            Self::Unknown => "unknown",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "SUB" => Self::Sub,
            "DUB" => Self::Dub,
            "BOTH" => Self::Both,
            _ => Self::Unknown,
        }
    }
}

/// Which discovery strategy produced an [`EpisodeRef`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EpisodeStrategy {
    Range,
    Container,
    Direct,
    Fallback,
}

impl EpisodeStrategy {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Range => "range",
            Self::Container => "container",
            Self::Direct => "direct",
            Self::Fallback => "fallback",
        }
    }
}

impl fmt::Display for EpisodeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collection an anime record was saved under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Trending,
    Weekly,
    Monthly,
    #[default]
    General,
}

impl Category {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Trending => "trending",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::General => "general",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "trending" => Self::Trending,
            "weekly" => Self::Weekly,
            "monthly" => Self::Monthly,
            _ => Self::General,
        }
    }
}

/// Numeric value of an episode label, used for ordering and deduplication.
///
/// Episodes can be fractional (e.g. 8.5 for recap specials), hence f32.
///
/// # Examples
///
/// ```rust
/// use animescrape::domain::EpisodeNumber;
///
/// let ep = EpisodeNumber::parse_label("Episode 8.5").unwrap();
/// assert_eq!(ep.value(), 8.5);
/// assert_eq!(ep.to_string(), "8.5");
/// assert_eq!(EpisodeNumber::parse_label("EP 12").unwrap().to_string(), "12");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct EpisodeNumber(f32);

impl EpisodeNumber {
    #[must_use]
    pub const fn new(num: f32) -> Self {
        debug_assert!(num >= 0.0, "EpisodeNumber should be non-negative");
        Self(num)
    }

    #[must_use]
    pub const fn value(&self) -> f32 {
        self.0
    }

    /// Reads the first numeric token (`8`, `8.5`) out of free text.
    #[must_use]
    pub fn parse_label(text: &str) -> Option<Self> {
        let start = text.find(|c: char| c.is_ascii_digit())?;
        let rest = &text[start..];
        let mut end = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(rest.len());
        let mut token = &rest[..end];
        // "12." or "1.2.3" keep only the leading well-formed number
        if let Some((whole, frac)) = token.split_once('.') {
            let frac_digits = frac.find('.').map_or(frac, |i| &frac[..i]);
            if frac_digits.is_empty() {
                token = whole;
            } else {
                end = whole.len() + 1 + frac_digits.len();
                token = &rest[..end];
            }
        }
        token.parse::<f32>().ok().map(Self::new)
    }

    /// Key for equality-based deduplication.
    #[must_use]
    pub const fn dedup_key(&self) -> u32 {
        self.0.to_bits()
    }

    #[must_use]
    pub fn is_within(&self, min: f32, max: f32) -> bool {
        (min..=max).contains(&self.0)
    }
}

impl fmt::Display for EpisodeNumber {
    #[allow(clippy::cast_possible_truncation)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.fract() == 0.0 {
            write!(f, "{}", self.0 as i64)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// A catalog tile: one anime on a listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimeSummary {
    /// 1-based position on the listing page.
    pub position: u32,
    pub title: String,
    /// Unique key of the anime.
    pub detail_url: String,
    pub poster_image: Option<String>,
    pub episodes_label: Option<String>,
    pub audio_type: AudioType,
}

/// Labeled fields read from a detail page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimeMetadata {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub genres: Vec<String>,
    pub country: Option<String>,
    pub status: Option<String>,
    pub released: Option<String>,
    pub description: Option<String>,
}

/// Everything the detail page yields for one anime, minus its episodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimeDetail {
    pub title: String,
    pub detail_url: String,
    pub poster_image: Option<String>,
    #[serde(flatten)]
    pub metadata: AnimeMetadata,
}

impl AnimeDetail {
    /// Record for a page that could not be loaded: title from the slug, no fields.
    #[must_use]
    pub fn partial(detail_url: &str) -> Self {
        Self {
            title: slug_to_title(last_path_segment(detail_url)),
            detail_url: detail_url.to_string(),
            poster_image: None,
            metadata: AnimeMetadata::default(),
        }
    }
}

/// A stored anime: catalog summary plus whatever metadata was recovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimeRecord {
    #[serde(flatten)]
    pub summary: AnimeSummary,
    #[serde(flatten)]
    pub metadata: AnimeMetadata,
    pub source: String,
    pub category: Category,
    pub rank: Option<u32>,
    /// Title as printed on a ranking chart, when it differs in source from `summary.title`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_title: Option<String>,
}

impl AnimeRecord {
    #[must_use]
    pub fn new(summary: AnimeSummary, metadata: AnimeMetadata, source: &str) -> Self {
        Self {
            summary,
            metadata,
            source: source.to_string(),
            category: Category::General,
            rank: None,
            chart_title: None,
        }
    }
}

/// Placeholder persisted when metadata enrichment fails for a catalog entry.
pub const MISSING_DESCRIPTION: &str = "No description available for this anime.";

/// One discovered episode link on a detail page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeRef {
    pub anime_title: String,
    /// Label as shown on the page, e.g. `"8.5"`.
    pub episode_number: String,
    pub episode_url: String,
    pub range_id: Option<String>,
    pub strategy: EpisodeStrategy,
}

/// A resolved player iframe for one episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamingLink {
    pub title: String,
    pub episode_number: String,
    /// Unique key; re-resolution overwrites the stored link.
    pub episode_url: String,
    pub streaming_link: String,
    pub poster_image: Option<String>,
    pub range_id: Option<String>,
    pub strategy: Option<String>,
    pub source: String,
}

impl StreamingLink {
    #[must_use]
    pub fn from_episode(
        episode: &EpisodeRef,
        streaming_link: String,
        poster_image: Option<String>,
        source: &str,
    ) -> Self {
        Self {
            title: episode.anime_title.clone(),
            episode_number: episode.episode_number.clone(),
            episode_url: episode.episode_url.clone(),
            streaming_link,
            poster_image,
            range_id: episode.range_id.clone(),
            strategy: Some(episode.strategy.as_str().to_string()),
            source: source.to_string(),
        }
    }
}

/// Canonicalizes a country label to `Japan`, `China` or `Korea`, else returns it trimmed.
///
/// # Examples
///
/// ```rust
/// use animescrape::domain::normalize_country;
///
/// assert_eq!(normalize_country("JAPANESE"), "Japan");
/// assert_eq!(normalize_country("South Korea"), "Korea");
/// assert_eq!(normalize_country("Philippines"), "Philippines");
/// ```
#[must_use]
pub fn normalize_country(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    let has_token = |token: &str| {
        lower
            .split(|c: char| !c.is_alphanumeric())
            .any(|word| word == token)
    };

    if lower.contains("japan") || has_token("jp") {
        "Japan".to_string()
    } else if lower.contains("china") || lower.contains("chinese") || has_token("cn") {
        "China".to_string()
    } else if lower.contains("korea") || has_token("kr") {
        "Korea".to_string()
    } else {
        raw.trim().to_string()
    }
}

/// Slug used to group streaming links by title: trimmed, lowercased, whitespace runs to `-`.
///
/// # Examples
///
/// ```rust
/// use animescrape::domain::title_slug;
///
/// assert_eq!(title_slug("  Your Forma  "), "your-forma");
/// assert_eq!(title_slug("Sentai  Daishikkaku"), "sentai-daishikkaku");
/// ```
#[must_use]
pub fn title_slug(title: &str) -> String {
    title
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

/// Turns `your-forma` into `Your Forma`.
#[must_use]
pub fn slug_to_title(slug: &str) -> String {
    slug.split('-')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect::<String>()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Last non-empty path segment of a URL or path, ignoring query and fragment.
#[must_use]
pub fn last_path_segment(url: &str) -> &str {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    without_query
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_type_labels() {
        assert_eq!(AudioType::from_label("SUB"), AudioType::Sub);
        assert_eq!(AudioType::from_label(" dub "), AudioType::Dub);
        assert_eq!(AudioType::from_label("Sub & Dub"), AudioType::Both);
        assert_eq!(AudioType::from_label("HD"), AudioType::Unknown);
        assert_eq!(AudioType::infer_from_title("One Piece (Dub)"), AudioType::Dub);
        assert_eq!(AudioType::infer_from_title("One Piece"), AudioType::Sub);
    }

    #[test]
    fn test_episode_number_parsing() {
        assert_eq!(EpisodeNumber::parse_label("8").unwrap().value(), 8.0);
        assert_eq!(EpisodeNumber::parse_label("Ep 8.5 ").unwrap().value(), 8.5);
        assert_eq!(EpisodeNumber::parse_label("12.").unwrap().value(), 12.0);
        assert_eq!(EpisodeNumber::parse_label("1.2.3").unwrap().value(), 1.2);
        assert!(EpisodeNumber::parse_label("Next").is_none());
        assert_eq!(EpisodeNumber::parse_label("Episode 0012").unwrap().to_string(), "12");
    }

    #[test]
    fn test_country_normalization() {
        assert_eq!(normalize_country("Japanese"), "Japan");
        assert_eq!(normalize_country("jApAnEsE animation"), "Japan");
        assert_eq!(normalize_country("JP"), "Japan");
        assert_eq!(normalize_country("Chinese"), "China");
        assert_eq!(normalize_country("KR"), "Korea");
        assert_eq!(normalize_country(" Thailand "), "Thailand");
        // "kr" inside a word is not a country code
        assert_eq!(normalize_country("Ukraine"), "Ukraine");
    }

    #[test]
    fn test_slugs() {
        assert_eq!(title_slug("One Piece Dub"), "one-piece-dub");
        assert_eq!(slug_to_title("sentai-daishikkaku-2nd-season"), "Sentai Daishikkaku 2nd Season");
        assert_eq!(
            last_path_segment("https://w1.123animes.ru/anime/your-forma/?ref=home"),
            "your-forma"
        );
        assert_eq!(
            AnimeDetail::partial("https://w1.123animes.ru/anime/your-forma").title,
            "Your Forma"
        );
    }
}
