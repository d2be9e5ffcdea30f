//! Lenient title matching across two independent catalogs.

use regex::Regex;
use std::sync::OnceLock;

/// Anything that carries a title the matcher can compare.
pub trait Titled {
    fn title(&self) -> &str;
}

impl Titled for crate::domain::AnimeSummary {
    fn title(&self) -> &str {
        &self.title
    }
}

impl Titled for String {
    fn title(&self) -> &str {
        self
    }
}

/// A first word shorter than this never anchors a prefix match.
const MIN_PREFIX_WORD_LEN: usize = 4;
/// Keywords shorter than this are ignored in the overlap tier.
const MIN_KEYWORD_LEN: usize = 3;

fn non_word() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\s]").expect("Invalid regex pattern defined in code"))
}

/// Lowercases, drops punctuation and collapses whitespace.
#[must_use]
pub fn normalize_title(title: &str) -> String {
    let lower = title.to_lowercase();
    non_word()
        .replace_all(&lower, "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Finds the candidate matching `query`, trying tiers in order:
///
/// 1. exact equality after normalization
/// 2. either title contains the other
/// 3. candidate starts with the query's first word, if that word has 4+ characters
/// 4. candidate contains any query word of 3+ characters
///
/// Within a tier the earliest candidate wins. There is no scoring; callers
/// pick their own fallback on `None`.
#[must_use]
pub fn find_match<'a, T: Titled>(query: &str, candidates: &'a [T]) -> Option<&'a T> {
    let query = normalize_title(query);
    if query.is_empty() {
        return None;
    }

    let normalized: Vec<String> = candidates
        .iter()
        .map(|candidate| normalize_title(candidate.title()))
        .collect();
    let pick = |predicate: &dyn Fn(&str) -> bool| {
        normalized
            .iter()
            .position(|title| !title.is_empty() && predicate(title))
            .and_then(|index| candidates.get(index))
    };

    let exact = |title: &str| title == query;
    let substring = |title: &str| title.contains(query.as_str()) || query.contains(title);

    let first_word = query.split(' ').next().unwrap_or_default();
    let prefix = |title: &str| {
        first_word.chars().count() >= MIN_PREFIX_WORD_LEN && title.starts_with(first_word)
    };

    let keywords: Vec<&str> = query
        .split(' ')
        .filter(|word| word.chars().count() >= MIN_KEYWORD_LEN)
        .collect();
    let overlap = |title: &str| keywords.iter().any(|keyword| title.contains(keyword));

    pick(&exact)
        .or_else(|| pick(&substring))
        .or_else(|| pick(&prefix))
        .or_else(|| pick(&overlap))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn titles(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("  Re:ZERO -Starting  Life-  "), "rezero starting life");
        assert_eq!(normalize_title("Naruto: Shippuden!"), "naruto shippuden");
    }

    #[test]
    fn test_exact_beats_earlier_substring() {
        let catalog = titles(&["Naruto Shippuden Movie", "Naruto", "Naruto Shippuden"]);
        let found = find_match("Naruto Shippuden", &catalog).unwrap();
        assert_eq!(found, "Naruto Shippuden");
    }

    #[test]
    fn test_substring_tier() {
        let catalog = titles(&["One Piece Dub"]);
        assert_eq!(find_match("One Piece", &catalog).unwrap(), "One Piece Dub");

        let catalog = titles(&["Frieren"]);
        assert_eq!(
            find_match("Frieren: Beyond Journey's End", &catalog).unwrap(),
            "Frieren"
        );
    }

    #[test]
    fn test_prefix_tier_requires_long_first_word() {
        let catalog = titles(&["Dandadan 2nd Season"]);
        assert_eq!(find_match("Dandadan Season 2", &catalog).unwrap(), "Dandadan 2nd Season");

        let catalog = titles(&["The Apothecary Diaries"]);
        assert_eq!(
            find_match("The Eminence in Shadow", &catalog).map(String::as_str),
            Some("The Apothecary Diaries"),
            "falls through to keyword overlap on 'the'"
        );
    }

    #[test]
    fn test_keyword_tier_and_miss() {
        let catalog = titles(&["Kaiju No 8", "Solo Leveling Season 2"]);
        assert_eq!(
            find_match("Ore dake Level Up na Ken (Solo Leveling)", &catalog).unwrap(),
            "Solo Leveling Season 2"
        );
        assert!(find_match("Bocchi", &catalog).is_none());
        assert!(find_match("!!!", &catalog).is_none());
    }
}
