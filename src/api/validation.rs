use regex::Regex;
use std::sync::OnceLock;

use super::ApiError;
use crate::domain::EpisodeNumber;
use crate::scrape::trending::RankedList;

pub const MAX_BATCH_SIZE: u32 = 100;
pub const DEFAULT_BATCH_SIZE: u32 = 50;

fn slug_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9-]+$").expect("Invalid regex pattern defined in code"))
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// An anime slug such as `your-forma`.
pub fn validate_slug<'a>(id: Option<&'a str>, example: &str) -> Result<&'a str, ApiError> {
    let Some(id) = present(id) else {
        return Err(ApiError::invalid_request("Anime ID is required", example));
    };
    if !slug_pattern().is_match(id) {
        return Err(ApiError::invalid_request(
            "Invalid anime ID format. Use lowercase letters, numbers, and hyphens only.",
            example,
        ));
    }
    Ok(id)
}

/// An episode number of at least 1, normalized (`"01"` becomes `"1"`).
pub fn validate_episode(ep: Option<&str>) -> Result<String, ApiError> {
    const EXAMPLE: &str = "/api/episode-stream?id=sentai-daishikkaku-2nd-season-dub&ep=1";

    let Some(ep) = present(ep) else {
        return Err(ApiError::invalid_request(
            "Both id and ep parameters are required",
            EXAMPLE,
        ));
    };
    match ep.parse::<f32>() {
        Ok(value) if value.is_finite() && value >= 1.0 => {
            Ok(EpisodeNumber::new(value).to_string())
        }
        _ => Err(ApiError::invalid_request(
            "Episode number must be a positive number",
            EXAMPLE,
        )),
    }
}

/// A catalog page, defaulting to 1 when absent.
pub fn validate_page(page: Option<&str>, max_page: u32) -> Result<u32, ApiError> {
    let Some(raw) = present(page) else {
        return Ok(1);
    };
    match raw.parse::<u32>() {
        Ok(page) if (1..=max_page).contains(&page) => Ok(page),
        _ => Err(ApiError::invalid_request(
            format!("Page must be between 1 and {max_page}"),
            "/api/anime-list?page=1",
        )),
    }
}

/// `start..=end` for a bulk catalog scrape.
pub fn validate_page_range(
    start: Option<&str>,
    end: Option<&str>,
    max_page: u32,
    max_span: u32,
) -> Result<(u32, u32), ApiError> {
    const EXAMPLE: &str = "/api/scrape-pages?start=1&end=100";

    let (Some(start), Some(end)) = (present(start), present(end)) else {
        return Err(ApiError::invalid_request(
            "Both start and end parameters are required",
            EXAMPLE,
        ));
    };

    let (Ok(start), Ok(end)) = (start.parse::<i64>(), end.parse::<i64>()) else {
        return Err(ApiError::invalid_request(
            "Start and end pages must be positive integers",
            EXAMPLE,
        ));
    };
    if start < 1 || end < 1 {
        return Err(ApiError::invalid_request(
            "Start and end pages must be positive integers",
            EXAMPLE,
        ));
    }
    if start > end {
        return Err(ApiError::invalid_request(
            "Start page must be less than or equal to end page",
            EXAMPLE,
        ));
    }
    if end > i64::from(max_page) {
        return Err(ApiError::invalid_request(
            format!("End page cannot exceed {max_page}"),
            format!("/api/scrape-pages?start=1&end={max_page}"),
        ));
    }
    if end - start + 1 > i64::from(max_span) {
        return Err(ApiError::invalid_request(
            format!(
                "Cannot scrape more than {max_span} pages at once. Use batch scraping for larger ranges."
            ),
            format!("/api/scrape-in-batches?batch_size={DEFAULT_BATCH_SIZE}"),
        ));
    }

    // both are within 1..=max_page here
    Ok((
        u32::try_from(start).unwrap_or(1),
        u32::try_from(end).unwrap_or(max_page),
    ))
}

pub fn validate_batch_size(batch_size: Option<&str>) -> Result<u32, ApiError> {
    let Some(raw) = present(batch_size) else {
        return Ok(DEFAULT_BATCH_SIZE);
    };
    match raw.parse::<u32>() {
        Ok(size) if (1..=MAX_BATCH_SIZE).contains(&size) => Ok(size),
        _ => Err(ApiError::invalid_request(
            format!("Batch size must be between 1 and {MAX_BATCH_SIZE}"),
            format!("/api/scrape-in-batches?batch_size={DEFAULT_BATCH_SIZE}"),
        )),
    }
}

/// Offset and count of stored anime to run detail scraping over.
pub fn validate_offset_range(start: Option<&str>, end: Option<&str>) -> Result<(u64, u64), ApiError> {
    const EXAMPLE: &str = "/api/streaming-links?start=0&end=9";

    let (Some(start), Some(end)) = (present(start), present(end)) else {
        return Err(ApiError::invalid_request(
            "Both start and end parameters are required",
            EXAMPLE,
        ));
    };
    let range = match (start.parse::<u64>(), end.parse::<u64>()) {
        (Ok(start), Ok(end)) if start <= end => (end - start)
            .checked_add(1)
            .map(|count| (start, count)),
        _ => None,
    };
    range.ok_or_else(|| {
        ApiError::invalid_request(
            "start and end must be non-negative integers with start <= end",
            EXAMPLE,
        )
    })
}

pub fn validate_limit(limit: Option<&str>, default: u64, example: &str) -> Result<u64, ApiError> {
    const MAX_LIMIT: u64 = 1000;
    const MIN_LIMIT: u64 = 1;

    let Some(raw) = present(limit) else {
        return Ok(default);
    };
    match raw.parse::<u64>() {
        Ok(limit) if (MIN_LIMIT..=MAX_LIMIT).contains(&limit) => Ok(limit),
        _ => Err(ApiError::invalid_request(
            format!("Invalid limit: {raw}. Limit must be between {MIN_LIMIT} and {MAX_LIMIT}"),
            example,
        )),
    }
}

/// Page and limit of a stored-data listing; the page defaults to 1.
pub fn validate_listing(
    page: Option<&str>,
    limit: Option<&str>,
    default_limit: u64,
    example: &str,
) -> Result<(u64, u64), ApiError> {
    let page = match present(page) {
        None => 1,
        Some(raw) => match raw.parse::<u64>() {
            Ok(page) if page >= 1 => page,
            _ => {
                return Err(ApiError::invalid_request(
                    "Page must be a positive integer",
                    example,
                ));
            }
        },
    };
    Ok((page, validate_limit(limit, default_limit, example)?))
}

/// `trending`, `weekly` or `monthly`; defaults to trending.
pub fn validate_ranked_list(list: Option<&str>) -> Result<RankedList, ApiError> {
    let Some(raw) = present(list) else {
        return Ok(RankedList::Trending);
    };
    RankedList::ALL
        .into_iter()
        .find(|candidate| candidate.as_str().eq_ignore_ascii_case(raw))
        .ok_or_else(|| {
            ApiError::invalid_request(
                "List must be one of trending, weekly or monthly",
                "/api/db/ranked?list=weekly",
            )
        })
}

pub fn validate_search_query(query: Option<&str>) -> Result<&str, ApiError> {
    present(query)
        .ok_or_else(|| ApiError::invalid_request("Search query cannot be empty", "/api/db/search?q=naruto"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_slug() {
        let example = "/api/anime-details?id=your-forma";
        assert_eq!(validate_slug(Some("your-forma"), example).unwrap(), "your-forma");
        assert!(validate_slug(Some("Your Forma"), example).is_err());
        assert!(validate_slug(Some("../etc"), example).is_err());
        assert!(validate_slug(None, example).is_err());
        assert!(validate_slug(Some("  "), example).is_err());
    }

    #[test]
    fn test_validate_episode() {
        assert_eq!(validate_episode(Some("01")).unwrap(), "1");
        assert_eq!(validate_episode(Some("8.5")).unwrap(), "8.5");
        assert!(validate_episode(Some("0")).is_err());
        assert!(validate_episode(Some("-3")).is_err());
        assert!(validate_episode(Some("abc")).is_err());
        assert!(validate_episode(None).is_err());
    }

    #[test]
    fn test_validate_page_range() {
        assert_eq!(validate_page_range(Some("1"), Some("100"), 501, 100).unwrap(), (1, 100));
        assert!(validate_page_range(None, Some("5"), 501, 100).is_err());
        assert!(validate_page_range(Some("0"), Some("5"), 501, 100).is_err());
        assert!(validate_page_range(Some("9"), Some("5"), 501, 100).is_err());
        assert!(validate_page_range(Some("450"), Some("502"), 501, 100).is_err());
        assert!(validate_page_range(Some("1"), Some("101"), 501, 100).is_err());
    }

    #[test]
    fn test_oversized_range_suggests_batches() {
        let Err(ApiError::ValidationError { example, .. }) =
            validate_page_range(Some("1"), Some("200"), 501, 100)
        else {
            panic!("expected a validation error");
        };
        assert_eq!(example.as_deref(), Some("/api/scrape-in-batches?batch_size=50"));
    }

    #[test]
    fn test_validate_batch_size_and_limit() {
        assert_eq!(validate_batch_size(None).unwrap(), 50);
        assert_eq!(validate_batch_size(Some("100")).unwrap(), 100);
        assert!(validate_batch_size(Some("0")).is_err());
        assert!(validate_batch_size(Some("101")).is_err());

        let example = "/api/db/anime-list?page=1&limit=20";
        assert_eq!(validate_limit(None, 20, example).unwrap(), 20);
        assert_eq!(validate_limit(Some("1000"), 20, example).unwrap(), 1000);
        assert!(validate_limit(Some("0"), 20, example).is_err());
        assert!(validate_limit(Some("1001"), 20, example).is_err());
        assert!(validate_limit(Some("ten"), 20, example).is_err());
    }

    #[test]
    fn test_validate_listing() {
        let example = "/api/db/anime-list?page=1&limit=20";
        assert_eq!(validate_listing(None, None, 20, example).unwrap(), (1, 20));
        assert_eq!(validate_listing(Some("3"), Some("5"), 20, example).unwrap(), (3, 5));

        let Err(ApiError::ValidationError { example: shown, .. }) =
            validate_listing(Some("abc"), None, 20, example)
        else {
            panic!("expected a validation error");
        };
        assert_eq!(shown.as_deref(), Some(example));
        assert!(validate_listing(Some("0"), None, 20, example).is_err());
    }

    #[test]
    fn test_validate_ranked_list() {
        assert_eq!(validate_ranked_list(None).unwrap(), RankedList::Trending);
        assert_eq!(validate_ranked_list(Some("Weekly")).unwrap(), RankedList::Weekly);
        assert_eq!(validate_ranked_list(Some("monthly")).unwrap(), RankedList::Monthly);
        assert!(validate_ranked_list(Some("yearly")).is_err());
    }

    #[test]
    fn test_validate_offset_range() {
        assert_eq!(validate_offset_range(Some("0"), Some("9")).unwrap(), (0, 10));
        assert!(validate_offset_range(Some("5"), Some("1")).is_err());
        assert!(validate_offset_range(Some("0"), None).is_err());
        assert!(validate_offset_range(Some("0"), Some("18446744073709551615")).is_err());
        assert_eq!(
            validate_offset_range(Some("1"), Some("18446744073709551615")).unwrap(),
            (1, u64::MAX)
        );
    }
}
