use serde::Serialize;

use crate::domain::{AnimeRecord, StreamingLink};
use crate::services::EpisodeOutcome;

/// Envelope for every JSON body the API returns.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    pub timestamp: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            example: None,
            pagination: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn paginated(data: T, pagination: Pagination) -> Self {
        Self {
            pagination: Some(pagination),
            ..Self::success(data)
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            example: None,
            pagination: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    #[must_use]
    pub fn with_example(mut self, example: Option<String>) -> Self {
        self.example = example;
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Pagination {
    pub current_page: u64,
    pub total_pages: u64,
    pub total_items: u64,
    pub items_per_page: u64,
}

impl Pagination {
    #[must_use]
    pub const fn new(current_page: u64, items_per_page: u64, total_items: u64) -> Self {
        let per_page = if items_per_page == 0 { 1 } else { items_per_page };
        Self {
            current_page,
            total_pages: total_items.div_ceil(per_page),
            total_items,
            items_per_page: per_page,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ScrapingStats {
    pub total_found: usize,
    pub inserted: u64,
    pub modified: u64,
    pub metadata_failures: usize,
    pub extraction_time_seconds: f64,
}

#[derive(Debug, Serialize)]
pub struct CatalogPageDto {
    pub page: u32,
    pub anime: Vec<AnimeRecord>,
    pub scraping_stats: ScrapingStats,
}

#[derive(Debug, Serialize)]
pub struct AnimeDetailsDto {
    pub anime_id: String,
    pub title: String,
    pub poster_image: Option<String>,
    pub episodes: Vec<EpisodeOutcome>,
    pub total_episodes: usize,
    pub resolved_episodes: usize,
    pub extraction_time_seconds: f64,
}

#[derive(Debug, Serialize)]
pub struct EpisodeStreamDto {
    pub anime_id: String,
    pub episode: String,
    pub link: StreamingLink,
    pub extraction_time_seconds: f64,
}

/// Body of a 202 response for work that continues in the background.
#[derive(Debug, Serialize)]
pub struct JobAccepted {
    pub message: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_range: Option<PageRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_batches: Option<u32>,
    pub estimated_time: String,
    pub progress_check: &'static str,
}

impl JobAccepted {
    #[must_use]
    pub fn new(message: String, estimated_time: String) -> Self {
        Self {
            message,
            status: "processing",
            page_range: None,
            batch_size: None,
            total_batches: None,
            estimated_time,
            progress_check: "Check server logs or /api/db/stats for progress",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
    pub total_pages: u32,
}

#[derive(Debug, Serialize)]
pub struct RankedListDto {
    pub list: &'static str,
    pub count: usize,
    pub anime: Vec<AnimeRecord>,
}

#[derive(Debug, Serialize)]
pub struct StoredLinksDto {
    pub title: String,
    pub total_episodes: usize,
    pub episodes: Vec<StreamingLink>,
}

#[derive(Debug, Serialize)]
pub struct RemovedDto {
    pub title: String,
    pub slug: String,
    pub deleted_count: u64,
}
