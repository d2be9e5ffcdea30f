//! Domain service for scrape jobs.
//!
//! Each operation opens its own browser session, extracts, and writes every
//! result through to the [`Store`](crate::db::Store) as soon as it exists.

use crate::db::UpsertCounts;
use crate::domain::{AnimeDetail, AnimeRecord, StreamingLink};
use crate::scrape::ScrapeError;
use crate::scrape::trending::RankedList;
use serde::Serialize;
use thiserror::Error;

/// Errors specific to scrape operations.
#[derive(Debug, Error)]
pub enum ScrapeServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Scrape failed: {0}")]
    Scrape(String),
}

impl From<sea_orm::DbErr> for ScrapeServiceError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for ScrapeServiceError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<ScrapeError> for ScrapeServiceError {
    fn from(err: ScrapeError) -> Self {
        Self::Scrape(err.to_string())
    }
}

/// One scraped and saved catalog page.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogPageResult {
    pub page: u32,
    pub anime: Vec<AnimeRecord>,
    pub saved: UpsertCounts,
    /// Entries whose detail page could not be read.
    pub metadata_failures: usize,
}

/// Totals for a run over several catalog pages.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RangeReport {
    pub pages_processed: u32,
    pub pages_failed: u32,
    pub total_anime_found: u64,
    pub total_anime_saved: u64,
    /// Percentage of pages that yielded at least one entry.
    pub success_rate: f64,
}

impl RangeReport {
    pub(crate) fn absorb(&mut self, other: &Self) {
        self.pages_processed += other.pages_processed;
        self.pages_failed += other.pages_failed;
        self.total_anime_found += other.total_anime_found;
        self.total_anime_saved += other.total_anime_saved;
        self.recompute_rate();
    }

    pub(crate) fn recompute_rate(&mut self) {
        let total = self.pages_processed + self.pages_failed;
        self.success_rate = if total == 0 {
            0.0
        } else {
            (f64::from(self.pages_processed) * 10_000.0 / f64::from(total)).round() / 100.0
        };
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub batch_size: u32,
    pub batches: u32,
    pub totals: RangeReport,
}

/// An episode and the player it resolved to, if any.
#[derive(Debug, Clone, Serialize)]
pub struct EpisodeOutcome {
    pub episode_number: String,
    pub episode_url: String,
    pub streaming_link: Option<String>,
}

/// A detail page with every discovered episode run through the resolver.
#[derive(Debug, Clone, Serialize)]
pub struct AnimeEpisodes {
    pub detail: AnimeDetail,
    pub episodes: Vec<EpisodeOutcome>,
    pub resolved: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StoredDetailsReport {
    pub processed: u32,
    /// Anime whose detail page yielded no episodes.
    pub without_episodes: u32,
    pub episodes_found: u64,
    pub links_saved: u64,
}

/// Domain service trait for scrape jobs.
#[async_trait::async_trait]
pub trait ScrapeService: Send + Sync {
    /// Scrapes one catalog page, enriches each entry from its detail page
    /// and bulk-saves the result.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeServiceError::Validation`] for a page outside the catalog.
    /// Returns [`ScrapeServiceError::Scrape`] if the browser cannot be started.
    async fn scrape_catalog_page(&self, page: u32) -> Result<CatalogPageResult, ScrapeServiceError>;

    /// Scrapes `start..=end`, saving page by page.
    async fn scrape_page_range(&self, start: u32, end: u32) -> Result<RangeReport, ScrapeServiceError>;

    /// Covers the whole catalog in ranges of `batch_size`, pausing between them.
    async fn scrape_in_batches(&self, batch_size: u32) -> Result<BatchReport, ScrapeServiceError>;

    /// Reads a detail page and resolves every episode on it.
    ///
    /// Each resolved link is saved before the next episode finishes.
    async fn scrape_anime_details(&self, slug: &str) -> Result<AnimeEpisodes, ScrapeServiceError>;

    /// Resolves one episode without visiting the detail page.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeServiceError::NotFound`] when no player iframe is found.
    async fn scrape_episode(&self, slug: &str, episode: &str) -> Result<StreamingLink, ScrapeServiceError>;

    /// Runs [`Self::scrape_anime_details`] for `count` stored anime starting at `offset`.
    async fn scrape_stored_details(
        &self,
        offset: u64,
        count: u64,
    ) -> Result<StoredDetailsReport, ScrapeServiceError>;

    /// Reads a ranked chart, maps it onto the catalog and saves it in rank order.
    async fn scrape_ranked(&self, list: RankedList) -> Result<Vec<AnimeRecord>, ScrapeServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_report_rate() {
        let mut report = RangeReport {
            pages_processed: 2,
            pages_failed: 1,
            ..RangeReport::default()
        };
        report.recompute_rate();
        assert!((report.success_rate - 66.67).abs() < f64::EPSILON);

        let mut total = RangeReport::default();
        total.absorb(&report);
        total.absorb(&RangeReport {
            pages_processed: 1,
            ..RangeReport::default()
        });
        assert_eq!(total.pages_processed, 3);
        assert!((total.success_rate - 75.0).abs() < f64::EPSILON);
    }
}
