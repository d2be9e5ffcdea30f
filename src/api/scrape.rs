//! Endpoints that drive the browser.
//!
//! Single-item endpoints scrape synchronously. Bulk endpoints validate their
//! input, answer 202 and keep working on a spawned task.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use super::validation::{
    validate_batch_size, validate_episode, validate_offset_range, validate_page,
    validate_page_range, validate_slug,
};
use super::{
    AnimeDetailsDto, ApiError, ApiResponse, AppState, CatalogPageDto, EpisodeStreamDto,
    JobAccepted, PageRange, RankedListDto, ScrapingStats,
};
use crate::scrape::trending::RankedList;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EpisodeQuery {
    pub id: Option<String>,
    pub ep: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BatchQuery {
    pub batch_size: Option<String>,
}

type Accepted = (StatusCode, Json<ApiResponse<JobAccepted>>);

fn accepted(job: JobAccepted) -> Accepted {
    (StatusCode::ACCEPTED, Json(ApiResponse::success(job)))
}

/// Rough wall-clock range for `pages` catalog pages.
fn estimate(pages: u32) -> String {
    let low = pages.saturating_mul(5).div_ceil(60).max(1);
    let high = pages.saturating_mul(10).div_ceil(60).max(2);
    format!("{low}-{high} minutes")
}

/// `GET /api/anime-list?page=N`
pub async fn anime_list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<CatalogPageDto>>, ApiError> {
    let max_page = state.config().read().await.scraper.max_catalog_page;
    let page = validate_page(query.page.as_deref(), max_page)?;

    let started = Instant::now();
    let result = state.scrape_service().scrape_catalog_page(page).await?;

    let scraping_stats = ScrapingStats {
        total_found: result.anime.len(),
        inserted: result.saved.inserted,
        modified: result.saved.modified,
        metadata_failures: result.metadata_failures,
        extraction_time_seconds: started.elapsed().as_secs_f64(),
    };

    Ok(Json(ApiResponse::success(CatalogPageDto {
        page,
        anime: result.anime,
        scraping_stats,
    })))
}

/// `GET /api/anime-details?id=<slug>`
pub async fn anime_details(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IdQuery>,
) -> Result<Json<ApiResponse<AnimeDetailsDto>>, ApiError> {
    let slug = validate_slug(query.id.as_deref(), "/api/anime-details?id=your-forma")?;

    let started = Instant::now();
    let result = state.scrape_service().scrape_anime_details(slug).await?;

    Ok(Json(ApiResponse::success(AnimeDetailsDto {
        anime_id: slug.to_string(),
        title: result.detail.title,
        poster_image: result.detail.poster_image,
        total_episodes: result.episodes.len(),
        resolved_episodes: result.resolved,
        episodes: result.episodes,
        extraction_time_seconds: started.elapsed().as_secs_f64(),
    })))
}

/// `GET /api/episode-stream?id=<slug>&ep=<n>`
pub async fn episode_stream(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EpisodeQuery>,
) -> Result<Json<ApiResponse<EpisodeStreamDto>>, ApiError> {
    let slug = validate_slug(
        query.id.as_deref(),
        "/api/episode-stream?id=sentai-daishikkaku-2nd-season-dub&ep=1",
    )?;
    let episode = validate_episode(query.ep.as_deref())?;

    let started = Instant::now();
    let link = state.scrape_service().scrape_episode(slug, &episode).await?;

    Ok(Json(ApiResponse::success(EpisodeStreamDto {
        anime_id: slug.to_string(),
        episode,
        link,
        extraction_time_seconds: started.elapsed().as_secs_f64(),
    })))
}

/// `GET /api/scrape-pages?start=A&end=B`
pub async fn scrape_pages(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RangeQuery>,
) -> Result<Accepted, ApiError> {
    let (max_page, max_span) = {
        let config = state.config().read().await;
        (
            config.scraper.max_catalog_page,
            config.scraper.max_pages_per_request,
        )
    };
    let (start, end) = validate_page_range(
        query.start.as_deref(),
        query.end.as_deref(),
        max_page,
        max_span,
    )?;
    let total_pages = end - start + 1;

    let service = Arc::clone(state.scrape_service());
    tokio::spawn(async move {
        let started = Instant::now();
        match service.scrape_page_range(start, end).await {
            Ok(report) => info!(
                start,
                end,
                pages_processed = report.pages_processed,
                pages_failed = report.pages_failed,
                saved = report.total_anime_saved,
                success_rate = report.success_rate,
                minutes = started.elapsed().as_secs_f64() / 60.0,
                "Page range scrape completed"
            ),
            Err(e) => error!(start, end, error = %e, "Page range scrape failed"),
        }
    });

    let mut job = JobAccepted::new(
        format!("Started scraping pages {start} to {end} in the background"),
        estimate(total_pages),
    );
    job.page_range = Some(PageRange {
        start,
        end,
        total_pages,
    });
    Ok(accepted(job))
}

/// `GET /api/scrape-all-pages`
pub async fn scrape_all_pages(State(state): State<Arc<AppState>>) -> Accepted {
    let (max_page, batch_size) = {
        let config = state.config().read().await;
        (
            config.scraper.max_catalog_page,
            config.scraper.max_pages_per_request,
        )
    };

    spawn_batches(&state, batch_size);

    let mut job = JobAccepted::new(
        format!("Started scraping all {max_page} pages in the background"),
        estimate(max_page),
    );
    job.batch_size = Some(batch_size);
    job.total_batches = Some(max_page.div_ceil(batch_size.max(1)));
    accepted(job)
}

/// `GET /api/scrape-in-batches?batch_size=N`
pub async fn scrape_in_batches(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BatchQuery>,
) -> Result<Accepted, ApiError> {
    let batch_size = validate_batch_size(query.batch_size.as_deref())?;
    let max_page = state.config().read().await.scraper.max_catalog_page;

    spawn_batches(&state, batch_size);

    let mut job = JobAccepted::new(
        format!("Started scraping {max_page} pages in batches of {batch_size}"),
        estimate(max_page),
    );
    job.batch_size = Some(batch_size);
    job.total_batches = Some(max_page.div_ceil(batch_size));
    Ok(accepted(job))
}

fn spawn_batches(state: &AppState, batch_size: u32) {
    let service = Arc::clone(state.scrape_service());
    tokio::spawn(async move {
        let started = Instant::now();
        match service.scrape_in_batches(batch_size).await {
            Ok(report) => info!(
                batches = report.batches,
                pages_processed = report.totals.pages_processed,
                pages_failed = report.totals.pages_failed,
                saved = report.totals.total_anime_saved,
                minutes = started.elapsed().as_secs_f64() / 60.0,
                "Batch scrape completed"
            ),
            Err(e) => error!(batch_size, error = %e, "Batch scrape failed"),
        }
    });
}

/// `GET /api/streaming-links?start=A&end=B`, over stored anime by position.
pub async fn streaming_links(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RangeQuery>,
) -> Result<Accepted, ApiError> {
    let (offset, count) = validate_offset_range(query.start.as_deref(), query.end.as_deref())?;

    let service = Arc::clone(state.scrape_service());
    tokio::spawn(async move {
        match service.scrape_stored_details(offset, count).await {
            Ok(report) => info!(
                processed = report.processed,
                without_episodes = report.without_episodes,
                episodes_found = report.episodes_found,
                links_saved = report.links_saved,
                "Stored anime detail scrape completed"
            ),
            Err(e) => error!(offset, count, error = %e, "Stored anime detail scrape failed"),
        }
    });

    let pages = u32::try_from(count).unwrap_or(u32::MAX);
    Ok(accepted(JobAccepted::new(
        format!(
            "Started scraping streaming links for stored anime {offset} to {}",
            offset + (count - 1)
        ),
        estimate(pages.saturating_mul(6)),
    )))
}

async fn ranked(
    state: &AppState,
    list: RankedList,
) -> Result<Json<ApiResponse<RankedListDto>>, ApiError> {
    let anime = state.scrape_service().scrape_ranked(list).await?;
    Ok(Json(ApiResponse::success(RankedListDto {
        list: list.as_str(),
        count: anime.len(),
        anime,
    })))
}

/// `GET /api/hianime-top10`
pub async fn trending_top10(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<RankedListDto>>, ApiError> {
    ranked(&state, RankedList::Trending).await
}

/// `GET /api/hianime-weekly-top10`
pub async fn weekly_top10(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<RankedListDto>>, ApiError> {
    ranked(&state, RankedList::Weekly).await
}

/// `GET /api/hianime-monthly-top10`
pub async fn monthly_top10(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<RankedListDto>>, ApiError> {
    ranked(&state, RankedList::Monthly).await
}
