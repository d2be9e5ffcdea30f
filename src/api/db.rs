//! Read and delete endpoints over stored data. None of these start a browser.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::validation::{
    validate_limit, validate_listing, validate_ranked_list, validate_search_query,
};
use super::{
    ApiError, ApiResponse, AppState, Pagination, RankedListDto, RemovedDto, StoredLinksDto,
};
use crate::db::{AnimeStats, StreamingStats};
use crate::domain::{AnimeRecord, StreamingLink, title_slug};

const DEFAULT_SEARCH_LIMIT: u64 = 50;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RankedQuery {
    pub list: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TitleQuery {
    pub id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatsDto {
    pub anime: AnimeStats,
    pub streaming: StreamingStats,
}

/// `GET /api/db/anime-list?page&limit`
pub async fn anime_list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<AnimeRecord>>>, ApiError> {
    let (page, limit) = validate_listing(
        query.page.as_deref(),
        query.limit.as_deref(),
        20,
        "/api/db/anime-list?page=1&limit=20",
    )?;
    let (items, total) = state.store().list_anime(page, limit).await?;

    Ok(Json(ApiResponse::paginated(
        items,
        Pagination::new(page, limit, total),
    )))
}

/// `GET /api/db/search?q=`
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<ApiResponse<Vec<AnimeRecord>>>, ApiError> {
    let q = validate_search_query(query.q.as_deref())?;
    let limit = validate_limit(
        query.limit.as_deref(),
        DEFAULT_SEARCH_LIMIT,
        "/api/db/search?q=naruto&limit=50",
    )?;
    let results = state.store().search_anime(q, limit).await?;
    Ok(Json(ApiResponse::success(results)))
}

/// `GET /api/db/stats`
pub async fn stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<StatsDto>>, ApiError> {
    let anime = state.store().anime_stats().await?;
    let streaming = state.store().streaming_stats().await?;
    Ok(Json(ApiResponse::success(StatsDto { anime, streaming })))
}

/// `GET /api/db/streaming-links?page&limit`, newest first.
pub async fn streaming_links(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<StreamingLink>>>, ApiError> {
    let (page, limit) = validate_listing(
        query.page.as_deref(),
        query.limit.as_deref(),
        50,
        "/api/db/streaming-links?page=1&limit=50",
    )?;
    let (items, total) = state.store().list_streaming_links(page, limit).await?;

    Ok(Json(ApiResponse::paginated(
        items,
        Pagination::new(page, limit, total),
    )))
}

/// `GET /api/db/ranked?list=trending|weekly|monthly`, the last saved chart in rank order.
pub async fn ranked(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RankedQuery>,
) -> Result<Json<ApiResponse<RankedListDto>>, ApiError> {
    let list = validate_ranked_list(query.list.as_deref())?;
    let anime = state.store().ranked_anime(list.category()).await?;
    Ok(Json(ApiResponse::success(RankedListDto {
        list: list.as_str(),
        count: anime.len(),
        anime,
    })))
}

/// `GET /api/db/anime-details?id=<title or slug>`
pub async fn anime_details(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TitleQuery>,
) -> Result<Json<ApiResponse<StoredLinksDto>>, ApiError> {
    let title = query
        .id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            ApiError::invalid_request("Anime ID is required", "/api/db/anime-details?id=your-forma")
        })?;

    let episodes = state.store().streaming_links_for_title(title).await?;
    if episodes.is_empty() {
        return Err(ApiError::not_found("Streaming links for", title));
    }

    Ok(Json(ApiResponse::success(StoredLinksDto {
        title: episodes[0].title.clone(),
        total_episodes: episodes.len(),
        episodes,
    })))
}

/// `DELETE /api/remove-anime?id=<title>`
pub async fn remove_anime(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TitleQuery>,
) -> Result<Json<ApiResponse<RemovedDto>>, ApiError> {
    let title = query
        .id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            ApiError::invalid_request("Anime title is required", "/api/remove-anime?id=Your Forma")
        })?;

    let deleted_count = state.store().remove_streaming_links(title).await?;
    if deleted_count == 0 {
        return Err(ApiError::not_found("Streaming links for", title));
    }

    Ok(Json(ApiResponse::success(RemovedDto {
        title: title.to_string(),
        slug: title_slug(title),
        deleted_count,
    })))
}
