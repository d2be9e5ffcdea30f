//! Headless-browser implementation of the `ScrapeService` trait.

use crate::config::{Config, ScraperConfig, TrendingConfig};
use crate::db::Store;
use crate::domain::{
    AnimeDetail, AnimeMetadata, AnimeRecord, AnimeSummary, EpisodeRef, EpisodeStrategy,
    MISSING_DESCRIPTION, StreamingLink, slug_to_title,
};
use crate::scrape::catalog::extract_catalog;
use crate::scrape::detail::{DetailPage, extract_detail, extract_metadata};
use crate::scrape::resolver::{ResolverSettings, resolve_episode};
use crate::scrape::retry::retry;
use crate::scrape::trending::{RankedList, extract_ranked_titles, pair_with_catalog};
use crate::scrape::{
    BrowserPage, Pacing, PagePool, ResourceGate, RetryPolicy, ScrapeError, SessionLauncher,
    with_session,
};
use crate::services::scrape_service::{
    AnimeEpisodes, BatchReport, CatalogPageResult, EpisodeOutcome, RangeReport, ScrapeService,
    ScrapeServiceError, StoredDetailsReport,
};
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Iframe scans per loaded episode page.
const SCANS_PER_LOAD: u32 = 2;

/// Settings captured once per job so a config reload never changes a run midway.
struct Job {
    scraper: ScraperConfig,
    trending: TrendingConfig,
    pacing: Pacing,
}

impl Job {
    fn metadata_policy(&self) -> RetryPolicy {
        RetryPolicy::from_millis(
            self.scraper.metadata_retries,
            self.scraper.metadata_retry_delay_ms,
        )
    }

    fn resolver_settings(&self) -> ResolverSettings {
        ResolverSettings {
            timeout: self.scraper.episode_timeout(),
            navigation: RetryPolicy::from_millis(
                self.scraper.navigation_retries,
                self.scraper.navigation_retry_delay_ms,
            ),
            scan_attempts: SCANS_PER_LOAD,
            pacing: self.pacing,
        }
    }
}

pub struct BrowserScrapeService {
    store: Store,
    config: Arc<RwLock<Config>>,
    launcher: Arc<dyn SessionLauncher>,
    pacing: Pacing,
}

impl BrowserScrapeService {
    #[must_use]
    pub fn new(
        store: Store,
        config: Arc<RwLock<Config>>,
        launcher: Arc<dyn SessionLauncher>,
    ) -> Self {
        Self {
            store,
            config,
            launcher,
            pacing: Pacing::default(),
        }
    }

    #[must_use]
    pub const fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    async fn job(&self) -> Job {
        let config = self.config.read().await;
        Job {
            scraper: config.scraper.clone(),
            trending: config.trending.clone(),
            pacing: self.pacing,
        }
    }

    fn launcher(&self) -> &dyn SessionLauncher {
        self.launcher.as_ref()
    }

    fn check_page(job: &Job, page: u32) -> Result<(), ScrapeServiceError> {
        let max = job.scraper.max_catalog_page;
        if page == 0 || page > max {
            return Err(ScrapeServiceError::Validation(format!(
                "Page must be between 1 and {max}"
            )));
        }
        Ok(())
    }

    /// Reads a detail page, then resolves its episodes on a fresh session.
    async fn scrape_detail_url(
        &self,
        url: &str,
        job: &Job,
    ) -> Result<AnimeEpisodes, ScrapeServiceError> {
        let DetailPage { detail, episodes } =
            with_session(self.launcher(), 1, ResourceGate::detail(), |pool| async move {
                extract_detail(
                    pool.acquire(0).as_ref(),
                    url,
                    job.scraper.detail_timeout(),
                    job.scraper.max_episode_number,
                    &job.pacing,
                )
                .await
            })
            .await?;

        if episodes.is_empty() {
            warn!(url, "No episodes discovered");
            return Ok(AnimeEpisodes {
                detail,
                episodes: Vec::new(),
                resolved: 0,
            });
        }

        let workers = job.scraper.episode_concurrency.min(episodes.len());
        let outcomes = with_session(self.launcher(), workers, ResourceGate::episode(), |pool| {
            let detail = &detail;
            async move { self.resolve_all(&pool, detail, episodes, job).await }
        })
        .await?;

        let resolved = outcomes
            .iter()
            .filter(|outcome| outcome.streaming_link.is_some())
            .count();
        info!(
            url,
            title = %detail.title,
            episodes = outcomes.len(),
            resolved,
            "Anime details scraped"
        );

        Ok(AnimeEpisodes {
            detail,
            episodes: outcomes,
            resolved,
        })
    }

    /// Resolves episodes in order, saving each link as soon as it resolves.
    async fn resolve_all(
        &self,
        pool: &PagePool,
        detail: &AnimeDetail,
        episodes: Vec<EpisodeRef>,
        job: &Job,
    ) -> Vec<EpisodeOutcome> {
        let settings = job.resolver_settings();
        let source = job.scraper.source_name.as_str();

        stream::iter(episodes.into_iter().enumerate())
            .map(|(index, episode)| {
                let page = pool.acquire(index);
                let poster = detail.poster_image.clone();
                async move {
                    let found = resolve_episode(page.as_ref(), &episode.episode_url, settings).await;
                    match &found {
                        Some(src) => {
                            metrics::counter!("scrape_episodes_total", "outcome" => "resolved")
                                .increment(1);
                            let link =
                                StreamingLink::from_episode(&episode, src.clone(), poster, source);
                            if let Err(e) = self.store.save_streaming_link(&link).await {
                                warn!(episode = %episode.episode_url, error = %e, "Failed to save streaming link");
                            }
                        }
                        None => {
                            metrics::counter!("scrape_episodes_total", "outcome" => "missing")
                                .increment(1);
                            warn!(episode = %episode.episode_url, "No streaming link found");
                        }
                    }
                    EpisodeOutcome {
                        episode_number: episode.episode_number,
                        episode_url: episode.episode_url,
                        streaming_link: found,
                    }
                }
            })
            .buffered(pool.limit(job.scraper.episode_concurrency))
            .collect()
            .await
    }

    /// Scrapes `start..=end` in chunks: the chunk's catalog pages load
    /// concurrently, then each page is enriched and saved before the next.
    async fn run_range(
        &self,
        start: u32,
        end: u32,
        job: &Job,
    ) -> Result<RangeReport, ScrapeServiceError> {
        let catalog_workers = job.scraper.catalog_concurrency;
        let metadata_workers = job.scraper.metadata_concurrency;

        let report = with_session(
            self.launcher(),
            catalog_workers,
            ResourceGate::catalog(),
            |catalog_pool| async move {
                with_session(
                    self.launcher(),
                    metadata_workers,
                    ResourceGate::detail(),
                    |metadata_pool| async move {
                        let pages: Vec<u32> = (start..=end).collect();
                        let mut report = RangeReport::default();

                        for chunk in pages.chunks(catalog_pool.limit(catalog_workers)) {
                            let loaded: Vec<(u32, Vec<AnimeSummary>)> =
                                stream::iter(chunk.iter().copied().enumerate())
                                    .map(|(index, page_number)| {
                                        let page = catalog_pool.acquire(index);
                                        async move {
                                            let items =
                                                load_catalog_page(page.as_ref(), page_number, job)
                                                    .await;
                                            (page_number, items)
                                        }
                                    })
                                    .buffered(chunk.len())
                                    .collect()
                                    .await;

                            for (page_number, summaries) in loaded {
                                if summaries.is_empty() {
                                    metrics::counter!("scrape_pages_total", "outcome" => "failed")
                                        .increment(1);
                                    warn!(page = page_number, "Catalog page yielded nothing");
                                    report.pages_failed += 1;
                                    continue;
                                }
                                metrics::counter!("scrape_pages_total", "outcome" => "ok")
                                    .increment(1);

                                report.pages_processed += 1;
                                report.total_anime_found += summaries.len() as u64;

                                let (records, failures) =
                                    enrich_summaries(&metadata_pool, summaries, job).await;
                                match self.store.save_anime_bulk(&records).await {
                                    Ok(counts) => {
                                        report.total_anime_saved += counts.total();
                                        info!(
                                            page = page_number,
                                            found = records.len(),
                                            inserted = counts.inserted,
                                            modified = counts.modified,
                                            metadata_failures = failures,
                                            "Catalog page saved"
                                        );
                                    }
                                    Err(e) => {
                                        warn!(page = page_number, error = %e, "Failed to save catalog page");
                                    }
                                }
                            }
                        }

                        report.recompute_rate();
                        report
                    },
                )
                .await
            },
        )
        .await??;

        Ok(report)
    }
}

async fn load_catalog_page(page: &dyn BrowserPage, number: u32, job: &Job) -> Vec<AnimeSummary> {
    extract_catalog(
        page,
        &job.scraper.catalog_page_url(number),
        &job.scraper.site_base_url,
        job.scraper.catalog_timeout(),
        &job.pacing,
    )
    .await
}

/// Metadata for one entry, retrying with a longer timeout on each attempt.
async fn fetch_metadata(
    page: &dyn BrowserPage,
    summary: &AnimeSummary,
    job: &Job,
) -> Result<AnimeMetadata, ScrapeError> {
    retry(job.metadata_policy(), |attempt| {
        let timeout = job.scraper.detail_timeout().saturating_mul(attempt);
        async move {
            extract_metadata(page, &summary.detail_url, &summary.title, timeout, &job.pacing).await
        }
    })
    .await
}

fn placeholder_metadata() -> AnimeMetadata {
    AnimeMetadata {
        description: Some(MISSING_DESCRIPTION.to_string()),
        ..AnimeMetadata::default()
    }
}

/// Enriches catalog entries in order; returns the records and how many fell
/// back to the placeholder.
async fn enrich_summaries(
    pool: &PagePool,
    summaries: Vec<AnimeSummary>,
    job: &Job,
) -> (Vec<AnimeRecord>, usize) {
    let source = job.scraper.source_name.as_str();

    let results: Vec<(AnimeRecord, bool)> = stream::iter(summaries.into_iter().enumerate())
        .map(|(index, summary)| {
            let page = pool.acquire(index);
            async move {
                match fetch_metadata(page.as_ref(), &summary, job).await {
                    Ok(metadata) => (AnimeRecord::new(summary, metadata, source), true),
                    Err(e) => {
                        warn!(url = %summary.detail_url, error = %e, "Metadata extraction failed");
                        (AnimeRecord::new(summary, placeholder_metadata(), source), false)
                    }
                }
            }
        })
        .buffered(pool.limit(job.scraper.metadata_concurrency))
        .collect()
        .await;

    let failures = results.iter().filter(|(_, ok)| !ok).count();
    (results.into_iter().map(|(record, _)| record).collect(), failures)
}

#[async_trait]
impl ScrapeService for BrowserScrapeService {
    async fn scrape_catalog_page(&self, page: u32) -> Result<CatalogPageResult, ScrapeServiceError> {
        let job = self.job().await;
        Self::check_page(&job, page)?;
        let job = &job;

        let summaries = with_session(self.launcher(), 1, ResourceGate::catalog(), |pool| async move {
            load_catalog_page(pool.acquire(0).as_ref(), page, job).await
        })
        .await?;

        if summaries.is_empty() {
            metrics::counter!("scrape_pages_total", "outcome" => "failed").increment(1);
            warn!(page, "Catalog page yielded nothing");
            return Ok(CatalogPageResult {
                page,
                anime: Vec::new(),
                saved: crate::db::UpsertCounts::default(),
                metadata_failures: 0,
            });
        }
        metrics::counter!("scrape_pages_total", "outcome" => "ok").increment(1);

        let workers = job.scraper.metadata_concurrency.min(summaries.len());
        let (anime, metadata_failures) =
            with_session(self.launcher(), workers, ResourceGate::detail(), |pool| async move {
                enrich_summaries(&pool, summaries, job).await
            })
            .await?;

        let saved = match self.store.save_anime_bulk(&anime).await {
            Ok(counts) => counts,
            Err(e) => {
                warn!(page, error = %e, "Failed to save catalog page");
                crate::db::UpsertCounts::default()
            }
        };

        Ok(CatalogPageResult {
            page,
            anime,
            saved,
            metadata_failures,
        })
    }

    async fn scrape_page_range(&self, start: u32, end: u32) -> Result<RangeReport, ScrapeServiceError> {
        let job = self.job().await;
        Self::check_page(&job, start)?;
        Self::check_page(&job, end)?;
        if start > end {
            return Err(ScrapeServiceError::Validation(
                "Start page must be less than or equal to end page".to_string(),
            ));
        }

        info!(start, end, "Scraping catalog range");
        let report = self.run_range(start, end, &job).await?;
        info!(
            start,
            end,
            processed = report.pages_processed,
            failed = report.pages_failed,
            saved = report.total_anime_saved,
            "Catalog range finished"
        );
        Ok(report)
    }

    async fn scrape_in_batches(&self, batch_size: u32) -> Result<BatchReport, ScrapeServiceError> {
        if batch_size == 0 {
            return Err(ScrapeServiceError::Validation(
                "Batch size must be at least 1".to_string(),
            ));
        }
        let job = self.job().await;
        let max = job.scraper.max_catalog_page;
        let pause = Duration::from_secs(job.scraper.batch_delay_seconds);

        let mut report = BatchReport {
            batch_size,
            ..BatchReport::default()
        };
        let mut start = 1;
        while start <= max {
            let end = start.saturating_add(batch_size - 1).min(max);
            report.batches += 1;
            info!(batch = report.batches, start, end, "Starting batch");

            match self.run_range(start, end, &job).await {
                Ok(batch) => report.totals.absorb(&batch),
                Err(e) => {
                    warn!(start, end, error = %e, "Batch failed");
                    report.totals.absorb(&RangeReport {
                        pages_failed: end - start + 1,
                        ..RangeReport::default()
                    });
                }
            }

            start = end + 1;
            if start <= max && !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }
        }

        info!(
            batches = report.batches,
            processed = report.totals.pages_processed,
            saved = report.totals.total_anime_saved,
            "Batch scrape finished"
        );
        Ok(report)
    }

    async fn scrape_anime_details(&self, slug: &str) -> Result<AnimeEpisodes, ScrapeServiceError> {
        let job = self.job().await;
        let url = job.scraper.anime_url(slug);
        self.scrape_detail_url(&url, &job).await
    }

    async fn scrape_episode(&self, slug: &str, episode: &str) -> Result<StreamingLink, ScrapeServiceError> {
        let job = self.job().await;
        let job = &job;
        let url = job.scraper.episode_url(slug, episode);

        let stored = self
            .store
            .get_anime_by_url(&job.scraper.anime_url(slug))
            .await?;
        let (title, poster_image) = stored.map_or_else(
            || (slug_to_title(slug), None),
            |record| (record.summary.title, record.summary.poster_image),
        );

        let found = with_session(self.launcher(), 1, ResourceGate::episode(), |pool| {
            let url = url.as_str();
            async move { resolve_episode(pool.acquire(0).as_ref(), url, job.resolver_settings()).await }
        })
        .await?;

        let Some(src) = found else {
            metrics::counter!("scrape_episodes_total", "outcome" => "missing").increment(1);
            return Err(ScrapeServiceError::NotFound(format!(
                "No streaming link found for {url}"
            )));
        };
        metrics::counter!("scrape_episodes_total", "outcome" => "resolved").increment(1);

        let episode_ref = EpisodeRef {
            anime_title: title,
            episode_number: episode.to_string(),
            episode_url: url,
            range_id: None,
            strategy: EpisodeStrategy::Fallback,
        };
        let link = StreamingLink::from_episode(&episode_ref, src, poster_image, &job.scraper.source_name);
        self.store.save_streaming_link(&link).await?;
        Ok(link)
    }

    async fn scrape_stored_details(
        &self,
        offset: u64,
        count: u64,
    ) -> Result<StoredDetailsReport, ScrapeServiceError> {
        let job = self.job().await;
        let records = self.store.anime_slice(offset, count).await?;
        let mut report = StoredDetailsReport::default();

        for (index, record) in records.iter().enumerate() {
            info!(
                position = offset + index as u64 + 1,
                title = %record.summary.title,
                "Scraping stored anime"
            );
            report.processed += 1;

            match self.scrape_detail_url(&record.summary.detail_url, &job).await {
                Ok(result) if result.episodes.is_empty() => report.without_episodes += 1,
                Ok(result) => {
                    report.episodes_found += result.episodes.len() as u64;
                    report.links_saved += result.resolved as u64;
                }
                Err(e) => {
                    warn!(url = %record.summary.detail_url, error = %e, "Detail scrape failed");
                    report.without_episodes += 1;
                }
            }
        }

        Ok(report)
    }

    async fn scrape_ranked(&self, list: RankedList) -> Result<Vec<AnimeRecord>, ScrapeServiceError> {
        let job = self.job().await;
        let job = &job;
        let workers = job.trending.enrich_concurrency;

        let records = with_session(self.launcher(), workers, ResourceGate::catalog(), |pool| async move {
            let page = pool.acquire(0);
            let titles = extract_ranked_titles(
                page.as_ref(),
                &job.trending.base_url,
                list,
                job.trending.limit,
                job.scraper.catalog_timeout(),
                &job.pacing,
            )
            .await?;
            if titles.is_empty() {
                warn!(list = list.as_str(), "Ranking page had no titles");
                return Ok(Vec::new());
            }

            let catalog = load_catalog_page(page.as_ref(), 1, job).await;
            let picks = pair_with_catalog(&titles, &catalog, |slug| job.scraper.anime_url(slug));
            let source = job.scraper.source_name.as_str();

            let records: Vec<(bool, AnimeRecord)> = stream::iter(picks.into_iter().enumerate())
                .map(|(index, pick)| {
                    let page = pool.acquire(index);
                    async move {
                        let metadata = if pick.needs_metadata() {
                            fetch_metadata(page.as_ref(), &pick.summary, job)
                                .await
                                .unwrap_or_else(|e| {
                                    warn!(title = %pick.title, error = %e, "Ranked entry enrichment failed");
                                    placeholder_metadata()
                                })
                        } else {
                            placeholder_metadata()
                        };
                        let persist = pick.is_persistable();
                        let record = AnimeRecord {
                            summary: pick.summary,
                            metadata,
                            source: source.to_string(),
                            category: list.category(),
                            rank: Some(pick.rank),
                            chart_title: Some(pick.title),
                        };
                        (persist, record)
                    }
                })
                .buffered(pool.limit(workers))
                .collect()
                .await;

            Ok::<_, ScrapeError>(records)
        })
        .await??;

        let matched: Vec<AnimeRecord> = records
            .iter()
            .filter(|(persist, _)| *persist)
            .map(|(_, record)| record.clone())
            .collect();
        if let Err(e) = self.store.save_anime_bulk(&matched).await {
            warn!(list = list.as_str(), error = %e, "Failed to save ranked list");
        }
        info!(
            list = list.as_str(),
            entries = records.len(),
            saved = matched.len(),
            "Ranked list scraped"
        );
        Ok(records.into_iter().map(|(_, record)| record).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrape::testing::{FakeLauncher, FakePage};

    const SITE: &str = "https://w1.123animes.ru";
    const PLAYER: &str = "https://play.bunnycdn.example/embed/abc123";
    const SYNOPSIS: &str = "Kimiko is a young detective who joins a special unit that reads \
        the memories of suspects and uncovers a secret about her past.";

    fn catalog_html(slugs: &[(&str, &str)]) -> String {
        let tiles: String = slugs
            .iter()
            .map(|(title, slug)| {
                format!(
                    r#"<div class="item"><div class="inner">
                    <a href="/anime/{slug}"><img src="/imgs/poster/{slug}.jpg"></a>
                    <a href="/anime/{slug}" data-jititle="{title}">{title}</a>
                    </div></div>"#
                )
            })
            .collect();
        format!(r#"<html><body><div class="film-list">{tiles}</div></body></html>"#)
    }

    fn detail_html(title: &str, episodes: &[&str]) -> String {
        let links: String = episodes
            .iter()
            .map(|n| format!(r#"<a href="/anime/your-forma/episode/{n}">{n}</a>"#))
            .collect();
        format!(
            r#"<html><body><h1 class="entry-title">{title}</h1>
            <dl><dt>Type:</dt><dd>TV Series</dd><dt>Country:</dt><dd>Japanese</dd></dl>
            <div class="long">{SYNOPSIS}</div>
            <div class="episodes">{links}</div></body></html>"#
        )
    }

    fn player_html() -> String {
        format!(r#"<html><body><div id="iframe_ext82377"><iframe src="{PLAYER}"></iframe></div></body></html>"#)
    }

    async fn service(page: FakePage) -> (BrowserScrapeService, Store, Arc<FakeLauncher>) {
        let store = Store::new("sqlite::memory:").await.unwrap();
        let mut config = Config::default();
        config.scraper.metadata_retry_delay_ms = 1;
        config.scraper.navigation_retry_delay_ms = 1;
        config.scraper.batch_delay_seconds = 0;
        config.scraper.max_catalog_page = 3;
        let launcher = Arc::new(FakeLauncher::new(vec![Arc::new(page)]));
        let service = BrowserScrapeService::new(
            store.clone(),
            Arc::new(RwLock::new(config)),
            Arc::clone(&launcher) as Arc<dyn SessionLauncher>,
        )
        .with_pacing(Pacing::immediate());
        (service, store, launcher)
    }

    #[tokio::test]
    async fn test_catalog_page_enriches_and_saves() {
        let page = FakePage::new()
            .with_page(
                &format!("{SITE}/az-all-anime/all/?page=1"),
                &catalog_html(&[("Your Forma", "your-forma"), ("Monster", "monster")]),
            )
            .with_page(&format!("{SITE}/anime/your-forma"), &detail_html("Your Forma", &[]))
            .failing(&format!("{SITE}/anime/monster"), 10);
        let (service, store, launcher) = service(page).await;

        let result = service.scrape_catalog_page(1).await.unwrap();
        assert_eq!(result.anime.len(), 2);
        assert_eq!(result.saved.inserted, 2);
        assert_eq!(result.metadata_failures, 1);
        assert_eq!(launcher.sessions_opened(), 2);

        let forma = store
            .get_anime_by_url(&format!("{SITE}/anime/your-forma"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(forma.metadata.country.as_deref(), Some("Japan"));
        assert_eq!(forma.metadata.kind.as_deref(), Some("TV Series"));

        let monster = store
            .get_anime_by_url(&format!("{SITE}/anime/monster"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(monster.metadata.description.as_deref(), Some(MISSING_DESCRIPTION));
        assert_eq!(monster.metadata.country, None);

        assert!(matches!(
            service.scrape_catalog_page(4).await,
            Err(ScrapeServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_anime_details_writes_through_resolved_links() {
        let page = FakePage::new()
            .with_page(
                &format!("{SITE}/anime/your-forma"),
                &detail_html("Your Forma", &["1", "2"]),
            )
            .with_page(&format!("{SITE}/anime/your-forma/episode/1"), &player_html())
            .with_page(
                &format!("{SITE}/anime/your-forma/episode/2"),
                "<html><body><p>Coming soon</p></body></html>",
            );
        let (service, store, _) = service(page).await;

        let result = service.scrape_anime_details("your-forma").await.unwrap();
        assert_eq!(result.detail.title, "Your Forma");
        assert_eq!(result.episodes.len(), 2);
        assert_eq!(result.resolved, 1);
        assert_eq!(result.episodes[0].streaming_link.as_deref(), Some(PLAYER));
        assert_eq!(result.episodes[1].streaming_link, None);

        let links = store.streaming_links_for_title("Your Forma").await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].strategy.as_deref(), Some("container"));
    }

    #[tokio::test]
    async fn test_single_episode_found_and_missing() {
        let page = FakePage::new()
            .with_page(&format!("{SITE}/anime/sentai-daishikkaku/episode/3"), &player_html());
        let (service, store, _) = service(page).await;

        let link = service.scrape_episode("sentai-daishikkaku", "3").await.unwrap();
        assert_eq!(link.title, "Sentai Daishikkaku");
        assert_eq!(link.strategy.as_deref(), Some("fallback"));
        assert_eq!(link.streaming_link, PLAYER);
        assert_eq!(store.streaming_stats().await.unwrap().total_links, 1);

        assert!(matches!(
            service.scrape_episode("sentai-daishikkaku", "4").await,
            Err(ScrapeServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_page_range_counts_failed_pages() {
        let page = FakePage::new()
            .with_page(
                &format!("{SITE}/az-all-anime/all/?page=1"),
                &catalog_html(&[("Your Forma", "your-forma")]),
            )
            .with_page(&format!("{SITE}/anime/your-forma"), &detail_html("Your Forma", &[]))
            .failing(&format!("{SITE}/az-all-anime/all/?page=2"), 10);
        let (service, _, _) = service(page).await;

        let report = service.scrape_page_range(1, 2).await.unwrap();
        assert_eq!(report.pages_processed, 1);
        assert_eq!(report.pages_failed, 1);
        assert_eq!(report.total_anime_found, 1);
        assert_eq!(report.total_anime_saved, 1);
        assert!((report.success_rate - 50.0).abs() < f64::EPSILON);

        assert!(matches!(
            service.scrape_page_range(2, 1).await,
            Err(ScrapeServiceError::Validation(_))
        ));

        let batches = service.scrape_in_batches(2).await.unwrap();
        assert_eq!(batches.batches, 2);
        assert_eq!(batches.totals.pages_processed, 1);
        assert_eq!(batches.totals.pages_failed, 2);
    }

    #[tokio::test]
    async fn test_ranked_list_keeps_rank_order() {
        let home = r#"<html><body>
            <ul class="anif-block-ul anif-block-chart tab-pane active">
                <li class="item-top"><div class="film-name"><a href="/a">Your Forma</a></div></li>
                <li><div class="film-name"><a href="/b">Bocchi the Rock</a></div></li>
            </ul></body></html>"#;
        let page = FakePage::new()
            .with_page("https://hianime.to/home", home)
            .with_page(
                &format!("{SITE}/az-all-anime/all/?page=1"),
                &catalog_html(&[("Monster", "monster"), ("Your Forma", "your-forma")]),
            )
            .with_page(&format!("{SITE}/anime/your-forma"), &detail_html("Your Forma", &[]))
            .with_page(&format!("{SITE}/anime/monster"), &detail_html("Monster", &[]));
        let (service, store, _) = service(page).await;

        let records = service.scrape_ranked(RankedList::Trending).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].rank, Some(1));
        assert_eq!(records[0].chart_title.as_deref(), Some("Your Forma"));
        assert_eq!(records[0].summary.detail_url, format!("{SITE}/anime/your-forma"));
        // no match: index 1 of a two-entry catalog
        assert_eq!(records[1].summary.title, "Bocchi the Rock");
        assert_eq!(records[1].summary.detail_url, format!("{SITE}/anime/your-forma"));

        let ranked = store
            .ranked_anime(crate::domain::Category::Trending)
            .await
            .unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].summary.title, "Your Forma");
        assert_eq!(ranked[0].rank, Some(1));
    }

    #[tokio::test]
    async fn test_unmatched_ranked_entry_leaves_catalog_row_alone() {
        let home = r#"<html><body>
            <ul class="anif-block-ul anif-block-chart tab-pane active">
                <li class="item-top"><div class="film-name"><a href="/a">Bocchi the Rock</a></div></li>
            </ul></body></html>"#;
        let page = FakePage::new()
            .with_page("https://hianime.to/home", home)
            .with_page(
                &format!("{SITE}/az-all-anime/all/?page=1"),
                &catalog_html(&[("Monster", "monster")]),
            )
            .with_page(&format!("{SITE}/anime/monster"), &detail_html("Monster", &[]));
        let (service, store, _) = service(page).await;

        service.scrape_catalog_page(1).await.unwrap();
        let monster_url = format!("{SITE}/anime/monster");
        let before = store.get_anime_by_url(&monster_url).await.unwrap().unwrap();

        let records = service.scrape_ranked(RankedList::Trending).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].chart_title.as_deref(), Some("Bocchi the Rock"));

        let after = store.get_anime_by_url(&monster_url).await.unwrap().unwrap();
        assert_eq!(after.summary.title, "Monster");
        assert_eq!(after.category, crate::domain::Category::General);
        assert_eq!(after.rank, None);
        assert_eq!(after, before);
        assert!(
            store
                .ranked_anime(crate::domain::Category::Trending)
                .await
                .unwrap()
                .is_empty()
        );
    }
}
