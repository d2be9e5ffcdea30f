//! Scrape command handlers

use std::sync::Arc;

use crate::config::Config;
use crate::scrape::trending::RankedList;
use crate::services::ScrapeService;
use crate::state::SharedState;

pub async fn scrape_service(config: &Config) -> anyhow::Result<Arc<dyn ScrapeService>> {
    let state = SharedState::new(config.clone()).await?;
    Ok(state.scrape_service)
}

pub async fn cmd_catalog(config: &Config, page: u32) -> anyhow::Result<()> {
    let service = scrape_service(config).await?;
    let result = service.scrape_catalog_page(page).await?;

    if result.anime.is_empty() {
        println!("Page {page} yielded no anime.");
        return Ok(());
    }

    println!("Catalog page {} ({} anime)", page, result.anime.len());
    println!("{:-<70}", "");
    for record in &result.anime {
        let summary = &record.summary;
        println!(
            "{:>3}. {} [{}]",
            summary.position,
            summary.title,
            summary.audio_type.as_str()
        );
        println!(
            "     {} | {}",
            record.metadata.kind.as_deref().unwrap_or("?"),
            summary.detail_url
        );
    }
    println!();
    println!(
        "✓ Saved: {} new, {} updated, {} without metadata",
        result.saved.inserted, result.saved.modified, result.metadata_failures
    );

    Ok(())
}

pub async fn cmd_pages(config: &Config, start: u32, end: u32) -> anyhow::Result<()> {
    let service = scrape_service(config).await?;
    let report = service.scrape_page_range(start, end).await?;

    println!("Pages {start}-{end}");
    println!("  Processed: {}", report.pages_processed);
    println!("  Failed:    {}", report.pages_failed);
    println!("  Found:     {}", report.total_anime_found);
    println!("  Saved:     {}", report.total_anime_saved);
    println!("  Success:   {:.2}%", report.success_rate);
    Ok(())
}

pub async fn cmd_batches(config: &Config, batch_size: u32) -> anyhow::Result<()> {
    let service = scrape_service(config).await?;
    let report = service.scrape_in_batches(batch_size).await?;

    println!("{} batches of {}", report.batches, report.batch_size);
    println!("  Processed: {}", report.totals.pages_processed);
    println!("  Failed:    {}", report.totals.pages_failed);
    println!("  Saved:     {}", report.totals.total_anime_saved);
    println!("  Success:   {:.2}%", report.totals.success_rate);
    Ok(())
}

pub async fn cmd_details(config: &Config, slug: &str) -> anyhow::Result<()> {
    let service = scrape_service(config).await?;
    let result = service.scrape_anime_details(slug).await?;

    println!("{}", result.detail.title);
    if let Some(kind) = &result.detail.metadata.kind {
        println!("  Type: {kind}");
    }
    if !result.detail.metadata.genres.is_empty() {
        println!("  Genres: {}", result.detail.metadata.genres.join(", "));
    }
    println!("{:-<70}", "");

    for episode in &result.episodes {
        match &episode.streaming_link {
            Some(link) => println!("✓ Episode {}: {}", episode.episode_number, link),
            None => println!("✗ Episode {}: no player found", episode.episode_number),
        }
    }
    println!();
    println!(
        "Resolved {}/{} episodes",
        result.resolved,
        result.episodes.len()
    );
    Ok(())
}

pub async fn cmd_episode(config: &Config, slug: &str, episode: &str) -> anyhow::Result<()> {
    let service = scrape_service(config).await?;
    let link = service.scrape_episode(slug, episode).await?;

    println!("✓ {} - Episode {}", link.title, link.episode_number);
    println!("  {}", link.streaming_link);
    Ok(())
}

pub async fn cmd_trending(config: &Config, list: RankedList) -> anyhow::Result<()> {
    let service = scrape_service(config).await?;
    let records = service.scrape_ranked(list).await?;

    if records.is_empty() {
        println!("No {} titles found.", list.as_str());
        return Ok(());
    }

    println!("Top {} ({})", records.len(), list.as_str());
    println!("{:-<70}", "");
    for record in records {
        println!(
            "#{:<2} {}",
            record.rank.unwrap_or_default(),
            record.chart_title.as_deref().unwrap_or(&record.summary.title)
        );
        println!("    {}", record.summary.detail_url);
    }
    Ok(())
}
