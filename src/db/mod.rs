use crate::domain::{AnimeRecord, Category, StreamingLink};
use anyhow::{Context, Result};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod migrator;
pub mod repositories;

pub use repositories::UpsertCounts;
pub use repositories::anime::AnimeStats;
pub use repositories::streaming_link::StreamingStats;

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        // every pooled connection to an in-memory database would see its own empty schema
        let in_memory = db_url.contains(":memory:");
        let (max_connections, min_connections) = if in_memory {
            (1, 1)
        } else {
            (max_connections, min_connections)
        };

        if !in_memory {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)
                    .with_context(|| format!("Failed to create database file {path_str}"))?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .sqlx_logging(false);
        if !in_memory {
            opt.max_lifetime(Duration::from_secs(600));
        }

        let conn = Database::connect(opt)
            .await
            .context("Failed to connect to database")?;

        migrator::Migrator::up(&conn, None)
            .await
            .context("Failed to apply migrations")?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn anime_repo(&self) -> repositories::anime::AnimeRepository {
        repositories::anime::AnimeRepository::new(self.conn.clone())
    }

    fn link_repo(&self) -> repositories::streaming_link::StreamingLinkRepository {
        repositories::streaming_link::StreamingLinkRepository::new(self.conn.clone())
    }

    pub async fn save_anime_bulk(&self, records: &[AnimeRecord]) -> Result<UpsertCounts> {
        self.anime_repo().upsert_many(records).await
    }

    pub async fn get_anime_by_url(&self, detail_url: &str) -> Result<Option<AnimeRecord>> {
        self.anime_repo().get_by_url(detail_url).await
    }

    pub async fn list_anime(&self, page: u64, limit: u64) -> Result<(Vec<AnimeRecord>, u64)> {
        self.anime_repo().page(page, limit).await
    }

    pub async fn anime_slice(&self, offset: u64, limit: u64) -> Result<Vec<AnimeRecord>> {
        self.anime_repo().slice(offset, limit).await
    }

    pub async fn search_anime(&self, query: &str, limit: u64) -> Result<Vec<AnimeRecord>> {
        self.anime_repo().search(query, limit).await
    }

    pub async fn ranked_anime(&self, category: Category) -> Result<Vec<AnimeRecord>> {
        self.anime_repo().ranked(category).await
    }

    pub async fn anime_stats(&self) -> Result<AnimeStats> {
        self.anime_repo().stats().await
    }

    pub async fn save_streaming_link(&self, link: &StreamingLink) -> Result<()> {
        self.link_repo().upsert(link).await
    }

    pub async fn save_streaming_links_bulk(&self, links: &[StreamingLink]) -> Result<UpsertCounts> {
        self.link_repo().upsert_many(links).await
    }

    pub async fn list_streaming_links(
        &self,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<StreamingLink>, u64)> {
        self.link_repo().page(page, limit).await
    }

    /// Links whose title slug matches `title` once it is slugified.
    pub async fn streaming_links_for_title(&self, title: &str) -> Result<Vec<StreamingLink>> {
        self.link_repo().by_slug(&crate::domain::title_slug(title)).await
    }

    pub async fn remove_streaming_links(&self, title: &str) -> Result<u64> {
        self.link_repo()
            .remove_by_slug(&crate::domain::title_slug(title))
            .await
    }

    pub async fn streaming_stats(&self) -> Result<StreamingStats> {
        self.link_repo().stats().await
    }
}
