use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub observability: ObservabilityConfig,

    pub browser: BrowserConfig,

    pub scraper: ScraperConfig,

    pub trending: TrendingConfig,

    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    pub max_db_connections: u32,

    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/animescrape.db".to_string(),
            log_level: "info".to_string(),
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,

    pub port: u16,

    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 5000,
            cors_allowed_origins: vec!["*".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub loki_enabled: bool,

    pub loki_url: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Chromium binary to launch. Autodetected when unset.
    pub executable_path: Option<String>,

    pub headless: bool,

    pub user_agent: String,

    pub viewport_width: u32,

    pub viewport_height: u32,

    pub launch_timeout_seconds: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            executable_path: None,
            headless: true,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            viewport_width: 1280,
            viewport_height: 720,
            launch_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// Paginated A-Z listing; `?page=N` is appended.
    pub catalog_base_url: String,

    /// Host serving `/anime/<slug>` and `/anime/<slug>/episode/<n>`.
    pub site_base_url: String,

    pub source_name: String,

    pub max_catalog_page: u32,

    /// Largest span a single `scrape-pages` request may cover.
    pub max_pages_per_request: u32,

    pub catalog_concurrency: usize,

    pub metadata_concurrency: usize,

    pub episode_concurrency: usize,

    pub catalog_timeout_seconds: u64,

    pub detail_timeout_seconds: u64,

    pub episode_timeout_seconds: u64,

    pub metadata_retries: u32,

    pub metadata_retry_delay_ms: u64,

    pub navigation_retries: u32,

    pub navigation_retry_delay_ms: u64,

    /// Pause between page batches of a full-catalog run.
    pub batch_delay_seconds: u64,

    pub max_episode_number: u32,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            catalog_base_url: "https://w1.123animes.ru/az-all-anime/all/".to_string(),
            site_base_url: "https://w1.123animes.ru".to_string(),
            source_name: "123animes".to_string(),
            max_catalog_page: 501,
            max_pages_per_request: 100,
            catalog_concurrency: 4,
            metadata_concurrency: 8,
            episode_concurrency: 8,
            catalog_timeout_seconds: 30,
            detail_timeout_seconds: 30,
            episode_timeout_seconds: 10,
            metadata_retries: 2,
            metadata_retry_delay_ms: 3000,
            navigation_retries: 2,
            navigation_retry_delay_ms: 1000,
            batch_delay_seconds: 10,
            max_episode_number: 2000,
        }
    }
}

impl ScraperConfig {
    #[must_use]
    pub fn catalog_page_url(&self, page: u32) -> String {
        format!("{}?page={page}", self.catalog_base_url)
    }

    #[must_use]
    pub fn anime_url(&self, slug: &str) -> String {
        format!("{}/anime/{slug}", self.site_base_url.trim_end_matches('/'))
    }

    #[must_use]
    pub fn episode_url(&self, slug: &str, episode: &str) -> String {
        format!("{}/episode/{episode}", self.anime_url(slug))
    }

    #[must_use]
    pub const fn catalog_timeout(&self) -> Duration {
        Duration::from_secs(self.catalog_timeout_seconds)
    }

    #[must_use]
    pub const fn detail_timeout(&self) -> Duration {
        Duration::from_secs(self.detail_timeout_seconds)
    }

    #[must_use]
    pub const fn episode_timeout(&self) -> Duration {
        Duration::from_secs(self.episode_timeout_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendingConfig {
    pub base_url: String,

    pub limit: usize,

    /// Concurrency for enriching matched ranked entries.
    pub enrich_concurrency: usize,
}

impl Default for TrendingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://hianime.to/home".to_string(),
            limit: 10,
            enrich_concurrency: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,

    pub cron_expression: Option<String>,

    /// Ranked-list refresh interval in hours (default: 24)
    pub refresh_interval_hours: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cron_expression: None,
            refresh_interval_hours: 24,
        }
    }
}

/// Upper bound for any single stage's concurrency. Each stage opens this many
/// pages at most, so a stage limiter never exceeds its pool size.
pub const MAX_POOL_SIZE: usize = 16;

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("animescrape").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".animescrape").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        let scraper = &self.scraper;

        for (name, value) in [
            ("catalog_concurrency", scraper.catalog_concurrency),
            ("metadata_concurrency", scraper.metadata_concurrency),
            ("episode_concurrency", scraper.episode_concurrency),
            ("trending.enrich_concurrency", self.trending.enrich_concurrency),
        ] {
            if value == 0 {
                anyhow::bail!("{name} must be > 0");
            }
            if value > MAX_POOL_SIZE {
                anyhow::bail!("{name} must be <= {MAX_POOL_SIZE} (page pool ceiling)");
            }
        }

        if scraper.max_catalog_page == 0 {
            anyhow::bail!("max_catalog_page must be > 0");
        }

        if scraper.max_pages_per_request == 0
            || scraper.max_pages_per_request > scraper.max_catalog_page
        {
            anyhow::bail!("max_pages_per_request must be between 1 and max_catalog_page");
        }

        if self.trending.limit == 0 {
            anyhow::bail!("trending.limit must be > 0");
        }

        if self.scheduler.enabled
            && self.scheduler.refresh_interval_hours == 0
            && self.scheduler.cron_expression.is_none()
        {
            anyhow::bail!("Scheduler interval must be > 0 or cron expression must be set");
        }

        Ok(())
    }
}
