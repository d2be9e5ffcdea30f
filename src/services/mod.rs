pub mod scheduler;
pub use scheduler::Scheduler;

pub mod scrape_service;
pub mod scrape_service_impl;
pub use scrape_service::{
    AnimeEpisodes, BatchReport, CatalogPageResult, EpisodeOutcome, RangeReport, ScrapeService,
    ScrapeServiceError, StoredDetailsReport,
};
pub use scrape_service_impl::BrowserScrapeService;
