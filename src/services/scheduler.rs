use anyhow::Result;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{Duration, interval};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::config::SchedulerConfig;
use crate::scrape::trending::RankedList;
use crate::services::ScrapeService;

/// Periodically refreshes the trending, weekly and monthly lists.
pub struct Scheduler {
    service: Arc<dyn ScrapeService>,
    config: SchedulerConfig,
    running: Arc<RwLock<bool>>,
}

impl Scheduler {
    pub fn new(service: Arc<dyn ScrapeService>, config: SchedulerConfig) -> Self {
        Self {
            service,
            config,
            running: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn start(&self) -> Result<()> {
        if !self.config.enabled {
            info!("Scheduler is disabled in config");
            return Ok(());
        }

        *self.running.write().await = true;
        info!("Starting background scheduler");

        if let Some(cron_expr) = &self.config.cron_expression {
            self.run_with_cron(cron_expr).await
        } else {
            self.run_with_interval().await
        }
    }

    async fn run_with_cron(&self, cron_expr: &str) -> Result<()> {
        let mut sched = JobScheduler::new().await?;

        let service = Arc::clone(&self.service);
        let running = Arc::clone(&self.running);

        let job = Job::new_async(cron_expr, move |_uuid, _lock| {
            let service = Arc::clone(&service);
            let running = Arc::clone(&running);
            Box::pin(async move {
                if !*running.read().await {
                    return;
                }
                refresh_ranked_lists(service.as_ref()).await;
            })
        })?;

        sched.add(job).await?;
        sched.start().await?;

        info!("Scheduler running with cron: {}", cron_expr);

        loop {
            if !*self.running.read().await {
                break;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        sched.shutdown().await?;
        Ok(())
    }

    async fn run_with_interval(&self) -> Result<()> {
        let refresh_hours = self.config.refresh_interval_hours.max(1);
        info!("Scheduler running: ranked lists every {}h", refresh_hours);

        let mut refresh_interval =
            interval(Duration::from_secs(u64::from(refresh_hours) * 60 * 60));

        loop {
            refresh_interval.tick().await;
            if !*self.running.read().await {
                break;
            }
            refresh_ranked_lists(self.service.as_ref()).await;
        }

        Ok(())
    }

    pub async fn stop(&self) {
        info!("Stopping scheduler...");
        *self.running.write().await = false;
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Runs one refresh immediately, regardless of `enabled`.
    pub async fn run_once(&self) {
        refresh_ranked_lists(self.service.as_ref()).await;
    }
}

/// Refreshes each list in turn; one failing list does not stop the others.
async fn refresh_ranked_lists(service: &dyn ScrapeService) {
    let start = std::time::Instant::now();
    info!(
        event = "job_started",
        job_name = "refresh_ranked_lists",
        "Starting scheduled ranked list refresh"
    );

    for list in RankedList::ALL {
        match service.scrape_ranked(list).await {
            Ok(records) => info!(list = list.as_str(), entries = records.len(), "Ranked list refreshed"),
            Err(e) => error!(
                event = "job_failed",
                job_name = "refresh_ranked_lists",
                list = list.as_str(),
                error = %e,
                "Ranked list refresh failed"
            ),
        }
    }

    info!(
        event = "job_finished",
        job_name = "refresh_ranked_lists",
        duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        "Scheduled ranked list refresh finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AnimeRecord;
    use crate::services::{
        AnimeEpisodes, BatchReport, CatalogPageResult, RangeReport, ScrapeServiceError,
        StoredDetailsReport,
    };
    use crate::domain::StreamingLink;
    use std::sync::Mutex;

    /// Records ranked-list calls and fails the weekly one.
    #[derive(Default)]
    struct RecordingService {
        calls: Mutex<Vec<RankedList>>,
    }

    #[async_trait::async_trait]
    impl ScrapeService for RecordingService {
        async fn scrape_catalog_page(&self, _page: u32) -> Result<CatalogPageResult, ScrapeServiceError> {
            unimplemented!()
        }
        async fn scrape_page_range(&self, _start: u32, _end: u32) -> Result<RangeReport, ScrapeServiceError> {
            unimplemented!()
        }
        async fn scrape_in_batches(&self, _batch_size: u32) -> Result<BatchReport, ScrapeServiceError> {
            unimplemented!()
        }
        async fn scrape_anime_details(&self, _slug: &str) -> Result<AnimeEpisodes, ScrapeServiceError> {
            unimplemented!()
        }
        async fn scrape_episode(&self, _slug: &str, _episode: &str) -> Result<StreamingLink, ScrapeServiceError> {
            unimplemented!()
        }
        async fn scrape_stored_details(
            &self,
            _offset: u64,
            _count: u64,
        ) -> Result<StoredDetailsReport, ScrapeServiceError> {
            unimplemented!()
        }
        async fn scrape_ranked(&self, list: RankedList) -> Result<Vec<AnimeRecord>, ScrapeServiceError> {
            self.calls.lock().unwrap().push(list);
            if list == RankedList::Weekly {
                return Err(ScrapeServiceError::Scrape("ranking page unreachable".to_string()));
            }
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_refresh_continues_past_failed_list() {
        let service = Arc::new(RecordingService::default());
        let scheduler = Scheduler::new(
            Arc::clone(&service) as Arc<dyn ScrapeService>,
            SchedulerConfig::default(),
        );

        scheduler.run_once().await;
        assert_eq!(*service.calls.lock().unwrap(), RankedList::ALL.to_vec());
    }

    #[tokio::test]
    async fn test_disabled_scheduler_returns_immediately() {
        let scheduler = Scheduler::new(
            Arc::new(RecordingService::default()),
            SchedulerConfig::default(),
        );
        scheduler.start().await.unwrap();
        assert!(!scheduler.is_running().await);
    }
}
