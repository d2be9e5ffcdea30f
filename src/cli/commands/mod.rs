mod remove;
mod scrape;
mod stats;

pub use remove::cmd_remove_anime;
pub use scrape::{
    cmd_batches, cmd_catalog, cmd_details, cmd_episode, cmd_pages, cmd_trending, scrape_service,
};
pub use stats::cmd_stats;
