//! CLI module - command-line interface for animescrape.

mod commands;

use clap::{Parser, Subcommand};

/// animescrape - anime catalog and streaming link scraper
#[derive(Parser)]
#[command(name = "animescrape")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API and the optional ranked-list scheduler
    #[command(alias = "daemon")]
    Serve,

    /// Create default config file
    Init,

    /// Scrape, enrich and save one catalog page
    Catalog {
        /// Catalog page number
        #[arg(default_value = "1")]
        page: u32,
    },

    /// Scrape a range of catalog pages
    Pages {
        /// First page
        start: u32,
        /// Last page (inclusive)
        end: u32,
    },

    /// Scrape the whole catalog in batches
    Batches {
        /// Pages per batch
        #[arg(default_value = "50")]
        batch_size: u32,
    },

    /// Scrape a detail page and resolve every episode
    Details {
        /// Anime slug, e.g. your-forma
        slug: String,
    },

    /// Resolve one episode's streaming link
    #[command(alias = "ep")]
    Episode {
        /// Anime slug
        slug: String,
        /// Episode number
        episode: String,
    },

    /// Scrape a ranked top-10 list (trending by default)
    #[command(alias = "top")]
    Trending {
        #[arg(long, conflicts_with = "monthly")]
        weekly: bool,
        #[arg(long)]
        monthly: bool,
    },

    /// Delete every stored streaming link of a title
    #[command(alias = "rm")]
    Remove {
        /// Anime title or slug
        #[arg(required = true)]
        title: Vec<String>,
    },

    /// Show stored data statistics
    Stats,
}

pub use commands::*;
