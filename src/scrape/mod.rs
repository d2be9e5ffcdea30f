//! Headless-browser extraction: catalog tiles, detail pages, episode players
//! and ranked charts.
//!
//! Pure parsers work on HTML snapshots so they can be tested against
//! fixtures; the async wrappers only drive a [`BrowserPage`].

pub mod barrier;
pub mod catalog;
pub mod detail;
pub mod error;
pub mod gate;
pub mod html;
pub mod matcher;
pub mod metadata;
pub mod page;
pub mod resolver;
pub mod retry;
pub mod session;
pub mod trending;

#[cfg(test)]
pub mod testing;

pub use error::ScrapeError;
pub use gate::ResourceGate;
pub use page::{BrowserPage, ChromePage, Pacing};
pub use retry::RetryPolicy;
pub use session::{ChromeLauncher, PagePool, ScraperSession, SessionLauncher, with_session};
