pub mod anime;
pub mod streaming_link;

use serde::Serialize;

/// Outcome of a bulk upsert, counted against the rows present before it ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpsertCounts {
    pub inserted: u64,
    pub modified: u64,
}

impl UpsertCounts {
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.inserted + self.modified
    }
}

pub(crate) fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}
