//! Request filtering for browser pages.
//!
//! Every page in a [`PagePool`](super::PagePool) owns a [`ResourceGate`]. The
//! interception loop asks it for a [`GateDecision`] per request; nothing is
//! remembered between requests.

use serde::{Deserialize, Serialize};

/// Coarse request classification, mirroring the CDP resource types that matter here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Document,
    Stylesheet,
    Image,
    Media,
    Font,
    Script,
    Xhr,
    Fetch,
    WebSocket,
    Manifest,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Continue,
    Abort,
}

/// Hosts and URL fragments that are never worth loading.
pub const TRACKER_BLOCKLIST: &[&str] = &[
    "google-analytics",
    "googletagmanager",
    "doubleclick",
    "googlesyndication",
    "adsystem",
    "facebook.com",
    "twitter.com",
    "instagram.com",
    "tiktok.com",
];

/// Static asset suffixes dropped by the strict profile regardless of resource type.
const ASSET_SUFFIXES: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".webp", ".svg", ".ico", ".mp4", ".mp3", ".css", ".woff",
    ".woff2",
];

/// Per-page request policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceGate {
    blocked_kinds: Vec<ResourceKind>,
    block_asset_urls: bool,
}

impl ResourceGate {
    /// Catalog pages keep images so lazy poster URLs resolve.
    #[must_use]
    pub fn catalog() -> Self {
        Self {
            blocked_kinds: vec![
                ResourceKind::Font,
                ResourceKind::Media,
                ResourceKind::Stylesheet,
            ],
            block_asset_urls: false,
        }
    }

    /// Detail pages only need markup and scripts.
    #[must_use]
    pub fn detail() -> Self {
        Self {
            blocked_kinds: vec![
                ResourceKind::Image,
                ResourceKind::Font,
                ResourceKind::Media,
                ResourceKind::Stylesheet,
            ],
            block_asset_urls: false,
        }
    }

    /// Episode pages: everything except documents, scripts and XHR.
    #[must_use]
    pub fn episode() -> Self {
        Self {
            blocked_kinds: vec![
                ResourceKind::Image,
                ResourceKind::Font,
                ResourceKind::Media,
                ResourceKind::Stylesheet,
                ResourceKind::WebSocket,
                ResourceKind::Manifest,
            ],
            block_asset_urls: true,
        }
    }

    #[must_use]
    pub fn decide(&self, kind: ResourceKind, url: &str) -> GateDecision {
        if self.blocked_kinds.contains(&kind) {
            return GateDecision::Abort;
        }

        let lower = url.to_lowercase();
        if TRACKER_BLOCKLIST.iter().any(|needle| lower.contains(needle)) {
            return GateDecision::Abort;
        }

        if self.block_asset_urls && kind != ResourceKind::Document {
            let path = lower.split(['?', '#']).next().unwrap_or(&lower);
            if ASSET_SUFFIXES.iter().any(|suffix| path.ends_with(suffix)) {
                return GateDecision::Abort;
            }
        }

        GateDecision::Continue
    }
}
