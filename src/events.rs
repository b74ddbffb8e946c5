//! Event router: maps content-change notifications to invalidator calls.
//!
//! Precise invalidation (single entry) is used wherever the affected URL
//! set is known and small; coarse invalidation (subtree/full) whenever
//! the blast radius is structurally uncertain. Never serving stale
//! content wins over cache-hit ratio.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::engine::CacheEngine;

/// Content-change notifications emitted by the host system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// A content item was created or updated.
    ContentSaved { item_id: u64 },
    /// A taxonomy term was edited.
    TermEdited { term_id: u64, taxonomy: String },
    /// A comment was posted on an item.
    CommentPosted { comment_id: u64, approved: bool },
    /// A plugin/extension was activated or deactivated.
    PluginToggled,
    /// The active theme/template changed.
    ThemeSwitched,
    /// The site-wide maintenance-mode toggle changed.
    MaintenanceToggled,
    /// The scheduled daily sweep fired.
    SweepDue,
}

/// Host-provided permalink resolution.
///
/// The content system is a black box to the cache; it alone knows how
/// identifiers map to public URLs, so the router asks it through this
/// trait instead of reaching into ambient global state.
pub trait ContentResolver: Send + Sync {
    /// Canonical URL of a content item.
    fn item_permalink(&self, item_id: u64) -> Option<String>;
    /// Listing URLs of every taxonomy term attached to the item.
    fn item_term_links(&self, item_id: u64) -> Vec<String>;
    /// Archive URL of the item's content type, if one exists.
    fn item_archive_link(&self, item_id: u64) -> Option<String>;
    /// Yearly archive URL for the item's publication year.
    fn item_year_link(&self, item_id: u64) -> Option<String>;
    /// Listing URL of a taxonomy term.
    fn term_link(&self, term_id: u64, taxonomy: &str) -> Option<String>;
    /// Canonical URL of the item a comment belongs to.
    fn comment_item_permalink(&self, comment_id: u64) -> Option<String>;
}

/// Routes change events to the engine's purge operations.
pub struct EventRouter {
    engine: Arc<CacheEngine>,
    resolver: Arc<dyn ContentResolver>,
}

impl EventRouter {
    pub fn new(engine: Arc<CacheEngine>, resolver: Arc<dyn ContentResolver>) -> Self {
        Self { engine, resolver }
    }

    pub async fn route(&self, event: ChangeEvent) {
        info!(event = ?event, "change event received");
        match event {
            ChangeEvent::ContentSaved { item_id } => self.content_saved(item_id).await,
            ChangeEvent::TermEdited { term_id, taxonomy } => {
                match self.resolver.term_link(term_id, &taxonomy) {
                    Some(url) => self.purge_url(&url).await,
                    None => debug!(term_id, taxonomy, "term has no listing URL"),
                }
            }
            ChangeEvent::CommentPosted {
                comment_id,
                approved,
            } => {
                if !approved {
                    debug!(comment_id, "unapproved comment, cache untouched");
                    return;
                }
                match self.resolver.comment_item_permalink(comment_id) {
                    Some(url) => self.purge_url(&url).await,
                    None => debug!(comment_id, "comment has no parent item"),
                }
            }
            ChangeEvent::PluginToggled
            | ChangeEvent::ThemeSwitched
            | ChangeEvent::MaintenanceToggled
            | ChangeEvent::SweepDue => {
                let report = self.engine.purge_all().await;
                info!(
                    removed_files = report.removed_files,
                    removed_dirs = report.removed_dirs,
                    failures = report.failures.len(),
                    "full purge complete"
                );
            }
        }
    }

    async fn content_saved(&self, item_id: u64) {
        if let Some(url) = self.resolver.item_permalink(item_id) {
            self.purge_url(&url).await;
        }

        for term_url in self.resolver.item_term_links(item_id) {
            self.purge_url(&term_url).await;
        }

        if let Some(url) = self.resolver.item_archive_link(item_id) {
            self.purge_url(&url).await;
        }

        // The yearly archive is a whole subtree of month/day listings;
        // its exact membership is unknown here, so over-invalidate the
        // resolved directory.
        if let Some(url) = self.resolver.item_year_link(item_id) {
            match self.engine.mapper().uri_to_cache_path(&url) {
                Ok(location) => match self.engine.purge_tree(&location).await {
                    Ok(report) => debug!(
                        url,
                        removed_files = report.removed_files,
                        "yearly archive subtree purged"
                    ),
                    Err(err) => warn!(url, error = %err, "yearly archive purge refused"),
                },
                Err(err) => warn!(url, error = %err, "yearly archive URL did not map"),
            }
        }
    }

    async fn purge_url(&self, url: &str) {
        if let Err(err) = self.engine.purge_single(url).await {
            warn!(url, error = %err, "single purge failed");
        }
    }
}
