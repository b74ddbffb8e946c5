//! The cache engine: one explicit value owning the whole pipeline.
//!
//! Constructed once with injected configuration; the host wires its
//! render path and change notifications to the methods here instead of
//! any ambient global state.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use metrics::counter;
use tracing::info;

use crate::config::CacheSettings;
use crate::error::CacheError;
use crate::paths::PathMapper;
use crate::policy::{CachePolicy, RequestContext, VetoPredicate};
use crate::purge::{Invalidator, PurgeReport};
use crate::rewrite;
use crate::store::StoreWriter;
use crate::telemetry::{METRIC_PURGE_ERROR, METRIC_PURGE_SINGLE, METRIC_PURGE_SWEEP};

/// Builder for [`CacheEngine`]; veto predicates are registered here,
/// before the policy is frozen behind the engine.
pub struct CacheEngineBuilder {
    settings: CacheSettings,
    vetoes: Vec<VetoPredicate>,
}

impl CacheEngineBuilder {
    /// Register a cachability veto predicate; predicates run in
    /// registration order and can only further restrict the decision.
    pub fn veto(
        mut self,
        predicate: impl Fn(&RequestContext) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.vetoes.push(Box::new(predicate));
        self
    }

    /// Build the engine, creating the cache root directory.
    pub fn build(self) -> Result<CacheEngine, CacheError> {
        std::fs::create_dir_all(&self.settings.root).map_err(|source| {
            CacheError::StoreUnwritable {
                path: self.settings.root.clone(),
                source,
            }
        })?;

        let mut policy = CachePolicy::new(self.settings.exempt_substrings.clone());
        for veto in self.vetoes {
            policy.register_veto(veto);
        }
        let policy = Arc::new(policy);

        let mapper = PathMapper::new(&self.settings);
        let writer = StoreWriter::new(mapper.clone(), policy.clone());
        let invalidator = Invalidator::new(mapper.clone());

        info!(root = %self.settings.root.display(), "cache engine initialized");

        Ok(CacheEngine {
            settings: self.settings,
            mapper,
            policy,
            writer,
            invalidator,
        })
    }
}

/// Full-page output cache engine.
pub struct CacheEngine {
    settings: CacheSettings,
    mapper: PathMapper,
    policy: Arc<CachePolicy>,
    writer: StoreWriter,
    invalidator: Invalidator,
}

impl CacheEngine {
    /// Start building an engine with custom veto predicates.
    pub fn builder(settings: CacheSettings) -> CacheEngineBuilder {
        CacheEngineBuilder {
            settings,
            vetoes: Vec::new(),
        }
    }

    /// Build an engine with no extra vetoes.
    pub fn new(settings: CacheSettings) -> Result<Self, CacheError> {
        Self::builder(settings).build()
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    pub fn mapper(&self) -> &PathMapper {
        &self.mapper
    }

    /// Whether the response for `ctx` is eligible for the cache.
    pub fn is_cachable(&self, ctx: &RequestContext) -> bool {
        self.policy.is_cachable(ctx)
    }

    /// Capture rendered output near request end. Persists a static
    /// artifact when cachable and always hands the output straight back.
    pub async fn capture_and_store(&self, output: Bytes, ctx: &RequestContext) -> Bytes {
        self.writer.capture_and_store(output, ctx).await
    }

    /// Purge the artifact for one public URL (and the root view).
    pub async fn purge_single(&self, url: &str) -> Result<(), CacheError> {
        counter!(METRIC_PURGE_SINGLE).increment(1);
        self.invalidator.purge_single(url).await.inspect_err(|_| {
            counter!(METRIC_PURGE_ERROR).increment(1);
        })
    }

    /// Purge the entire cache root, leaving the root directory in place.
    pub async fn purge_all(&self) -> PurgeReport {
        counter!(METRIC_PURGE_SWEEP).increment(1);
        let report = self.invalidator.purge_all().await;
        if !report.is_clean() {
            counter!(METRIC_PURGE_ERROR).increment(report.failures.len() as u64);
        }
        info!(
            removed_files = report.removed_files,
            removed_dirs = report.removed_dirs,
            failures = report.failures.len(),
            "cache root swept"
        );
        report
    }

    /// Purge one subtree under the cache root, directory included.
    pub async fn purge_tree(&self, dir: &Path) -> Result<PurgeReport, CacheError> {
        let report = self.invalidator.purge_tree(dir).await?;
        if !report.is_clean() {
            counter!(METRIC_PURGE_ERROR).increment(report.failures.len() as u64);
        }
        Ok(report)
    }

    /// Prepend this engine's rewrite block to an existing server ruleset.
    pub fn rewrite_rules(&self, existing: &str) -> String {
        rewrite::prepend_rules(existing, &self.settings.base_path, &self.settings.cache_alias)
    }
}
