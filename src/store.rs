//! Store writer: captures rendered output and persists it as an artifact.

use std::sync::Arc;

use bytes::Bytes;
use metrics::counter;
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::CacheError;
use crate::paths::{ARTIFACT_FILENAME, PathMapper};
use crate::policy::{CachePolicy, RequestContext};
use crate::telemetry::{METRIC_STORE_ERROR, METRIC_STORE_SKIP, METRIC_STORE_WRITE};

/// Trailing marker appended to every artifact. Harmless to clients,
/// identifies generated files during diagnostics.
pub const GENERATOR_MARKER: &str = "<!--Generated by Calco-->";

/// Pages bound to a single-use security token must not be cached.
const NONCE_MARKER: &[u8] = b"nonce";

/// Persists rendered output under the cache root.
///
/// Writes are atomic: the artifact is staged in a uniquely named
/// temporary file next to its destination and renamed into place, so two
/// concurrent writes for the same path can never produce an interleaved
/// artifact — the survivor is always one complete payload.
pub struct StoreWriter {
    mapper: PathMapper,
    policy: Arc<CachePolicy>,
}

impl StoreWriter {
    pub fn new(mapper: PathMapper, policy: Arc<CachePolicy>) -> Self {
        Self { mapper, policy }
    }

    /// Capture the rendered output for `ctx` and, when cachable, persist
    /// it as a static artifact.
    ///
    /// Always returns the original output unchanged: caching never alters
    /// or delays the response to the originating request, and every write
    /// failure is logged rather than surfaced.
    pub async fn capture_and_store(&self, output: Bytes, ctx: &RequestContext) -> Bytes {
        if !self.policy.is_cachable(ctx) {
            counter!(METRIC_STORE_SKIP, "reason" => "policy").increment(1);
            return output;
        }
        if output.is_empty() {
            counter!(METRIC_STORE_SKIP, "reason" => "empty").increment(1);
            return output;
        }
        if contains_nonce(&output) {
            debug!(path = %ctx.path, "skipping cache write: output carries a one-time token");
            counter!(METRIC_STORE_SKIP, "reason" => "nonce").increment(1);
            return output;
        }

        match self.persist(&output, ctx).await {
            Ok(location) => {
                debug!(path = %ctx.path, location = %location.display(), "artifact written");
                counter!(METRIC_STORE_WRITE).increment(1);
            }
            Err(err) => {
                warn!(path = %ctx.path, error = %err, "cache write failed");
                counter!(METRIC_STORE_ERROR).increment(1);
            }
        }

        output
    }

    async fn persist(
        &self,
        output: &Bytes,
        ctx: &RequestContext,
    ) -> Result<std::path::PathBuf, CacheError> {
        let artifact = self.mapper.request_to_cache_path(&ctx.path)?;
        let parent = artifact
            .parent()
            .ok_or_else(|| CacheError::MappingOutOfRoot {
                input: ctx.path.clone(),
            })?;

        fs::create_dir_all(parent)
            .await
            .map_err(|source| CacheError::StoreUnwritable {
                path: parent.to_path_buf(),
                source,
            })?;

        let mut contents = Vec::with_capacity(output.len() + GENERATOR_MARKER.len());
        contents.extend_from_slice(output);
        contents.extend_from_slice(GENERATOR_MARKER.as_bytes());

        let staging = parent.join(format!(".{ARTIFACT_FILENAME}.{}.tmp", Uuid::new_v4()));
        if let Err(source) = fs::write(&staging, &contents).await {
            let _ = fs::remove_file(&staging).await;
            return Err(CacheError::StoreUnwritable {
                path: staging,
                source,
            });
        }

        if let Err(source) = fs::rename(&staging, &artifact).await {
            let _ = fs::remove_file(&staging).await;
            return Err(CacheError::StoreUnwritable {
                path: artifact,
                source,
            });
        }

        Ok(artifact)
    }
}

fn contains_nonce(output: &Bytes) -> bool {
    output
        .windows(NONCE_MARKER.len())
        .any(|window| window == NONCE_MARKER)
}
