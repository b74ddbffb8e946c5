use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the cache engine.
///
/// None of these ever reach the rendering path: the store writer logs
/// write failures and returns the original output, and sweeps collect
/// per-entry failures into a [`crate::purge::PurgeReport`] instead of
/// aborting.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Directory creation or artifact write failed (permissions, disk full).
    #[error("cache store unwritable at {path}: {source}")]
    StoreUnwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A computed location would escape the cache root. The operation is
    /// refused before any filesystem action.
    #[error("request path {input:?} maps outside the cache root")]
    MappingOutOfRoot { input: String },

    /// An artifact or directory could not be removed during a purge.
    #[error("purge failed at {path}: {source}")]
    PurgeIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
}
