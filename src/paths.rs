//! Bidirectional mapping between public request paths and store locations.

use std::path::{Component, Path, PathBuf};

use url::Url;

use crate::config::CacheSettings;
use crate::error::CacheError;

/// Fixed filename of every cached artifact.
pub const ARTIFACT_FILENAME: &str = "index.html";

/// Maps public URLs and request paths onto locations under the cache root.
///
/// Both mapping operations are pure: repeated mapping of the same input
/// always yields the same location, and no filesystem access happens here.
/// A computed location that would escape the root is refused with
/// [`CacheError::MappingOutOfRoot`].
#[derive(Debug, Clone)]
pub struct PathMapper {
    root: PathBuf,
    site_origin: String,
    base_path: String,
    cache_alias: String,
}

impl PathMapper {
    pub fn new(settings: &CacheSettings) -> Self {
        Self {
            root: settings.root.clone(),
            site_origin: settings.site_origin.trim_end_matches('/').to_string(),
            base_path: settings.base_path.clone(),
            cache_alias: settings.cache_alias.clone(),
        }
    }

    /// The cache root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a public URL (absolute or already path-only) to its artifact
    /// location: strip the site origin, collapse redundant separators,
    /// and append the artifact filename under the cache root.
    pub fn uri_to_cache_path(&self, uri: &str) -> Result<PathBuf, CacheError> {
        let path = match Url::parse(uri) {
            Ok(parsed) => parsed.path().to_string(),
            // Relative inputs are already a public path.
            Err(_) => {
                let stripped = uri.strip_prefix(self.site_origin.as_str()).unwrap_or(uri);
                stripped.to_string()
            }
        };
        self.resolve(&path)
    }

    /// Map an incoming request path to its artifact location, subtracting
    /// the site base path and a cache-alias self-reference (defends
    /// against double nesting when the site is served from a sub-path
    /// that equals the cache root's public alias).
    pub fn request_to_cache_path(&self, request_path: &str) -> Result<PathBuf, CacheError> {
        let mut path = collapse_separators(request_path);
        path = strip_path_prefix(&path, &self.base_path);
        path = strip_path_prefix(&path, &self.cache_alias);
        self.resolve(&path)
    }

    fn resolve(&self, public_path: &str) -> Result<PathBuf, CacheError> {
        let collapsed = collapse_separators(public_path);
        let trimmed = collapsed.trim_matches('/');

        let relative = Path::new(trimmed);
        if relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir))
        {
            return Err(CacheError::MappingOutOfRoot {
                input: public_path.to_string(),
            });
        }

        let mut location = self.root.clone();
        for component in relative.components() {
            if let Component::Normal(segment) = component {
                location.push(segment);
            }
        }
        location.push(ARTIFACT_FILENAME);
        Ok(location)
    }
}

/// Remove `prefix` from the front of `path` when it matches on a segment
/// boundary. `"/"` and empty prefixes are no-ops.
fn strip_path_prefix(path: &str, prefix: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return path.to_string();
    }
    match path.strip_prefix(prefix) {
        Some("") => "/".to_string(),
        Some(rest) if rest.starts_with('/') => rest.to_string(),
        _ => path.to_string(),
    }
}

fn collapse_separators(path: &str) -> String {
    let mut collapsed = String::with_capacity(path.len());
    let mut previous_was_slash = false;
    for ch in path.chars() {
        if ch == '/' {
            if !previous_was_slash {
                collapsed.push(ch);
            }
            previous_was_slash = true;
        } else {
            collapsed.push(ch);
            previous_was_slash = false;
        }
    }
    collapsed
}
