//! Engine configuration: typed settings with layered precedence (file → env).

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;

const LOCAL_CONFIG_BASENAME: &str = "calco";
const DEFAULT_ROOT: &str = "page-cache";
const DEFAULT_SITE_ORIGIN: &str = "http://localhost";
const DEFAULT_BASE_PATH: &str = "/";
const DEFAULT_CACHE_ALIAS: &str = "/page-cache";

/// Request-path substrings that are never cachable by default: admin and
/// control surfaces, non-static script endpoints, and sensitive flows.
pub const DEFAULT_EXEMPT_SUBSTRINGS: &[&str] = &["admin", ".php", "checkout", "cart"];

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

/// Cache engine settings.
///
/// Veto predicates are code, not configuration; they are registered on
/// [`crate::engine::CacheEngineBuilder`] at construction time.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Filesystem directory acting as the cache root. Created on engine
    /// construction.
    pub root: PathBuf,
    /// Substrings marking a request path as never cachable.
    pub exempt_substrings: Vec<String>,
    /// Public origin of the site, stripped from absolute URLs when
    /// mapping them to store locations.
    pub site_origin: String,
    /// Path prefix the site is served under ("/" when at the origin root).
    pub base_path: String,
    /// Public URL alias under which the front-end server exposes the
    /// cache root.
    pub cache_alias: String,
    /// Timezone anchoring the daily full sweep to local midnight.
    pub timezone: chrono_tz::Tz,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_ROOT),
            exempt_substrings: DEFAULT_EXEMPT_SUBSTRINGS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            site_origin: DEFAULT_SITE_ORIGIN.to_string(),
            base_path: DEFAULT_BASE_PATH.to_string(),
            cache_alias: DEFAULT_CACHE_ALIAS.to_string(),
            timezone: chrono_tz::Tz::UTC,
        }
    }
}

impl CacheSettings {
    /// Load settings with layered precedence: optional `calco.toml` in the
    /// working directory, then an explicit file, then `CALCO__*` environment
    /// variables.
    pub fn load(config_file: Option<&Path>) -> Result<Self, LoadError> {
        let mut builder =
            Config::builder().add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

        if let Some(path) = config_file {
            builder = builder.add_source(File::from(path));
        }

        let settings = builder
            .add_source(Environment::with_prefix("CALCO").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let settings = CacheSettings::default();
        assert_eq!(settings.root, PathBuf::from("page-cache"));
        assert_eq!(
            settings.exempt_substrings,
            vec!["admin", ".php", "checkout", "cart"]
        );
        assert_eq!(settings.site_origin, "http://localhost");
        assert_eq!(settings.base_path, "/");
        assert_eq!(settings.cache_alias, "/page-cache");
        assert_eq!(settings.timezone, chrono_tz::Tz::UTC);
    }

    #[test]
    fn load_reads_explicit_config_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("calco.toml");
        std::fs::write(
            &file,
            "site_origin = \"https://example.com\"\n\
             base_path = \"/blog/\"\n\
             exempt_substrings = [\"admin\"]\n",
        )
        .expect("config file");

        let settings = CacheSettings::load(Some(&file)).expect("load");
        assert_eq!(settings.site_origin, "https://example.com");
        assert_eq!(settings.base_path, "/blog/");
        assert_eq!(settings.exempt_substrings, vec!["admin"]);
        // Unspecified fields keep their defaults.
        assert_eq!(settings.cache_alias, "/page-cache");
        assert_eq!(settings.timezone, chrono_tz::Tz::UTC);
    }

    #[test]
    fn environment_overrides_file_values() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("calco.toml");
        std::fs::write(&file, "root = \"from-file\"\n").expect("config file");

        // SAFETY: CALCO__ROOT is touched by this test alone, and no other
        // test asserts on `root`.
        unsafe { std::env::set_var("CALCO__ROOT", "from-env") };
        let settings = CacheSettings::load(Some(&file));
        unsafe { std::env::remove_var("CALCO__ROOT") };

        assert_eq!(
            settings.expect("load").root,
            PathBuf::from("from-env"),
            "environment layer wins over the file layer"
        );
    }

    #[test]
    fn exempt_defaults_cover_sensitive_flows() {
        for pattern in ["admin", "checkout", "cart"] {
            assert!(DEFAULT_EXEMPT_SUBSTRINGS.contains(&pattern));
        }
    }
}
