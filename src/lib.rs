//! Calco Page Cache
//!
//! Calco sits between a dynamic page renderer and the filesystem: it
//! captures the fully rendered output of a request, persists it as a
//! static artifact keyed by the request path, and lets a front-end web
//! server short-circuit straight to that artifact on the next request.
//!
//! The engine is a single value constructed from [`CacheSettings`]; the
//! host wires its own content-change notifications into the
//! [`EventRouter`] and (optionally) registers the daily sweep:
//!
//! ```ignore
//! let engine = Arc::new(CacheEngine::new(settings)?);
//! let router = EventRouter::new(engine.clone(), resolver);
//!
//! // On the render path:
//! let body = engine.capture_and_store(rendered, &ctx).await;
//!
//! // On content mutation:
//! router.route(ChangeEvent::ContentSaved { item_id }).await;
//! ```
//!
//! ## Configuration
//!
//! Settings load from `calco.toml` with environment overrides:
//!
//! ```toml
//! root = "page-cache"
//! exempt_substrings = ["admin", ".php", "checkout", "cart"]
//! site_origin = "https://example.com"
//! base_path = "/"
//! cache_alias = "/page-cache"
//! timezone = "UTC"
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod paths;
pub mod policy;
pub mod purge;
pub mod rewrite;
pub mod store;
pub mod sweep;
pub mod telemetry;

pub use config::CacheSettings;
pub use engine::{CacheEngine, CacheEngineBuilder};
pub use error::CacheError;
pub use events::{ChangeEvent, ContentResolver, EventRouter};
pub use paths::{ARTIFACT_FILENAME, PathMapper};
pub use policy::{CachePolicy, RequestContext};
pub use purge::{PurgeFailure, PurgeReport};
pub use store::GENERATOR_MARKER;
pub use sweep::SweepScheduler;
