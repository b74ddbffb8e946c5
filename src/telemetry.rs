//! Tracing installation and metric registration for host binaries.

use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing::level_filters::LevelFilter;
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::error::CacheError;

pub const METRIC_STORE_WRITE: &str = "calco_store_write_total";
pub const METRIC_STORE_SKIP: &str = "calco_store_skip_total";
pub const METRIC_STORE_ERROR: &str = "calco_store_error_total";
pub const METRIC_PURGE_SINGLE: &str = "calco_purge_single_total";
pub const METRIC_PURGE_SWEEP: &str = "calco_purge_sweep_total";
pub const METRIC_PURGE_ERROR: &str = "calco_purge_error_total";

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Compact,
}

/// Install a global tracing subscriber. Hosts with their own subscriber
/// should call [`describe_metrics`] only.
pub fn init(level: LevelFilter, format: LogFormat) -> Result<(), CacheError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let fmt_layer = match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            CacheError::Telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

/// Register metric descriptions with the installed recorder.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_STORE_WRITE,
            Unit::Count,
            "Total number of artifacts written to the cache store."
        );
        describe_counter!(
            METRIC_STORE_SKIP,
            Unit::Count,
            "Total number of responses skipped by the store writer."
        );
        describe_counter!(
            METRIC_STORE_ERROR,
            Unit::Count,
            "Total number of failed artifact writes."
        );
        describe_counter!(
            METRIC_PURGE_SINGLE,
            Unit::Count,
            "Total number of single-entry purges."
        );
        describe_counter!(
            METRIC_PURGE_SWEEP,
            Unit::Count,
            "Total number of full cache sweeps."
        );
        describe_counter!(
            METRIC_PURGE_ERROR,
            Unit::Count,
            "Total number of purge failures (logged and continued)."
        );
    });
}
