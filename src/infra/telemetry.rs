use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    // Logs go to stderr so rendered output on stdout stays clean.
    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

/// Register descriptions for every metric the cache emits. Idempotent.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "fragcache_render_cache_hit_total",
            Unit::Count,
            "Cacheable components served from the store."
        );
        describe_counter!(
            "fragcache_render_cache_miss_total",
            Unit::Count,
            "Cacheable components rendered fresh, including unavailable reads."
        );
        describe_counter!(
            "fragcache_render_cache_unavailable_total",
            Unit::Count,
            "Store reads that failed as unavailable or timed out."
        );
        describe_counter!(
            "fragcache_render_cache_write_total",
            Unit::Count,
            "Fresh renders written to the store."
        );
        describe_counter!(
            "fragcache_render_cache_write_failure_total",
            Unit::Count,
            "Store writes that failed or timed out."
        );
        describe_histogram!(
            "fragcache_render_cache_read_ms",
            Unit::Milliseconds,
            "Store read latency in milliseconds."
        );
        describe_counter!(
            "fragcache_store_evict_total",
            Unit::Count,
            "In-memory store evictions due to capacity."
        );
    });
}
