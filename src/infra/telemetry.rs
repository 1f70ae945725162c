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

    let fmt_layer = match logging.format {
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
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_histogram!(
            "revalidator_resolve_ms",
            Unit::Milliseconds,
            "Route resolution latency in milliseconds."
        );
        describe_counter!(
            "revalidator_unknown_type_total",
            Unit::Count,
            "Change events whose document type has no route handler."
        );
        describe_counter!(
            "revalidator_depth_exceeded_total",
            Unit::Count,
            "Resolutions where a module chain exceeded the hop budget."
        );
        describe_counter!(
            "revalidator_full_enumeration_total",
            Unit::Count,
            "Resolutions answered with every known route."
        );
        describe_counter!(
            "revalidator_routes_invalidated_total",
            Unit::Count,
            "Routes successfully sent to the caching layer."
        );
        describe_counter!(
            "revalidator_invalidation_failed_total",
            Unit::Count,
            "Invalidation calls rejected by or unreachable at the caching layer."
        );
        describe_counter!(
            "revalidator_webhook_requests_total",
            Unit::Count,
            "Webhook deliveries by endpoint and outcome."
        );
        describe_histogram!(
            "revalidator_webhook_ms",
            Unit::Milliseconds,
            "Webhook handling latency in milliseconds by endpoint."
        );
        describe_counter!(
            "revalidator_search_records_total",
            Unit::Count,
            "Search records written or removed."
        );
    });
}
