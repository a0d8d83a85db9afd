//! OpenTelemetry export for tracing spans
//!
//! Enabled when `OTEL_EXPORTER_OTLP_ENDPOINT` is set; spans are shipped over
//! OTLP/gRPC in batches on the tokio runtime.

use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{runtime, trace, Resource};
use tracing::Subscriber;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::registry::LookupSpan;

use crate::error::{Error, Result};

/// Environment variable holding the collector endpoint
pub const OTLP_ENDPOINT_ENV: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

const SERVICE_NAME: &str = "podsvc-operator";

/// Whether span export was requested through the environment
pub fn otlp_enabled() -> bool {
    std::env::var(OTLP_ENDPOINT_ENV).is_ok()
}

/// Build the tracing layer that exports spans to the OTLP collector
///
/// `_subscriber` only pins the layer to the subscriber it will be added to.
pub fn init_telemetry<S>(_subscriber: &S) -> Result<OpenTelemetryLayer<S, trace::Tracer>>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    let endpoint = std::env::var(OTLP_ENDPOINT_ENV)
        .map_err(|_| Error::ConfigError(format!("{} is not set", OTLP_ENDPOINT_ENV)))?;

    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint),
        )
        .with_trace_config(trace::config().with_resource(Resource::new(vec![
            KeyValue::new("service.name", SERVICE_NAME),
            KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
        ])))
        .install_batch(runtime::Tokio)
        .map_err(|e| Error::ConfigError(format!("Failed to install OTLP pipeline: {}", e)))?;

    Ok(tracing_opentelemetry::layer().with_tracer(tracer))
}

/// Flush buffered spans before exit
pub fn shutdown_telemetry() {
    opentelemetry::global::shutdown_tracer_provider();
}
