//! # Telemetry
//!
//! Log events always go to stderr through `tracing_subscriber::fmt`.
//! OpenTelemetry export is opt-in.
//!
//! ## Feature matrix
//!
//! - `trace`: Enables OpenTelemetry distributed tracing (via spans).
//! - `metrics`: Enables OpenTelemetry metrics (job counters and run duration).
//! - `stdout`: Enables the stdout exporter.
//!
//! ## Feature constraints
//!
//! - The stdout exporter requires at least one of: `trace` or `metrics`.
//!
//! ## Example usage
//!
//! ```bash
//! cargo run --features trace,metrics,stdout
//! ```

// Disallow using `stdout` without `trace` or `metrics`
#[cfg(all(feature = "stdout", not(any(feature = "trace", feature = "metrics"))))]
compile_error!(
    "The 'stdout' feature requires at least one of 'trace' or 'metrics' to be enabled."
);

use tracing::Subscriber;
use tracing_subscriber::{
    EnvFilter, Layer, fmt::time::ChronoLocal, layer::SubscriberExt, registry::LookupSpan,
    util::SubscriberInitExt,
};

#[cfg(feature = "metrics")]
use opentelemetry::metrics::{Counter, Histogram, Meter, MeterProvider};
#[cfg(feature = "metrics")]
use opentelemetry_sdk::metrics as sdkmetrics;
#[cfg(feature = "metrics")]
use std::sync::OnceLock;

#[cfg(any(feature = "metrics", feature = "trace"))]
use opentelemetry::{InstrumentationScope, KeyValue};
#[cfg(any(feature = "metrics", feature = "trace"))]
use opentelemetry_sdk::Resource;
#[cfg(any(feature = "metrics", feature = "trace"))]
use opentelemetry_semantic_conventions as semvcns;

#[cfg(feature = "trace")]
use opentelemetry::trace::TracerProvider;
#[cfg(feature = "trace")]
use opentelemetry_sdk::trace as sdktrace;

/// Exporter pipelines that must be flushed before the process exits.
///
/// Spans are exported as they close. Metrics are collected on
/// [`TelemetryProviders::shutdown`].
pub struct TelemetryProviders {
    #[cfg(feature = "trace")]
    tracer_provider: sdktrace::SdkTracerProvider,
    #[cfg(feature = "metrics")]
    meter_provider: sdkmetrics::SdkMeterProvider,
}

impl TelemetryProviders {
    fn new() -> Self {
        Self {
            #[cfg(feature = "trace")]
            tracer_provider: tracer_provider(),
            #[cfg(feature = "metrics")]
            meter_provider: meter_provider(),
        }
    }

    /// Exports whatever is still buffered and stops the exporters.
    pub fn shutdown(self) {
        #[cfg(feature = "trace")]
        {
            if let Err(e) = self.tracer_provider.shutdown() {
                tracing::warn!("Failed to shut down span export: {e}");
            }
        }

        #[cfg(feature = "metrics")]
        {
            if let Err(e) = self.meter_provider.shutdown() {
                tracing::warn!("Failed to shut down metric export: {e}");
            }
        }
    }
}

/// Installs the global subscriber: console logs on stderr, plus span and
/// metric export when those features are on.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_telemetry() -> anyhow::Result<TelemetryProviders> {
    let providers = TelemetryProviders::new();

    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(console_layer());

    #[cfg(feature = "trace")]
    let registry = registry.with(
        tracing_opentelemetry::layer()
            .with_tracer(providers.tracer_provider.tracer_with_scope(scope()))
            .with_error_records_to_exceptions(true),
    );

    #[cfg(feature = "metrics")]
    let registry = {
        init_metric_handles(&providers.meter_provider.meter_with_scope(scope()));
        registry.with(tracing_opentelemetry::MetricsLayer::new(
            providers.meter_provider.clone(),
        ))
    };

    registry.try_init()?;
    Ok(providers)
}

fn console_layer<S>() -> impl Layer<S>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_timer(ChronoLocal::rfc_3339())
}

#[cfg(any(feature = "metrics", feature = "trace"))]
fn scope() -> InstrumentationScope {
    InstrumentationScope::builder(env!("CARGO_PKG_NAME"))
        .with_version(env!("CARGO_PKG_VERSION"))
        .with_schema_url(semvcns::SCHEMA_URL)
        .build()
}

#[cfg(any(feature = "metrics", feature = "trace"))]
fn resource() -> Resource {
    Resource::builder()
        .with_service_name(env!("CARGO_PKG_NAME"))
        .with_attributes([KeyValue::new(
            semvcns::resource::SERVICE_VERSION,
            env!("CARGO_PKG_VERSION"),
        )])
        .build()
}

#[cfg(feature = "trace")]
fn tracer_provider() -> sdktrace::SdkTracerProvider {
    let builder = sdktrace::SdkTracerProvider::builder().with_resource(resource());

    #[cfg(feature = "stdout")]
    let builder = builder.with_simple_exporter(opentelemetry_stdout::SpanExporter::default());

    builder.build()
}

#[cfg(feature = "metrics")]
fn meter_provider() -> sdkmetrics::SdkMeterProvider {
    let builder = sdkmetrics::SdkMeterProvider::builder().with_resource(resource());

    #[cfg(feature = "stdout")]
    let builder = builder.with_reader(
        sdkmetrics::PeriodicReader::builder(opentelemetry_stdout::MetricExporter::default())
            .build(),
    );

    builder.build()
}

// Metric handles - only compiled when metrics feature is enabled
#[cfg(feature = "metrics")]
static JOBS_SUBMITTED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static JOBS_SUCCEEDED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static JOBS_FAILED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static JOBS_SKIPPED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static RUN_DURATION_MS: OnceLock<Histogram<f64>> = OnceLock::new();

#[cfg(feature = "metrics")]
fn init_metric_handles(meter: &Meter) {
    let _ = JOBS_SUBMITTED.set(
        meter
            .u64_counter("jobs_submitted")
            .with_description("Jobs handed to the worker pool")
            .build(),
    );

    let _ = JOBS_SUCCEEDED.set(
        meter
            .u64_counter("jobs_succeeded")
            .with_description("Jobs that produced a value")
            .build(),
    );

    let _ = JOBS_FAILED.set(
        meter
            .u64_counter("jobs_failed")
            .with_description("Jobs whose task function failed")
            .build(),
    );

    let _ = JOBS_SKIPPED.set(
        meter
            .u64_counter("jobs_skipped")
            .with_description("Jobs never processed because the run was cancelled")
            .build(),
    );

    let _ = RUN_DURATION_MS.set(
        meter
            .f64_histogram("run_duration")
            .with_unit("ms")
            .with_description("End-to-end duration of a pool run")
            .build(),
    );
}

// Convenience functions that compile to no-ops when metrics are disabled
#[cfg(feature = "metrics")]
pub fn increment_jobs_submitted(count: u64) {
    if let Some(counter) = JOBS_SUBMITTED.get() {
        counter.add(count, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_jobs_submitted(_count: u64) {}

#[cfg(feature = "metrics")]
pub fn increment_jobs_succeeded() {
    if let Some(counter) = JOBS_SUCCEEDED.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_jobs_succeeded() {}

#[cfg(feature = "metrics")]
pub fn increment_jobs_failed() {
    if let Some(counter) = JOBS_FAILED.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_jobs_failed() {}

#[cfg(feature = "metrics")]
pub fn increment_jobs_skipped(count: u64) {
    if let Some(counter) = JOBS_SKIPPED.get() {
        counter.add(count, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_jobs_skipped(_count: u64) {}

#[cfg(feature = "metrics")]
pub fn record_run_duration(duration_ms: f64) {
    if let Some(histogram) = RUN_DURATION_MS.get() {
        histogram.record(duration_ms, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn record_run_duration(_duration_ms: f64) {}
