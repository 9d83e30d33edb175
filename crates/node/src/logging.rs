use std::str::FromStr;

use anyhow::{Context, Result};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    metrics::{PeriodicReader, SdkMeterProvider},
    propagation::TraceContextPropagator,
    trace::SpanExporter,
};
use tracing::subscriber::Subscriber;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{
    Layer, Registry,
    layer::{Filter, SubscriberExt},
};

const SERVICE_NAME: &str = "fabric-dashboard";
const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4317";

/// Configures [`setup_tracing`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    /// OpenTelemetry configuration
    pub otel: OpenTelemetry,
    /// Stdout log format
    pub format: LogFormat,
}

/// OpenTelemetry configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenTelemetry {
    /// Export spans and metrics over OTLP/gRPC
    Enabled {
        /// Collector endpoint
        endpoint: String,
    },
    Disabled,
}

/// Stdout log format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, one line per event
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => anyhow::bail!("unknown log format {other:?}, expected \"pretty\" or \"json\""),
        }
    }
}

impl TracingConfig {
    /// Read `OTEL_ENABLED`, `OTEL_EXPORTER_OTLP_ENDPOINT` and `LOG_FORMAT`
    ///
    /// Unset or unparseable values fall back to disabled export and pretty logs.
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let otel_enabled =
            var("OTEL_ENABLED").and_then(|value| value.parse().ok()).unwrap_or(false);
        let otel = if otel_enabled {
            OpenTelemetry::Enabled {
                endpoint: var("OTEL_EXPORTER_OTLP_ENDPOINT")
                    .unwrap_or_else(|| DEFAULT_OTLP_ENDPOINT.to_string()),
            }
        } else {
            OpenTelemetry::Disabled
        };

        let format = var("LOG_FORMAT").and_then(|value| value.parse().ok()).unwrap_or_default();

        Self { otel, format }
    }
}

impl OpenTelemetry {
    pub fn is_enabled(&self) -> bool {
        matches!(self, OpenTelemetry::Enabled { .. })
    }
}

/// Initializes tracing to stdout and optionally an OpenTelemetry exporter.
///
/// Filtering defaults to `INFO` and can be configured with `RUST_LOG`.
pub fn setup_tracing(cfg: TracingConfig) -> Result<()> {
    let filter = env_or_default_filter()?;

    // The OTLP exporters need a running tokio runtime, so they are only built when enabled.
    let otel_layer = if let OpenTelemetry::Enabled { endpoint } = &cfg.otel {
        opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());
        setup_metrics_export(endpoint)?;

        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .build()
            .context("failed to build OTLP span exporter")?;
        Some(open_telemetry_layer(exporter, SERVICE_NAME))
    } else {
        None
    };

    let subscriber = Registry::default()
        .with(stdout_layer(cfg.format).with_filter(filter))
        .with(otel_layer.with_filter(env_or_default_filter()?));

    tracing::subscriber::set_global_default(subscriber).map_err(Into::into)
}

fn setup_metrics_export(endpoint: &str) -> Result<()> {
    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .context("failed to build OTLP metric exporter")?;

    let provider = SdkMeterProvider::builder()
        .with_reader(
            PeriodicReader::builder(exporter)
                .with_interval(std::time::Duration::from_secs(5))
                .build(),
        )
        .build();
    opentelemetry::global::set_meter_provider(provider);

    Ok(())
}

/// Initializes tracing to an in-memory exporter whose spans can be inspected.
///
/// Tests using this must be annotated with `#[serial(open_telemetry_tracing)]`; the subscriber
/// is process-global.
#[cfg(test)]
pub fn setup_test_tracing() -> Result<(
    tokio::sync::mpsc::UnboundedReceiver<opentelemetry_sdk::trace::SpanData>,
    tokio::sync::mpsc::UnboundedReceiver<()>,
)> {
    let (exporter, rx_export, rx_shutdown) =
        opentelemetry_sdk::testing::trace::new_tokio_test_exporter();

    let subscriber = Registry::default()
        .with(stdout_layer(LogFormat::Json).with_filter(env_or_default_filter()?))
        .with(open_telemetry_layer(exporter, "test-service").with_filter(env_or_default_filter()?));
    tracing::subscriber::set_global_default(subscriber)?;

    Ok((rx_export, rx_shutdown))
}

fn open_telemetry_layer<S>(
    exporter: impl SpanExporter + 'static,
    service_name: &'static str,
) -> Box<dyn Layer<S> + Send + Sync + 'static>
where
    S: Subscriber + Sync + Send,
    for<'a> S: tracing_subscriber::registry::LookupSpan<'a>,
{
    let provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .build();
    let tracer = provider.tracer(service_name);
    opentelemetry::global::set_tracer_provider(provider);

    OpenTelemetryLayer::new(tracer).boxed()
}

fn stdout_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync + 'static>
where
    S: Subscriber,
    for<'a> S: tracing_subscriber::registry::LookupSpan<'a>,
{
    use tracing_subscriber::fmt::format::FmtSpan;

    match format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .with_level(true)
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
            .json()
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .compact()
            .with_level(true)
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
            .boxed(),
    }
}

/// Filter from `RUST_LOG`, or `INFO` (plus HTTP request tracing) when unset
fn env_or_default_filter<S>() -> Result<Box<dyn Filter<S> + Send + Sync + 'static>> {
    use tracing::level_filters::LevelFilter;
    use tracing_subscriber::{
        EnvFilter,
        filter::{FilterExt, Targets},
    };

    match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(rust_log) => Ok(FilterExt::boxed(
            EnvFilter::from_str(&rust_log).context("RUST_LOG is not a valid filter")?,
        )),
        Err(std::env::VarError::NotUnicode(_)) => anyhow::bail!("RUST_LOG contains non-unicode"),
        Err(std::env::VarError::NotPresent) => Ok(FilterExt::boxed(
            Targets::new()
                .with_default(LevelFilter::INFO)
                .with_target("tower_http::trace", LevelFilter::DEBUG)
                .with_target("axum::rejection", LevelFilter::TRACE),
        )),
    }
}
