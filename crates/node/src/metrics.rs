use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Dashboard metrics using OpenTelemetry metrics
///
/// If [`Metrics`] needs to be shared, cloning is recommended.
#[derive(Debug, Clone)]
pub struct Metrics {
    /// [`crate::service::DashboardService`] metrics
    pub api: MetricsApi,
    /// [`crate::ledger::LedgerSession`] metrics
    pub ledger: MetricsLedger,
    /// [`crate::telemetry::TelemetryCollector`] metrics
    pub telemetry: MetricsTelemetry,
}

/// [`crate::service::DashboardService`] metrics
#[derive(Debug, Clone)]
pub struct MetricsApi {
    list_assets_count: Counter<u64>,
    list_assets_duration: Histogram<f64>,
    create_asset_count: Counter<u64>,
    create_asset_duration: Histogram<f64>,
    stats_count: Counter<u64>,
    stats_duration: Histogram<f64>,
    update_reputation_count: Counter<u64>,
    update_reputation_duration: Histogram<f64>,
}

/// [`crate::ledger::LedgerSession`] metrics
#[derive(Debug, Clone)]
pub struct MetricsLedger {
    sessions_opened: Counter<u64>,
    evaluate_count: Counter<u64>,
    evaluate_duration: Histogram<f64>,
    submit_count: Counter<u64>,
    submit_duration: Histogram<f64>,
}

/// [`crate::telemetry::TelemetryCollector`] metrics
#[derive(Debug, Clone)]
pub struct MetricsTelemetry {
    collect_count: Counter<u64>,
    collect_duration: Histogram<f64>,
    discovered_nodes: Histogram<u64>,
}

impl Metrics {
    /// Create a new instance of `Metrics`
    pub fn new(meter: &Meter) -> Self {
        Self {
            api: MetricsApi::new(meter),
            ledger: MetricsLedger::new(meter),
            telemetry: MetricsTelemetry::new(meter),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        let meter = opentelemetry::global::meter("fabric-dashboard-node");
        Self::new(&meter)
    }
}

impl MetricsApi {
    /// Create a new instance of `MetricsApi`
    pub fn new(meter: &Meter) -> Self {
        let (list_assets_count, list_assets_duration) =
            count_and_duration(meter, "api_list_assets", "ListAssets requests");
        let (create_asset_count, create_asset_duration) =
            count_and_duration(meter, "api_create_asset", "CreateAsset requests");
        let (stats_count, stats_duration) =
            count_and_duration(meter, "api_stats", "GetStats requests");
        let (update_reputation_count, update_reputation_duration) =
            count_and_duration(meter, "api_update_reputation", "reputation updates");

        Self {
            list_assets_count,
            list_assets_duration,
            create_asset_count,
            create_asset_duration,
            stats_count,
            stats_duration,
            update_reputation_count,
            update_reputation_duration,
        }
    }

    pub fn list_assets(&self) -> RequestTimer<'_> {
        request_count_measure("api.list_assets", &self.list_assets_count, &self.list_assets_duration)
    }

    pub fn create_asset(&self) -> RequestTimer<'_> {
        request_count_measure(
            "api.create_asset",
            &self.create_asset_count,
            &self.create_asset_duration,
        )
    }

    pub fn stats(&self) -> RequestTimer<'_> {
        request_count_measure("api.stats", &self.stats_count, &self.stats_duration)
    }

    pub fn update_reputation(&self) -> RequestTimer<'_> {
        request_count_measure(
            "api.update_reputation",
            &self.update_reputation_count,
            &self.update_reputation_duration,
        )
    }
}

impl MetricsLedger {
    /// Create a new instance of `MetricsLedger`
    pub fn new(meter: &Meter) -> Self {
        let sessions_opened = meter
            .u64_counter("ledger_sessions_opened")
            .with_description("Total number of ledger sessions opened")
            .build();
        let (evaluate_count, evaluate_duration) =
            count_and_duration(meter, "ledger_evaluate", "chaincode evaluate calls");
        let (submit_count, submit_duration) =
            count_and_duration(meter, "ledger_submit", "chaincode submit calls");

        Self {
            sessions_opened,
            evaluate_count,
            evaluate_duration,
            submit_count,
            submit_duration,
        }
    }

    pub fn session_opened(&self) {
        self.sessions_opened.add(1, &[]);
    }

    pub fn evaluate(&self) -> RequestTimer<'_> {
        request_count_measure("ledger.evaluate", &self.evaluate_count, &self.evaluate_duration)
    }

    pub fn submit(&self) -> RequestTimer<'_> {
        request_count_measure("ledger.submit", &self.submit_count, &self.submit_duration)
    }
}

impl MetricsTelemetry {
    /// Create a new instance of `MetricsTelemetry`
    pub fn new(meter: &Meter) -> Self {
        let (collect_count, collect_duration) =
            count_and_duration(meter, "telemetry_collect", "telemetry collections");
        let discovered_nodes = meter
            .u64_histogram("telemetry_discovered_nodes")
            .with_description("Number of allow-listed network nodes found per collection")
            .build();

        Self { collect_count, collect_duration, discovered_nodes }
    }

    pub fn collect(&self) -> RequestTimer<'_> {
        request_count_measure("telemetry.collect", &self.collect_count, &self.collect_duration)
    }

    pub fn discovered_nodes(&self, count: u64) {
        self.discovered_nodes.record(count, &[]);
    }
}

fn count_and_duration(meter: &Meter, name: &str, what: &str) -> (Counter<u64>, Histogram<f64>) {
    let counter = meter
        .u64_counter(format!("{name}_count"))
        .with_description(format!("Total number of {what}"))
        .build();
    let histogram = meter
        .f64_histogram(format!("{name}_duration"))
        .with_description(format!("Duration of {what} in seconds"))
        .with_unit("s")
        .build();
    (counter, histogram)
}

/// Measure a request
///
/// Increases the request counter and measures request duration.
fn request_count_measure<'a>(
    operation: &str,
    counter: &Counter<u64>,
    histogram: &'a Histogram<f64>,
) -> RequestTimer<'a> {
    let start = std::time::Instant::now();

    counter.add(1, &[KeyValue::new("operation", operation.to_string())]);

    RequestTimer {
        operation: operation.to_string(),
        start,
        histogram,
        finished: false,
    }
}

/// Timer for measuring request duration
pub struct RequestTimer<'a> {
    operation: String,
    start: std::time::Instant,
    histogram: &'a Histogram<f64>,
    finished: bool,
}

impl RequestTimer<'_> {
    /// Finish the request and record the duration
    pub fn finish(mut self, status: &str) {
        self.record(status);
    }

    fn record(&mut self, status: &str) {
        if self.finished {
            return;
        }
        self.finished = true;

        self.histogram.record(
            self.start.elapsed().as_secs_f64(),
            &[
                KeyValue::new("operation", self.operation.clone()),
                KeyValue::new("status", status.to_string()),
            ],
        );
    }
}

impl Drop for RequestTimer<'_> {
    fn drop(&mut self) {
        self.record("dropped");
    }
}

/// `"ok"` or `"error"` status label for a result
pub(crate) fn status_of<T, E>(result: &Result<T, E>) -> &'static str {
    if result.is_ok() { "ok" } else { "error" }
}
