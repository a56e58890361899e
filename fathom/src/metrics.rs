//! Metrics module for exporting container samples via OpenTelemetry.
//!
//! Provides [`MetricsRecorder`] for translating [`ContainerSample`]s into
//! OTel metrics and [`init_otlp_metrics`] for bootstrapping the OTLP gRPC
//! export pipeline.

use crate::sample::ContainerSample;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::KeyValue;

/// Get the system hostname.
fn get_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Records per-container disk I/O metrics using OpenTelemetry instruments.
///
/// Three instruments are maintained:
///
/// | Metric                    | Type      | Unit | Description                      |
/// |---------------------------|-----------|------|----------------------------------|
/// | `fathom.disk.kilobytes`   | Counter   | kBy  | Kilobytes transferred            |
/// | `fathom.disk.operations`  | Counter   | 1    | Read/write call counts           |
/// | `fathom.disk.latency`     | Histogram | ms   | Per-container average latency    |
///
/// The counters carry `container`, `op`, `hostname` attributes; the
/// histogram carries `container`, `hostname`.
pub struct MetricsRecorder {
    disk_kilobytes: Counter<u64>,
    disk_operations: Counter<u64>,
    disk_latency: Histogram<f64>,
    hostname: String,
}

impl MetricsRecorder {
    /// Create a new `MetricsRecorder` using the system hostname.
    pub fn new(meter: &Meter) -> Self {
        Self::with_hostname(meter, get_hostname())
    }

    /// Create a new `MetricsRecorder` with an explicit hostname.
    ///
    /// This is primarily useful for testing where a deterministic hostname
    /// is desirable.
    pub fn with_hostname(meter: &Meter, hostname: String) -> Self {
        let disk_kilobytes = meter
            .u64_counter("fathom.disk.kilobytes")
            .with_description("Kilobytes transferred")
            .with_unit("kBy")
            .build();

        let disk_operations = meter
            .u64_counter("fathom.disk.operations")
            .with_description("Read/write call counts")
            .with_unit("1")
            .build();

        let disk_latency = meter
            .f64_histogram("fathom.disk.latency")
            .with_description("Per-container average I/O latency")
            .with_unit("ms")
            .build();

        Self {
            disk_kilobytes,
            disk_operations,
            disk_latency,
            hostname,
        }
    }

    /// Record metrics for one container sample from a drain cycle.
    pub fn record_sample(&self, short_id: &str, sample: &ContainerSample) {
        let read_attrs = [
            KeyValue::new("container", short_id.to_string()),
            KeyValue::new("op", "read"),
            KeyValue::new("hostname", self.hostname.clone()),
        ];
        let write_attrs = [
            KeyValue::new("container", short_id.to_string()),
            KeyValue::new("op", "write"),
            KeyValue::new("hostname", self.hostname.clone()),
        ];

        self.disk_kilobytes.add(sample.kb_read, &read_attrs);
        self.disk_kilobytes.add(sample.kb_written, &write_attrs);
        self.disk_operations.add(sample.read_count, &read_attrs);
        self.disk_operations.add(sample.write_count, &write_attrs);

        let latency_attrs = [
            KeyValue::new("container", short_id.to_string()),
            KeyValue::new("hostname", self.hostname.clone()),
        ];
        self.disk_latency
            .record(sample.avg_latency_ms, &latency_attrs);
    }
}

/// Initialise an OTLP gRPC metrics export pipeline.
///
/// Returns a [`SdkMeterProvider`](opentelemetry_sdk::metrics::SdkMeterProvider)
/// that **must** be kept alive for the duration of the program.  Call
/// [`shutdown()`](opentelemetry_sdk::metrics::SdkMeterProvider::shutdown)
/// before dropping to flush any remaining data.
pub fn init_otlp_metrics(
    endpoint: &str,
) -> anyhow::Result<opentelemetry_sdk::metrics::SdkMeterProvider> {
    use opentelemetry_otlp::{MetricExporter, WithExportConfig};
    use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};

    let exporter = MetricExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let reader = PeriodicReader::builder(exporter).build();

    let provider = SdkMeterProvider::builder()
        .with_reader(reader)
        .build();

    Ok(provider)
}
