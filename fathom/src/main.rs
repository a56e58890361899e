//! Fathom user-space agent.
//!
//! Loads and attaches the eBPF probes, then runs a fixed-interval sampling
//! loop that drains the kernel counters into per-container samples and
//! emits them to stdout and, optionally, an OTLP metrics endpoint.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use fathom::metrics::{init_otlp_metrics, MetricsRecorder};
use fathom::{ContainerSample, DiskCollector};
use log::{info, warn};
use opentelemetry::metrics::MeterProvider;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::signal;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "fathom", about = "Per-container disk I/O telemetry agent")]
pub struct Args {
    /// Path to the eBPF object file
    #[arg(short, long)]
    pub bpf_path: PathBuf,

    /// Root of the host proc filesystem
    #[arg(long, default_value = "/host/proc")]
    pub proc_root: PathBuf,

    /// Sampling interval in seconds
    #[arg(short, long, default_value_t = 1)]
    pub interval: u64,

    /// Output format for drained samples
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// OTLP gRPC endpoint for metrics export
    #[arg(long)]
    pub otlp_endpoint: Option<String>,
}

fn emit(sample: &HashMap<String, ContainerSample>, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            // One line-delimited record per drain, keyed by short id.
            println!("{}", serde_json::to_string(sample)?);
        }
        OutputFormat::Text => {
            for (short_id, cs) in sample {
                println!(
                    "container={} kb_read={} kb_written={} reads={} writes={} avg_latency_ms={:.3} pids={:?}",
                    short_id,
                    cs.kb_read,
                    cs.kb_written,
                    cs.read_count,
                    cs.write_count,
                    cs.avg_latency_ms,
                    cs.pids,
                );
            }
        }
    }
    Ok(())
}

/// Fixed-cadence sampling loop.
///
/// Each cycle's processing time is subtracted from the next sleep so
/// sample boundaries stay aligned to the interval; a cycle that overruns
/// the interval clamps the next sleep to zero.
async fn sampling_loop(
    collector: &mut DiskCollector,
    interval: Duration,
    format: OutputFormat,
    recorder: Option<&MetricsRecorder>,
) -> Result<()> {
    let mut time_to_sleep = interval;

    loop {
        tokio::time::sleep(time_to_sleep).await;
        let started = Instant::now();

        match collector.drain() {
            Ok(sample) => {
                emit(&sample, format)?;
                if let Some(recorder) = recorder {
                    for (short_id, cs) in &sample {
                        recorder.record_sample(short_id, cs);
                    }
                }
            }
            Err(e) => warn!("drain failed, skipping interval: {}", e),
        }

        time_to_sleep = interval.saturating_sub(started.elapsed());
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    // Probe attachment failures are fatal; everything downstream degrades
    // gracefully instead.
    let mut collector = DiskCollector::start(&args.bpf_path, args.proc_root.clone())?;

    let (provider, recorder) = match &args.otlp_endpoint {
        Some(endpoint) => {
            let provider = init_otlp_metrics(endpoint)?;
            let recorder = MetricsRecorder::new(&provider.meter("fathom"));
            info!("exporting metrics to {}", endpoint);
            (Some(provider), Some(recorder))
        }
        None => (None, None),
    };

    let interval = Duration::from_secs(args.interval);

    tokio::select! {
        result = sampling_loop(&mut collector, interval, args.format, recorder.as_ref()) => {
            if let Err(e) = result {
                warn!("sampling loop error: {}", e);
            }
        }
        _ = signal::ctrl_c() => {
            info!("received Ctrl+C, shutting down...");
        }
    }

    if let Some(provider) = provider {
        let _ = provider.shutdown();
    }

    Ok(())
}
