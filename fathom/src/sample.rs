//! Sample types produced by a drain cycle and the container rollup.

use fathom_common::PidCounters;
use serde::Serialize;
use std::collections::HashMap;

/// Conventional display length of a container id.
pub const SHORT_ID_LEN: usize = 12;

/// One process's I/O activity for a single drain interval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessSample {
    pub pid: u32,
    pub kb_read: u64,
    pub kb_written: u64,
    pub read_count: u64,
    pub write_count: u64,
    pub avg_latency_ms: f64,
    pub container_id: String,
}

impl ProcessSample {
    /// Scale one kernel counter row into a sample.
    ///
    /// Callers must not pass a row with zero events; the drain filters
    /// those out, so the latency divisor is always at least 1.
    pub fn from_counters(counters: &PidCounters, container_id: String) -> Self {
        let ops = counters.read_count + counters.write_count;
        Self {
            pid: counters.pid,
            kb_read: counters.read_bytes / 1024,
            kb_written: counters.write_bytes / 1024,
            read_count: counters.read_count,
            write_count: counters.write_count,
            avg_latency_ms: counters.latency_sum_us as f64 / 1000.0 / ops as f64,
            container_id,
        }
    }
}

/// One container's I/O activity for a single drain interval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContainerSample {
    pub full_container_id: String,
    pub kb_read: u64,
    pub kb_written: u64,
    pub read_count: u64,
    pub write_count: u64,
    /// Mean of the member processes' average latencies.
    pub avg_latency_ms: f64,
    /// Pids folded into this sample, in drain order.
    pub pids: Vec<u32>,
}

/// Group per-process samples by short container id.
///
/// Counts and byte totals accumulate once per source row. Latencies are
/// summed during accumulation and divided by the member count only after
/// every row for the bucket has been folded in; dividing inside the loop
/// would corrupt every bucket but the last one touched.
pub fn aggregate_by_container(rows: Vec<ProcessSample>) -> HashMap<String, ContainerSample> {
    let mut containers: HashMap<String, ContainerSample> = HashMap::new();

    for row in rows {
        let short_id: String = row.container_id.chars().take(SHORT_ID_LEN).collect();
        let sample = containers
            .entry(short_id)
            .or_insert_with(|| ContainerSample {
                full_container_id: row.container_id.clone(),
                kb_read: 0,
                kb_written: 0,
                read_count: 0,
                write_count: 0,
                avg_latency_ms: 0.0,
                pids: Vec::new(),
            });
        sample.kb_read += row.kb_read;
        sample.kb_written += row.kb_written;
        sample.read_count += row.read_count;
        sample.write_count += row.write_count;
        // Running sum; divided once the bucket is complete.
        sample.avg_latency_ms += row.avg_latency_ms;
        sample.pids.push(row.pid);
    }

    for sample in containers.values_mut() {
        sample.avg_latency_ms /= sample.pids.len() as f64;
    }

    containers
}
