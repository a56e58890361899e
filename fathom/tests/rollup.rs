//! Tests for per-process sample scaling and the per-container rollup.
//!
//! Pure user-space logic; no probes or privileges required.
//!
//! Run with: `cargo test --test rollup`

use fathom::sample::{aggregate_by_container, ContainerSample, ProcessSample, SHORT_ID_LEN};
use fathom::OTHER_CONTAINER_ID;
use fathom_common::PidCounters;
use std::collections::HashMap;

fn counters(
    pid: u32,
    read_count: u64,
    write_count: u64,
    read_bytes: u64,
    write_bytes: u64,
    latency_sum_us: u64,
) -> PidCounters {
    PidCounters {
        pid,
        _pad: 0,
        read_count,
        write_count,
        read_bytes,
        write_bytes,
        latency_sum_us,
    }
}

fn row(pid: u32, container_id: &str, avg_latency_ms: f64) -> ProcessSample {
    ProcessSample {
        pid,
        kb_read: 0,
        kb_written: 0,
        read_count: 1,
        write_count: 0,
        avg_latency_ms,
        container_id: container_id.to_string(),
    }
}

/// A 64-character container id starting with `prefix`.
fn make_id(prefix: &str) -> String {
    let mut id = prefix.to_string();
    while id.len() < 64 {
        id.push('0');
    }
    id
}

#[test]
fn test_process_sample_scaling() {
    let sample = ProcessSample::from_counters(&counters(100, 1, 0, 4096, 0, 500), make_id("a"));
    assert_eq!(sample.pid, 100);
    assert_eq!(sample.kb_read, 4);
    assert_eq!(sample.kb_written, 0);
    assert_eq!(sample.read_count, 1);
    assert_eq!(sample.write_count, 0);
    assert!((sample.avg_latency_ms - 0.5).abs() < 1e-9);

    let sample = ProcessSample::from_counters(&counters(200, 0, 1, 0, 8192, 1500), make_id("a"));
    assert_eq!(sample.kb_written, 8);
    assert_eq!(sample.write_count, 1);
    assert!((sample.avg_latency_ms - 1.5).abs() < 1e-9);
}

/// Average latency divides by the total call count, reads and writes
/// combined.
#[test]
fn test_process_sample_latency_over_all_ops() {
    let sample =
        ProcessSample::from_counters(&counters(300, 3, 1, 12288, 4096, 8000), make_id("a"));
    // 8000 us over 4 calls = 2 ms.
    assert!((sample.avg_latency_ms - 2.0).abs() < 1e-9);
}

/// The end-to-end scenario: two pids in one container, one read of 4096
/// bytes at 500us and one write of 8192 bytes at 1500us.
#[test]
fn test_two_pids_roll_up_into_one_container() {
    let id = make_id("abcdef0123456789");
    let rows = vec![
        ProcessSample::from_counters(&counters(100, 1, 0, 4096, 0, 500), id.clone()),
        ProcessSample::from_counters(&counters(200, 0, 1, 0, 8192, 1500), id.clone()),
    ];

    let containers = aggregate_by_container(rows);
    assert_eq!(containers.len(), 1);

    let short_id: String = id.chars().take(SHORT_ID_LEN).collect();
    let sample = &containers[&short_id];
    assert_eq!(sample.full_container_id, id);
    assert_eq!(sample.kb_read, 4);
    assert_eq!(sample.kb_written, 8);
    assert_eq!(sample.read_count, 1);
    assert_eq!(sample.write_count, 1);
    assert!((sample.avg_latency_ms - 1.0).abs() < 1e-9);

    let mut pids = sample.pids.clone();
    pids.sort_unstable();
    assert_eq!(pids, vec![100, 200]);
}

/// Every bucket's latency must be the mean of its own members, computed
/// after all members are folded in. A running divide inside the
/// accumulation loop gets every container except the last one wrong.
#[test]
fn test_latency_mean_correct_for_every_bucket() {
    let id_a = make_id("aaaa");
    let id_b = make_id("bbbb");
    let rows = vec![
        row(1, &id_a, 1.0),
        row(2, &id_a, 2.0),
        row(3, &id_a, 6.0),
        row(4, &id_b, 10.0),
    ];

    let containers = aggregate_by_container(rows);
    assert_eq!(containers.len(), 2);

    let a = &containers[&id_a[..SHORT_ID_LEN].to_string()];
    assert!((a.avg_latency_ms - 3.0).abs() < 1e-9, "got {}", a.avg_latency_ms);

    let b = &containers[&id_b[..SHORT_ID_LEN].to_string()];
    assert!((b.avg_latency_ms - 10.0).abs() < 1e-9, "got {}", b.avg_latency_ms);
}

/// Totals, membership, and averaged latency are identical for every
/// traversal order of the same rows.
#[test]
fn test_aggregation_is_order_independent() {
    let id_a = make_id("aaaa");
    let id_b = make_id("bbbb");
    let mut rows = vec![
        row(1, &id_a, 1.5),
        row(2, &id_b, 4.0),
        row(3, &id_a, 2.5),
        row(4, &id_b, 8.0),
        row(5, &id_a, 5.0),
    ];

    let normalize = |mut m: HashMap<String, ContainerSample>| {
        for sample in m.values_mut() {
            sample.pids.sort_unstable();
        }
        let mut entries: Vec<_> = m.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    };

    let baseline = normalize(aggregate_by_container(rows.clone()));

    rows.reverse();
    assert_eq!(normalize(aggregate_by_container(rows.clone())), baseline);

    rows.rotate_left(2);
    assert_eq!(normalize(aggregate_by_container(rows)), baseline);
}

/// Each source row contributes to each counter exactly once.
#[test]
fn test_each_row_counted_once() {
    let id = make_id("cccc");
    let rows = vec![
        ProcessSample::from_counters(&counters(10, 2, 3, 2048, 3072, 5000), id.clone()),
        ProcessSample::from_counters(&counters(11, 0, 5, 0, 5120, 5000), id.clone()),
    ];

    let containers = aggregate_by_container(rows);
    let sample = &containers[&id[..SHORT_ID_LEN].to_string()];
    assert_eq!(sample.read_count, 2);
    assert_eq!(sample.write_count, 8);
    assert_eq!(sample.kb_read, 2);
    assert_eq!(sample.kb_written, 8);
}

/// Unresolved processes pool under the sentinel bucket.
#[test]
fn test_unresolved_rows_pool_under_other() {
    let rows = vec![
        row(1, OTHER_CONTAINER_ID, 2.0),
        row(2, OTHER_CONTAINER_ID, 4.0),
    ];

    let containers = aggregate_by_container(rows);
    assert_eq!(containers.len(), 1);

    // The sentinel is exactly SHORT_ID_LEN characters, so it is its own
    // short id.
    let sample = &containers[OTHER_CONTAINER_ID];
    assert_eq!(sample.full_container_id, OTHER_CONTAINER_ID);
    assert_eq!(sample.read_count, 2);
    assert!((sample.avg_latency_ms - 3.0).abs() < 1e-9);
}

/// Rows with no recorded events yet are filtered before scaling, the way
/// the drain filters its snapshot; a zero-event row reaching the divide
/// would turn the bucket average into NaN.
#[test]
fn test_rows_without_events_are_filtered_before_scaling() {
    let id = make_id("dddd");
    let snapshot = [
        counters(1, 0, 0, 0, 0, 0),
        counters(2, 1, 0, 4096, 0, 500),
    ];

    let rows: Vec<ProcessSample> = snapshot
        .iter()
        .filter(|c| c.has_activity())
        .map(|c| ProcessSample::from_counters(c, id.clone()))
        .collect();

    let containers = aggregate_by_container(rows);
    assert_eq!(containers.len(), 1);

    let sample = &containers[&id[..SHORT_ID_LEN]];
    assert_eq!(sample.pids, vec![2]);
    assert!(sample.avg_latency_ms.is_finite());
    assert!((sample.avg_latency_ms - 0.5).abs() < 1e-9);
}

/// Draining an empty counter table produces an empty mapping.
#[test]
fn test_empty_rows_produce_empty_mapping() {
    assert!(aggregate_by_container(Vec::new()).is_empty());
}
