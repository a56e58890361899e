//! Disk telemetry engine: probe attachment and the snapshot-and-clear
//! drain protocol.

use anyhow::{Context, Result};
use aya::{maps::HashMap as BpfHashMap, programs::KProbe, Ebpf};
use aya_log::EbpfLogger;
use fathom_common::PidCounters;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::container::ContainerResolver;
use crate::sample::{aggregate_by_container, ContainerSample, ProcessSample};

/// The four probe programs and the kernel functions they attach to.
const PROBES: [(&str, &str); 4] = [
    ("vfs_read_entry", "vfs_read"),
    ("vfs_read_exit", "vfs_read"),
    ("vfs_write_entry", "vfs_write"),
    ("vfs_write_exit", "vfs_write"),
];

/// Per-container disk I/O collector.
///
/// A value of this type is always in the attached state: [`start`] is the
/// only constructor and it attaches all four probes, so a drain before
/// attachment is unrepresentable. Probes stay attached for the life of the
/// process; there is no detach.
///
/// [`start`]: DiskCollector::start
pub struct DiskCollector {
    bpf: Ebpf,
    resolver: ContainerResolver,
}

impl DiskCollector {
    /// Load the eBPF object and attach the read/write probe pairs.
    ///
    /// Fatal if the kernel rejects loading or attachment (unsupported
    /// kernel, insufficient privilege); callers should not retry.
    pub fn start(bpf_path: &Path, proc_root: PathBuf) -> Result<Self> {
        let data = std::fs::read(bpf_path)
            .with_context(|| format!("failed to read eBPF object file: {:?}", bpf_path))?;
        let mut bpf = Ebpf::load(&data).context("failed to load eBPF object")?;

        // Optional; the probes ship no log maps today.
        if let Err(e) = EbpfLogger::init(&mut bpf) {
            debug!("eBPF logger unavailable: {}", e);
        }

        for (name, target) in PROBES {
            let program: &mut KProbe = bpf
                .program_mut(name)
                .with_context(|| format!("program {} not found in eBPF object", name))?
                .try_into()?;
            program.load()?;
            program
                .attach(target, 0)
                .with_context(|| format!("failed to attach {} to {}", name, target))?;
            info!("attached {} to {}", name, target);
        }

        Ok(Self {
            bpf,
            resolver: ContainerResolver::new(proc_root),
        })
    }

    /// Snapshot-and-clear: return one interval's activity keyed by short
    /// container id.
    ///
    /// Per-process resolution failures never surface here; those rows are
    /// pooled into the sentinel bucket. Only kernel map access errors are
    /// returned.
    pub fn drain(&mut self) -> Result<HashMap<String, ContainerSample>> {
        let mut counts: BpfHashMap<_, u32, PidCounters> = BpfHashMap::try_from(
            self.bpf
                .map_mut("COUNTS_BY_PID")
                .context("COUNTS_BY_PID map not found")?,
        )?;

        let mut rows = Vec::new();
        for entry in counts.iter() {
            match entry {
                // A row can be snapshotted in the window between its
                // creation by the return probe and its first increment;
                // it carries no events yet, so skip it. This also keeps
                // the latency divisor at least 1.
                Ok((_tid, counters)) if counters.has_activity() => rows.push(counters),
                Ok(_) => {}
                Err(e) => warn!("skipping unreadable counter row: {}", e),
            }
        }

        let samples: Vec<ProcessSample> = rows
            .iter()
            .map(|row| ProcessSample::from_counters(row, self.resolver.resolve(row.pid)))
            .collect();

        // Clear only now that the snapshot is fully consumed; counts that
        // land between the snapshot and the clear are lost.
        let keys: Vec<u32> = counts.keys().filter_map(|k| k.ok()).collect();
        for key in &keys {
            if let Err(e) = counts.remove(key) {
                warn!("failed to clear counter row {}: {}", key, e);
            }
        }

        Ok(aggregate_by_container(samples))
    }
}
