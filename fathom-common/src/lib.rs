//! Common types shared between the eBPF probes and user-space agent.
//!
//! This crate is `no_std` compatible so it can be used in eBPF programs.

#![no_std]

/// Maximum length of a captured path component.
///
/// Matches the kernel's inline dentry name length (`DNAME_INLINE_LEN`).
/// Longer names are truncated, so two differently-located files with the
/// same truncated components can alias to one [`FileKey`]. Accepted.
pub const DNAME_LEN: usize = 32;

/// I/O operation type.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IoOp {
    Read = 0,
    Write = 1,
}

/// Scratch row correlating one in-flight read or write, keyed by thread id.
///
/// Created by the entry probe, consumed and deleted by the matching return
/// probe. Never observed from user space. A thread that dies between entry
/// and return leaks its row; the map size bounds the leak.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct PendingIo {
    /// Monotonic timestamp taken at entry (nanoseconds).
    pub ts_ns: u64,
    /// Requested byte count of the read or write.
    pub size: u32,
    pub _pad: u32,
    /// File name, truncated.
    pub name: [u8; DNAME_LEN],
    /// Parent directory name, truncated.
    pub parent: [u8; DNAME_LEN],
    /// Grandparent directory name, truncated.
    pub grandparent: [u8; DNAME_LEN],
}

/// Cumulative per-thread I/O counters, keyed by thread id.
///
/// Mutated only by the return probes; read and cleared only by the
/// engine's drain. A row is created by a matched return and incremented
/// immediately after, but a concurrent snapshot can observe it before
/// the first increment lands; see [`PidCounters::has_activity`].
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct PidCounters {
    pub pid: u32,
    pub _pad: u32,
    pub read_count: u64,
    pub write_count: u64,
    pub read_bytes: u64,
    pub write_bytes: u64,
    /// Sum of entry-to-return latencies (microseconds).
    pub latency_sum_us: u64,
}

impl PidCounters {
    /// False only for a row observed in the window between its creation
    /// by the return probe and its first increment.
    pub const fn has_activity(&self) -> bool {
        self.read_count + self.write_count > 0
    }

    pub const fn new(pid: u32) -> Self {
        Self {
            pid,
            _pad: 0,
            read_count: 0,
            write_count: 0,
            read_bytes: 0,
            write_bytes: 0,
            latency_sum_us: 0,
        }
    }
}

/// Truncated-path approximation of a file's identity.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct FileKey {
    pub name: [u8; DNAME_LEN],
    pub parent: [u8; DNAME_LEN],
    pub grandparent: [u8; DNAME_LEN],
}

/// Cumulative per-file I/O counters, keyed by [`FileKey`].
///
/// Maintained alongside [`PidCounters`] but not drained by the engine;
/// kept for future per-file reporting.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct FileCounters {
    pub read_count: u64,
    pub write_count: u64,
    pub read_bytes: u64,
    pub write_bytes: u64,
}

#[cfg(feature = "user")]
unsafe impl aya::Pod for PidCounters {}

#[cfg(feature = "user")]
unsafe impl aya::Pod for FileKey {}

#[cfg(feature = "user")]
unsafe impl aya::Pod for FileCounters {}
