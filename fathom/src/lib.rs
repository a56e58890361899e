//! Fathom library - per-container disk I/O telemetry.
//!
//! The [`collector::DiskCollector`] attaches kprobe/kretprobe pairs to the
//! kernel's `vfs_read` and `vfs_write` entry points and periodically drains
//! the kernel-resident per-thread counters into per-container samples,
//! attributing each process to a container via its cgroup membership file.

pub mod collector;
pub mod container;
pub mod metrics;
pub mod sample;

pub use collector::DiskCollector;
pub use container::{ContainerResolver, OTHER_CONTAINER_ID};
pub use sample::{aggregate_by_container, ContainerSample, ProcessSample, SHORT_ID_LEN};
