//! Fathom eBPF probes for VFS layer I/O accounting.
//!
//! Kprobe/kretprobe pairs on `vfs_read` and `vfs_write` record per-thread
//! and per-file cumulative counters in kernel maps. Entry probes stash the
//! requested size, a timestamp, and up to three path components under the
//! calling thread id; return probes fold the completed operation into the
//! cumulative maps and delete the scratch entry. User space drains
//! `COUNTS_BY_PID` periodically.

#![no_std]
#![no_main]

mod vmlinux;

use aya_ebpf::{
    bindings::BPF_NOEXIST,
    cty::c_long,
    helpers::{
        bpf_get_current_pid_tgid, bpf_ktime_get_ns, bpf_probe_read_kernel,
        bpf_probe_read_kernel_str_bytes,
    },
    macros::{kprobe, kretprobe, map},
    maps::HashMap,
    programs::{ProbeContext, RetProbeContext},
};
use fathom_common::{FileCounters, FileKey, IoOp, PendingIo, PidCounters, DNAME_LEN};
use vmlinux::{dentry, file};

const S_IFMT: u16 = 0o170000;
const S_IFREG: u16 = 0o100000;

/// In-flight operations awaiting their return probe, keyed by thread id.
/// Synchronous read/write calls cannot interleave on one thread, so at
/// most one entry is live per key.
#[map]
static PENDING: HashMap<u32, PendingIo> = HashMap::with_max_entries(10240, 0);

/// Cumulative per-thread counters. Cleared by user space on each drain.
#[map]
static COUNTS_BY_PID: HashMap<u32, PidCounters> = HashMap::with_max_entries(10240, 0);

/// Cumulative per-file counters. Not drained; retained for future use.
#[map]
static COUNTS_BY_FILE: HashMap<FileKey, FileCounters> = HashMap::with_max_entries(10240, 0);

/// Entry probe shared by `vfs_read` and `vfs_write`.
///
/// Filters to regular files with a non-empty name, then records the
/// requested size, an entry timestamp, and the file name plus two ancestor
/// directory names. Any stale unmatched entry for this thread is
/// overwritten.
fn try_rw_entry(ctx: &ProbeContext) -> Result<(), c_long> {
    let file: *const file = ctx.arg(0).ok_or(-1)?;
    let count: u64 = ctx.arg(2).ok_or(-1)?;

    let inode = unsafe { bpf_probe_read_kernel(&(*file).f_inode) }?;
    let mode = unsafe { bpf_probe_read_kernel(&(*inode).i_mode) }?;
    if mode & S_IFMT != S_IFREG {
        return Ok(());
    }

    let de = unsafe { bpf_probe_read_kernel(&(*file).f_path.dentry) }?;
    let d_name = unsafe { bpf_probe_read_kernel(&(*de).d_name) }?;
    if d_name.len() == 0 {
        return Ok(());
    }

    let mut pending = PendingIo {
        ts_ns: unsafe { bpf_ktime_get_ns() },
        size: count as u32,
        _pad: 0,
        name: [0; DNAME_LEN],
        parent: [0; DNAME_LEN],
        grandparent: [0; DNAME_LEN],
    };
    unsafe { bpf_probe_read_kernel_str_bytes(d_name.name, &mut pending.name) }?;

    // Fixed-depth parent walk: two ancestor levels, no more. Missing
    // ancestors leave their buffers zeroed.
    let parent: *mut dentry = unsafe { bpf_probe_read_kernel(&(*de).d_parent) }?;
    if !parent.is_null() {
        let p_name = unsafe { bpf_probe_read_kernel(&(*parent).d_name) }?;
        let _ = unsafe { bpf_probe_read_kernel_str_bytes(p_name.name, &mut pending.parent) };

        let grandparent: *mut dentry = unsafe { bpf_probe_read_kernel(&(*parent).d_parent) }?;
        if !grandparent.is_null() {
            let g_name = unsafe { bpf_probe_read_kernel(&(*grandparent).d_name) }?;
            let _ =
                unsafe { bpf_probe_read_kernel_str_bytes(g_name.name, &mut pending.grandparent) };
        }
    }

    let tid = bpf_get_current_pid_tgid() as u32;
    PENDING.insert(&tid, &pending, 0)?;

    Ok(())
}

/// Return probe shared by both ops; which counters to bump is fixed by the
/// registering program, not inferred at runtime.
fn try_rw_return(op: IoOp) -> Result<(), c_long> {
    let tid = bpf_get_current_pid_tgid() as u32;

    // No pending entry: the probe pair attached while this call was
    // already in flight. Drop the sample.
    let pending = match unsafe { PENDING.get(&tid) } {
        Some(p) => *p,
        None => return Ok(()),
    };
    let elapsed_us = unsafe { bpf_ktime_get_ns() }.saturating_sub(pending.ts_ns) / 1000;
    let _ = PENDING.remove(&tid);

    let counters = get_or_create_pid(tid)?;
    unsafe {
        match op {
            IoOp::Read => {
                (*counters).read_count += 1;
                (*counters).read_bytes += pending.size as u64;
            }
            IoOp::Write => {
                (*counters).write_count += 1;
                (*counters).write_bytes += pending.size as u64;
            }
        }
        (*counters).latency_sum_us += elapsed_us;
    }

    let key = FileKey {
        name: pending.name,
        parent: pending.parent,
        grandparent: pending.grandparent,
    };
    let file_counters = get_or_create_file(&key)?;
    unsafe {
        match op {
            IoOp::Read => {
                (*file_counters).read_count += 1;
                (*file_counters).read_bytes += pending.size as u64;
            }
            IoOp::Write => {
                (*file_counters).write_count += 1;
                (*file_counters).write_bytes += pending.size as u64;
            }
        }
    }

    Ok(())
}

/// Get-or-create for `COUNTS_BY_PID`. `BPF_NOEXIST` keeps a racing creator
/// on another CPU from being clobbered; per-key update atomicity is the
/// map's guarantee.
#[inline(always)]
fn get_or_create_pid(tid: u32) -> Result<*mut PidCounters, c_long> {
    if let Some(counters) = COUNTS_BY_PID.get_ptr_mut(&tid) {
        return Ok(counters);
    }
    let zero = PidCounters::new(tid);
    let _ = COUNTS_BY_PID.insert(&tid, &zero, BPF_NOEXIST as u64);
    COUNTS_BY_PID.get_ptr_mut(&tid).ok_or(-1)
}

#[inline(always)]
fn get_or_create_file(key: &FileKey) -> Result<*mut FileCounters, c_long> {
    if let Some(counters) = COUNTS_BY_FILE.get_ptr_mut(key) {
        return Ok(counters);
    }
    let zero = FileCounters::default();
    let _ = COUNTS_BY_FILE.insert(key, &zero, BPF_NOEXIST as u64);
    COUNTS_BY_FILE.get_ptr_mut(key).ok_or(-1)
}

#[kprobe]
pub fn vfs_read_entry(ctx: ProbeContext) -> u32 {
    match try_rw_entry(&ctx) {
        Ok(()) | Err(_) => 0,
    }
}

#[kretprobe]
pub fn vfs_read_exit(_ctx: RetProbeContext) -> u32 {
    match try_rw_return(IoOp::Read) {
        Ok(()) | Err(_) => 0,
    }
}

#[kprobe]
pub fn vfs_write_entry(ctx: ProbeContext) -> u32 {
    match try_rw_entry(&ctx) {
        Ok(()) | Err(_) => 0,
    }
}

#[kretprobe]
pub fn vfs_write_exit(_ctx: RetProbeContext) -> u32 {
    match try_rw_return(IoOp::Write) {
        Ok(()) | Err(_) => 0,
    }
}

#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    unsafe { core::hint::unreachable_unchecked() }
}
