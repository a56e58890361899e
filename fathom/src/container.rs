//! Container identity resolution from cgroup membership files.
//!
//! A process's `/proc/{pid}/cgroup` file is the sole signal for container
//! identity. Two on-disk naming conventions are recognized; everything
//! else lands in the [`OTHER_CONTAINER_ID`] bucket.

use log::debug;
use std::fs;
use std::path::PathBuf;

/// Sentinel bucket for processes whose container cannot be determined.
pub const OTHER_CONTAINER_ID: &str = "---others---";

/// Docker's systemd scope unit prefix and suffix.
const SCOPE_PREFIX: &str = "docker-";
const SCOPE_SUFFIX: &str = ".scope";

/// Resolves pids to container ids by reading `{proc_root}/{pid}/cgroup`.
pub struct ContainerResolver {
    proc_root: PathBuf,
}

impl ContainerResolver {
    pub fn new(proc_root: PathBuf) -> Self {
        Self { proc_root }
    }

    /// Resolve the container id owning `pid`.
    ///
    /// Never fails: an absent or unreadable cgroup file (process already
    /// exited, permission denied) and files with no matching line all
    /// degrade to [`OTHER_CONTAINER_ID`].
    pub fn resolve(&self, pid: u32) -> String {
        let path = self.proc_root.join(pid.to_string()).join("cgroup");
        match fs::read_to_string(&path) {
            Ok(contents) => extract_container_id(&contents)
                .unwrap_or_else(|| OTHER_CONTAINER_ID.to_string()),
            Err(e) => {
                debug!("pid {}: cannot read {}: {}", pid, path.display(), e);
                OTHER_CONTAINER_ID.to_string()
            }
        }
    }
}

/// Extract a 64-character container id from cgroup file contents.
///
/// Two schemes are attempted over the whole file, in order; the first
/// match wins:
///
/// (a) raw cgroupfs: the final `/` segment of a line is the container id.
///     Line terminators are kept, so a matching segment is exactly 65
///     characters and the id is its first 64.
///
/// (b) systemd scope: the final segment is `docker-<id>.scope`; after
///     stripping the prefix and suffix the id must be exactly 64
///     characters.
pub fn extract_container_id(contents: &str) -> Option<String> {
    for line in contents.split_inclusive('\n') {
        if !line.contains('/') {
            continue;
        }
        let segment = line.rsplit('/').next()?;
        if segment.len() == 65 {
            // The length check counts bytes; byte 64 may fall inside a
            // multi-byte character, in which case the line is malformed
            // and must not match.
            if let Some(id) = segment.get(..64) {
                return Some(id.to_string());
            }
        }
    }

    for line in contents.lines() {
        if !line.contains('/') {
            continue;
        }
        let segment = line.rsplit('/').next()?;
        if let Some(id) = segment
            .strip_prefix(SCOPE_PREFIX)
            .and_then(|s| s.strip_suffix(SCOPE_SUFFIX))
        {
            if id.len() == 64 {
                return Some(id.to_string());
            }
        }
    }

    None
}
