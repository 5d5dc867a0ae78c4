//! Disk space checks
//!
//! Used to refuse a mountlist rewrite up front when the volume cannot hold
//! the staged copy, instead of discovering it half way through the write.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

/// Information about disk space usage
#[derive(Debug, Clone)]
pub struct DiskSpaceInfo {
    /// Total disk space in bytes
    pub total_bytes: u64,
    /// Available disk space in bytes
    pub available_bytes: u64,
}

impl DiskSpaceInfo {
    /// Convert bytes to human-readable format (e.g., "1.5 MB")
    pub fn bytes_to_human(bytes: u64) -> String {
        const KB: u64 = 1024;
        const MB: u64 = 1024 * KB;
        const GB: u64 = 1024 * MB;

        if bytes >= GB {
            format!("{:.1} GB", bytes as f64 / GB as f64)
        } else if bytes >= MB {
            format!("{:.1} MB", bytes as f64 / MB as f64)
        } else if bytes >= KB {
            format!("{:.1} KB", bytes as f64 / KB as f64)
        } else {
            format!("{} B", bytes)
        }
    }
}

/// Outcome of a free-space preflight
#[derive(Debug, Clone, PartialEq)]
pub enum SpaceCheck {
    Enough,
    Short { available: u64, required: u64 },
    /// The volume could not be queried; callers proceed without the check
    Unknown(String),
}

/// Check available disk space for a given path
///
/// Linux/macOS use `statvfs`. Other platforms report an error.
#[cfg(unix)]
pub fn get_disk_space(path: &Path) -> Result<DiskSpaceInfo> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path =
        CString::new(path.as_os_str().as_bytes()).context("Failed to convert path to CString")?;

    // # Safety
    //
    // `libc::statvfs` is a plain C struct of integers, so a zeroed value is valid.
    // `c_path` outlives the call and the return value is checked.
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };

    unsafe {
        if libc::statvfs(c_path.as_ptr(), &mut stat) != 0 {
            return Err(anyhow::anyhow!(
                "Failed to get disk space for '{}': {}",
                path.display(),
                std::io::Error::last_os_error()
            ));
        }
    }

    let frsize = stat.f_frsize as u64;
    Ok(DiskSpaceInfo {
        total_bytes: stat.f_blocks as u64 * frsize,
        available_bytes: stat.f_bavail as u64 * frsize,
    })
}

#[cfg(not(unix))]
pub fn get_disk_space(path: &Path) -> Result<DiskSpaceInfo> {
    Err(anyhow::anyhow!(
        "Disk space checking is not implemented on this platform ({})",
        path.display()
    ))
}

/// Check whether `dir` can take another `required` bytes
pub fn check_room(dir: &Path, required: u64) -> SpaceCheck {
    match get_disk_space(dir) {
        Ok(space) if space.available_bytes >= required => {
            debug!(
                total = space.total_bytes,
                available = space.available_bytes,
                required,
                "Free space check passed"
            );
            SpaceCheck::Enough
        }
        Ok(space) => SpaceCheck::Short {
            available: space.available_bytes,
            required,
        },
        Err(e) => SpaceCheck::Unknown(format!("{:#}", e)),
    }
}
