//! Utility functions for disk space, byte formatting and file names

use serde::Serialize;
use std::path::Path;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Capacity and free space of the filesystem holding a path
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DiskUsage {
    /// Size of the filesystem
    pub total_bytes: u64,
    /// Space available to unprivileged users
    pub free_bytes: u64,
}

impl DiskUsage {
    /// Free space in gigabytes
    pub fn free_gb(&self) -> f64 {
        bytes_to_gb(self.free_bytes)
    }

    /// Filesystem size in gigabytes
    pub fn total_gb(&self) -> f64 {
        bytes_to_gb(self.total_bytes)
    }
}

/// Get disk usage for the filesystem containing the given path
///
/// Platform-specific implementation:
/// - Linux: statvfs
/// - macOS: statvfs
/// - Windows: GetDiskFreeSpaceExW
///
/// # Errors
///
/// Returns an error if the path does not exist or the platform call fails.
///
/// # Example
///
/// ```no_run
/// use chat_media_backup::utils::disk_usage;
/// use std::path::Path;
///
/// let usage = disk_usage(Path::new("/backups"))?;
/// println!("Free: {:.2} GB", usage.free_gb());
/// # Ok::<(), std::io::Error>(())
/// ```
pub fn disk_usage(path: &Path) -> std::io::Result<DiskUsage> {
    #[cfg(unix)]
    {
        use std::ffi::CString;
        use std::os::unix::ffi::OsStrExt;

        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

        // SAFETY: This is safe because:
        // 1. c_path is a valid, null-terminated C string created from the input path
        // 2. stat is properly initialized with zeroed memory before the call
        // 3. We check the return value and propagate any OS errors
        // 4. The statvfs struct is only read after a successful call
        unsafe {
            let mut stat: libc::statvfs = std::mem::zeroed();
            if libc::statvfs(c_path.as_ptr(), &mut stat) != 0 {
                return Err(std::io::Error::last_os_error());
            }

            // f_frsize is the fragment size (preferred over f_bsize)
            // f_bavail is available blocks for unprivileged users
            #[allow(clippy::unnecessary_cast)]
            let (fragment, blocks, available) = (
                stat.f_frsize as u64,
                stat.f_blocks as u64,
                stat.f_bavail as u64,
            );
            Ok(DiskUsage {
                total_bytes: blocks.saturating_mul(fragment),
                free_bytes: available.saturating_mul(fragment),
            })
        }
    }

    #[cfg(windows)]
    {
        use std::os::windows::ffi::OsStrExt;
        use winapi::um::fileapi::GetDiskFreeSpaceExW;

        let wide_path: Vec<u16> = path
            .as_os_str()
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();

        // SAFETY: This is safe because:
        // 1. wide_path is a valid, null-terminated wide string
        // 2. All output pointers point to valid, properly aligned u64 variables
        // 3. The output variables are only read after a successful call
        unsafe {
            let mut free_bytes_available: u64 = 0;
            let mut total_bytes: u64 = 0;
            let mut _total_free_bytes: u64 = 0;

            if GetDiskFreeSpaceExW(
                wide_path.as_ptr(),
                &mut free_bytes_available as *mut u64 as *mut _,
                &mut total_bytes as *mut u64 as *mut _,
                &mut _total_free_bytes as *mut u64 as *mut _,
            ) == 0
            {
                return Err(std::io::Error::last_os_error());
            }

            Ok(DiskUsage {
                total_bytes,
                free_bytes: free_bytes_available,
            })
        }
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = path;
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "Disk space checking is not supported on this platform",
        ))
    }
}

/// Bytes as (binary) megabytes
pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB
}

/// Bytes as (binary) gigabytes
pub fn bytes_to_gb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_GB
}

/// Make a sender-supplied file name safe to join onto the destination directory
///
/// Path separators, NUL and other control characters become `_`, and names that
/// would resolve to the directory itself or its parent are replaced entirely.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim();

    match cleaned {
        "" | "." | ".." => "_".to_string(),
        other => other.to_string(),
    }
}
