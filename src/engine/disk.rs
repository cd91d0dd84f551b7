// Filesystem capability checks: permissions and free space

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use sysinfo::Disks;

/// Reports free space for the volume holding a directory
pub trait SpaceProbe: Send + Sync {
    /// `None` when the volume can't be identified
    fn available_bytes(&self, dir: &Path) -> Option<u64>;
}

/// Free space as reported by the operating system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSpaceProbe;

impl SpaceProbe for SystemSpaceProbe {
    fn available_bytes(&self, dir: &Path) -> Option<u64> {
        let dir = resolve_dir(dir)?;
        let disks = Disks::new_with_refreshed_list();

        // Deepest mount point containing the directory wins
        disks
            .list()
            .iter()
            .filter(|disk| dir.starts_with(disk.mount_point()))
            .max_by_key(|disk| disk.mount_point().components().count())
            .map(|disk| disk.available_space())
    }
}

fn resolve_dir(dir: &Path) -> Option<PathBuf> {
    let dir = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };
    dir.canonicalize().ok()
}

/// Whether the current process may read the file
pub fn is_readable(path: &Path) -> bool {
    File::open(path).is_ok()
}

/// Whether files can be created in `dir`; `None` when it can't be determined.
/// Only permission bits are consulted, so nothing is written.
pub fn is_writable_dir(dir: &Path) -> Option<bool> {
    let dir = resolve_dir(dir)?;
    let metadata = fs::metadata(&dir).ok()?;
    if !metadata.is_dir() {
        return Some(false);
    }
    Some(!metadata.permissions().readonly())
}
