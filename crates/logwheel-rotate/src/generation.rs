//! Rotated siblings of a live file (`app.log.0`, `app.log.1.gz`, ...).

use std::cmp::Reverse;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Suffix appended to compressed generations.
pub const GZ_SUFFIX: &str = ".gz";

/// One rotated copy of a base file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub path: PathBuf,
    /// `0` is the newest generation.
    pub index: u32,
    pub compressed: bool,
}

impl Generation {
    /// Where this generation moves when everything ages by one step.
    pub fn shifted(&self, base: &Path) -> PathBuf {
        generation_path(base, self.index + 1, self.compressed)
    }
}

/// `<base>.<index>` or `<base>.<index>.gz`.
pub fn generation_path(base: &Path, index: u32, compressed: bool) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(format!(".{index}"));
    if compressed {
        name.push(GZ_SUFFIX);
    }
    PathBuf::from(name)
}

/// `path` with `.gz` appended.
pub fn gz_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(GZ_SUFFIX);
    PathBuf::from(name)
}

/// Probe `.0`, `.1`, ... until neither the plain nor the compressed form
/// exists. Generations past the first gap are not seen.
///
/// Returned oldest first.
pub fn discover(base: &Path) -> Vec<Generation> {
    let mut found = Vec::new();
    for index in 0.. {
        let mut any = false;
        for compressed in [false, true] {
            let path = generation_path(base, index, compressed);
            if path.exists() {
                found.push(Generation {
                    path,
                    index,
                    compressed,
                });
                any = true;
            }
        }
        if !any {
            break;
        }
    }
    found.sort_by_key(|g| Reverse(g.index));
    found
}
