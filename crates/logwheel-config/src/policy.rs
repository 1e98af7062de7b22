//! Validated rotation policies handed to the rotation engine.

use std::path::PathBuf;

use logwheel_cron::Schedule;

/// How many rotated generations a policy retains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    /// `KeepFiles = -1`: matching files are deleted, nothing is rotated.
    DeleteOnly,
    /// `KeepFiles = 0`: files are truncated in place, no history is kept.
    TruncateOnly,
    /// `KeepFiles = N`: up to `N` older generations survive a rotation.
    Generations(usize),
}

impl Retention {
    /// Interpret a `KeepFiles` value; anything below `-1` is invalid.
    pub fn from_keep_files(keep_files: i64) -> Option<Self> {
        match keep_files {
            -1 => Some(Self::DeleteOnly),
            0 => Some(Self::TruncateOnly),
            n if n > 0 => usize::try_from(n).ok().map(Self::Generations),
            _ => None,
        }
    }

    pub fn keep_files(&self) -> i64 {
        match self {
            Self::DeleteOnly => -1,
            Self::TruncateOnly => 0,
            Self::Generations(n) => *n as i64,
        }
    }

    /// Maximum generations left on disk before shifting, `None` in delete mode.
    pub fn depth(&self) -> Option<usize> {
        match self {
            Self::DeleteOnly => None,
            Self::TruncateOnly => Some(0),
            Self::Generations(n) => Some(*n),
        }
    }
}

/// A named retention policy with its own schedule.
#[derive(Debug, Clone)]
pub struct RotationPolicy {
    /// Section name from the config file.
    pub name: String,
    pub directory: PathBuf,
    /// Regex that must match the whole file name.
    pub file_pattern: String,
    /// Minimum file age in seconds.
    pub min_age: u64,
    pub retention: Retention,
    pub simulation: bool,
    /// Generation index from which rotated files are gzip-compressed.
    pub first_compress: Option<u32>,
    pub schedule: Schedule,
}

impl RotationPolicy {
    /// Policy with defaults for everything but the location.
    ///
    /// Defaults: delete-only retention, no age gate, no compression, fires at
    /// minute zero of every hour.
    pub fn new(
        name: impl Into<String>,
        directory: impl Into<PathBuf>,
        file_pattern: impl Into<String>,
    ) -> Self {
        let schedule = crate::DEFAULT_TIMER
            .parse::<Schedule>()
            .unwrap_or_else(|_| Schedule::new());
        Self {
            name: name.into(),
            directory: directory.into(),
            file_pattern: file_pattern.into(),
            min_age: 0,
            retention: Retention::DeleteOnly,
            simulation: false,
            first_compress: None,
            schedule,
        }
    }
}
