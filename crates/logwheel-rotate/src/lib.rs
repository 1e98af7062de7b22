//! logwheel-rotate: Generation shifting, retention and compression.
//!
//! [`RetentionEngine`] rotates the files of one policy when its schedule is
//! due; [`Orchestrator`] drives every configured policy once per tick.

pub mod compress;
pub mod engine;
pub mod generation;
pub mod logger;
pub mod scheduler;

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub use engine::RetentionEngine;
pub use logger::{LogLevel, Logger, MemoryLogger, TracingLogger};
pub use logwheel_config::{Retention, RotationPolicy};
pub use scheduler::Orchestrator;

#[derive(Debug, Error)]
pub enum RotateError {
    #[error("failed to {op} {}: {source}", .path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid file pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

impl RotateError {
    pub(crate) fn io(op: &'static str, path: &Path, source: io::Error) -> Self {
        Self::Io {
            op,
            path: path.to_path_buf(),
            source,
        }
    }
}
